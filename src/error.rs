//! # Error Types
//!
//! Error handling for the framing protocol.
//!
//! Errors are split by layer so that every validation failure reaches the
//! caller as its own identifiable kind:
//!
//! - **[`EncodeError`]**: values that cannot be represented in a header
//! - **[`DecodeError`]**: malformed, truncated or corrupted header/body bytes
//! - **[`ProtocolError`]**: envelope, authentication and session violations,
//!   plus transport failures reported by the byte-stream collaborator
//!
//! Nothing is retried internally. A session that observes any of these errors
//! on the wire moves to its terminal `Failed` state.
//!
//! ## Example Usage
//! ```rust
//! use rpc_frame::core::header::Header;
//! use rpc_frame::error::{DecodeError, ProtocolError};
//! use tracing::warn;
//!
//! match Header::decode(&[0u8; 10]) {
//!     Err(DecodeError::Truncated { expected, actual }) => {
//!         warn!(expected, actual, "short header");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//!
//! let err: ProtocolError = DecodeError::Truncated { expected: 38, actual: 10 }.into();
//! assert!(err.to_string().contains("truncated"));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by validation and logging paths.
pub mod constants {
    /// Configuration errors
    pub const ERR_CONFIG_OPEN: &str = "Failed to open config file";
    pub const ERR_CONFIG_READ: &str = "Failed to read config file";
    pub const ERR_CONFIG_PARSE: &str = "Failed to parse TOML";
    pub const ERR_CONFIG_SERIALIZE: &str = "Failed to serialize config";
    pub const ERR_CONFIG_WRITE: &str = "Failed to write config file";
    pub const ERR_SECRET_GENERATION: &str = "Failed to generate shared secret";

    /// Logging errors
    pub const ERR_LOGGER_INSTALL: &str = "Failed to install tracing subscriber";
    pub const ERR_LOG_FILE: &str = "Failed to open log file";
}

/// Failure to represent a value in the fixed header layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Sequence number {0} out of range (0-65535)")]
    SequenceOutOfRange(u64),

    #[error("Body of {0} bytes exceeds the maximum body size")]
    BodyTooLarge(usize),
}

/// Failure to decode or structurally validate received bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Input truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Bad magic tag {magic:02X?} or unsupported version {version}")]
    BadMagicOrVersion { magic: [u8; 4], version: u16 },

    #[error("Header checksum mismatch: header carries {actual:#06x}, computed {expected:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Unknown message type code {0}")]
    UnknownMessageType(u16),

    #[error("Declared body length {declared} exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: u32, limit: usize },

    #[error("Body length mismatch: header declares {declared} bytes, got {actual}")]
    BodyLengthMismatch { declared: u32, actual: usize },
}

/// ProtocolError is the primary error type for envelope and session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Unexpected message type: expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(
        "Authentication mode mismatch: HMAC flag set={flag_set}, local key configured={key_configured}"
    )]
    AuthenticationModeMismatch { flag_set: bool, key_configured: bool },

    #[error("Body digest verification failed")]
    AuthenticationFailed,

    #[error("Sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u16, actual: u16 },

    #[error("Connection rejected by peer: {0}")]
    ConnectionRejected(String),

    #[error("Operation '{event}' not allowed in state {state}")]
    InvalidState {
        state: &'static str,
        event: &'static str,
    },

    #[error("Session closed")]
    SessionClosed,

    #[error("Session failed")]
    SessionFailed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// True for errors that describe bytes received from the peer, as opposed
    /// to local misuse or configuration problems.
    pub fn is_wire_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::Decode(_)
                | ProtocolError::Transport(_)
                | ProtocolError::UnexpectedType { .. }
                | ProtocolError::AuthenticationModeMismatch { .. }
                | ProtocolError::AuthenticationFailed
                | ProtocolError::SequenceMismatch { .. }
                | ProtocolError::ConnectionRejected(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
