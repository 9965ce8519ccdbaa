//! # Configuration Management
//!
//! Wire constants and the explicit configuration values handed to sessions.
//!
//! The shared secret is not ambient process state: it lives in a
//! [`SessionConfig`] that is built once at startup, wrapped in an `Arc`, and
//! passed to every session. Sessions only ever read it.
//!
//! ## Configuration Sources
//! - TOML files via [`ProtocolConfig::from_file`]
//! - Environment variables via [`ProtocolConfig::from_env`]
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - Secret bytes are zeroized when the owning value is dropped
//! - `Debug` output never contains key material
//! - Body lengths are bounded before any allocation takes place

use crate::error::{constants, EncodeError, ProtocolError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Current supported protocol version
pub const PROTOCOL_VERSION: u16 = 44;

/// Magic bytes that open every header ("PYRO")
pub const MAGIC_BYTES: [u8; 4] = [0x50, 0x59, 0x52, 0x4F];

/// Constant folded into every header checksum
pub const CHECKSUM_MAGIC: u16 = 0x34E9;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 38;

/// Size of the keyed body digest (HMAC-SHA1 output)
pub const DIGEST_SIZE: usize = 20;

/// Max allowed body size (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Secrets shorter than this are accepted but reported by validation
pub const RECOMMENDED_MIN_SECRET_LEN: usize = 8;

/// Symmetric key shared by both ends of a session.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    key: Vec<u8>,
}

impl SharedSecret {
    /// Wrap existing key bytes
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Generate a random secret of `len` bytes from the OS RNG
    pub fn generate(len: usize) -> Result<Self> {
        let mut key = vec![0u8; len];
        getrandom::fill(&mut key).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_SECRET_GENERATION))
        })?;
        Ok(Self { key })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret([REDACTED; {}])", self.key.len())
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<&[u8]> for SharedSecret {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl Serialize for SharedSecret {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match std::str::from_utf8(&self.key) {
            Ok(text) => text.serialize(serializer),
            Err(_) => Err(serde::ser::Error::custom(
                "shared secret is not valid UTF-8 and cannot be written as text",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for SharedSecret {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(Self::new(text.into_bytes()))
    }
}

/// Per-session protocol settings, read-only once a session holds them
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Key for body digests. `None` disables authentication.
    #[serde(default)]
    pub shared_secret: Option<SharedSecret>,

    /// Sequence number carried by the first request of a session
    #[serde(default)]
    pub initial_sequence: u16,

    /// Reject replies whose sequence number differs from the request's
    #[serde(default = "default_enforce_sequence")]
    pub enforce_sequence: bool,

    /// Largest body accepted from the peer, in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_enforce_sequence() -> bool {
    true
}

fn default_max_body_size() -> usize {
    MAX_BODY_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            initial_sequence: 0,
            enforce_sequence: default_enforce_sequence(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl SessionConfig {
    /// Configuration with authentication enabled under `key`
    pub fn with_secret(key: impl Into<Vec<u8>>) -> Self {
        let mut config = Self::default();
        config.set_shared_secret(key);
        config
    }

    /// Enable authentication with the given key bytes
    pub fn set_shared_secret(&mut self, key: impl Into<Vec<u8>>) {
        self.shared_secret = Some(SharedSecret::new(key));
    }

    /// Disable authentication
    pub fn clear_shared_secret(&mut self) {
        self.shared_secret = None;
    }

    pub fn secret(&self) -> Option<&SharedSecret> {
        self.shared_secret.as_ref()
    }

    pub fn authentication_enabled(&self) -> bool {
        self.shared_secret.is_some()
    }

    /// Refuse an outgoing body larger than `max_body_size`.
    ///
    /// Both ends of a session are expected to share the same ceiling, so a
    /// body above it would only be rejected by the peer.
    pub fn check_outgoing_body(&self, len: usize) -> std::result::Result<(), EncodeError> {
        if len > self.max_body_size {
            return Err(EncodeError::BodyTooLarge(len));
        }
        Ok(())
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(secret) = &self.shared_secret {
            if secret.is_empty() {
                errors.push(
                    "Shared secret cannot be empty (omit it to disable authentication)"
                        .to_string(),
                );
            } else if secret.len() < RECOMMENDED_MIN_SECRET_LEN {
                errors.push(format!(
                    "WARNING: Shared secret is only {} bytes (recommended minimum: {})",
                    secret.len(),
                    RECOMMENDED_MIN_SECRET_LEN
                ));
            }
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        } else if self.max_body_size > MAX_BODY_SIZE {
            errors.push(format!(
                "Max body size too large: {} bytes (maximum: {} bytes)",
                self.max_body_size, MAX_BODY_SIZE
            ));
        }

        errors
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_OPEN))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_READ))
        })?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_PARSE))
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(secret) = std::env::var("RPC_FRAME_SHARED_SECRET") {
            config.session.set_shared_secret(secret.into_bytes());
        }

        if let Ok(value) = std::env::var("RPC_FRAME_INITIAL_SEQUENCE") {
            config.session.initial_sequence = value.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid RPC_FRAME_INITIAL_SEQUENCE '{value}': {e}"
                ))
            })?;
        }

        if let Ok(value) = std::env::var("RPC_FRAME_ENFORCE_SEQUENCE") {
            config.session.enforce_sequence = value.parse::<bool>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid RPC_FRAME_ENFORCE_SEQUENCE '{value}': {e}"
                ))
            })?;
        }

        if let Ok(value) = std::env::var("RPC_FRAME_MAX_BODY_SIZE") {
            config.session.max_body_size = value.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!(
                    "Invalid RPC_FRAME_MAX_BODY_SIZE '{value}': {e}"
                ))
            })?;
        }

        if let Ok(value) = std::env::var("RPC_FRAME_LOG_LEVEL") {
            config.logging.log_level = value.parse::<Level>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid RPC_FRAME_LOG_LEVEL '{value}': {e}"))
            })?;
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_SERIALIZE))
        })?;

        std::fs::write(path, content).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_CONFIG_WRITE))
        })?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.session.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("rpc-frame"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
