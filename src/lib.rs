//! # rpc-frame
//!
//! Binary message framing with optional keyed-hash body integrity, and the
//! minimal session handshake built on it.
//!
//! Every message is a fixed 38-byte header (magic `PYRO`, version 44, type,
//! flags, sequence, body length, checksum, 20-byte HMAC-SHA1 digest) followed
//! by the body. When both ends share a secret, each body is signed and
//! verified; otherwise the digest is zero and the `HMAC_PRESENT` flag must be
//! clear on both sides.
//!
//! ## Quick Start
//! ```no_run
//! use rpc_frame::{InvokeOutcome, Session, SessionConfig, StreamTransport};
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! # fn main() -> rpc_frame::Result<()> {
//! let config = Arc::new(SessionConfig::with_secret("shared passphrase"));
//! let stream = TcpStream::connect("127.0.0.1:7766")?;
//! let mut session = Session::new(StreamTransport::new(stream), config);
//!
//! session.connect(b"client-1")?;
//! match session.invoke(b"method args")? {
//!     InvokeOutcome::Return(body) => println!("{} bytes returned", body.len()),
//!     InvokeOutcome::Exception(body) => eprintln!("remote error: {:?}", body),
//! }
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//! - [`core`]: header codec and async framing
//! - [`utils`]: integrity, logging, metrics
//! - [`protocol`]: message envelope, state machine, session and responder
//! - [`config`]: wire constants and configuration loading
//! - [`error`]: error types

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use config::{ProtocolConfig, SessionConfig, SharedSecret};
pub use core::codec::MessageCodec;
pub use core::header::{Flags, Header, MessageType};
pub use error::{DecodeError, EncodeError, ProtocolError, Result};
pub use protocol::message::Message;
pub use protocol::responder::{ConnectDecision, DenyReason, Responder, ResponderState};
pub use protocol::session::{InvokeOutcome, Session};
pub use protocol::state::{SessionEvent, SessionState};
pub use protocol::transport::{StreamTransport, Transport};
