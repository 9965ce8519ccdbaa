//! # Core Wire Components
//!
//! Header encoding/decoding and stream framing.
//!
//! ## Components
//! - **Header**: fixed 38-byte header with checksum and body digest
//! - **Codec**: Tokio codec for framing messages over async byte streams
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(2)] [Type(2)] [Flags(2)] [Seq(2)] [BodyLen(4)] [Checksum(2)] [Digest(20)] [Body(N)]
//! ```
//!
//! All fields are big-endian.
//!
//! ## Security
//! - Maximum body size: 16MB (declared lengths are checked before allocation)
//! - Magic bytes and version reject foreign or incompatible peers
//! - The header checksum detects corruption; it is not an authenticator

pub mod codec;
pub mod header;
