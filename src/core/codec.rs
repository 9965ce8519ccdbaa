//! Message codec for framing over async byte streams
//!
//! [`MessageCodec`] plugs the wire format into `tokio_util::codec`, so a
//! `Framed<TcpStream, MessageCodec>` yields validated [`Message`]s. Frames are
//! delimited by the header's body length; no extra length prefix is added.
//!
//! Incoming frames go through exactly the same checks as
//! [`Message::parse`]: header decode, body ceiling, authentication mode and
//! digest.

use bytes::{Buf, BufMut, BytesMut};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::config::{SessionConfig, HEADER_SIZE};
use crate::core::header::Header;
use crate::error::{DecodeError, ProtocolError, Result};
use crate::protocol::message::Message;

#[derive(Debug, Clone)]
pub struct MessageCodec {
    config: Arc<SessionConfig>,
}

impl MessageCodec {
    pub fn new(config: Arc<SessionConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(Arc::new(SessionConfig::default()))
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_SIZE {
            src.reserve(HEADER_SIZE - src.len());
            return Ok(None);
        }

        // Validate the header before waiting on its body
        let header = Header::decode(&src[..HEADER_SIZE]).map_err(|e| {
            warn!(error = %e, "Rejected frame header");
            e
        })?;

        let body_len = header.body_len as usize;
        let limit = self.config.max_body_size;
        if body_len > limit {
            warn!(declared = header.body_len, limit, "Declared body exceeds limit");
            return Err(DecodeError::BodyTooLarge {
                declared: header.body_len,
                limit,
            }
            .into());
        }

        let total = HEADER_SIZE + body_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(body_len).to_vec();
        let message = Message::from_header(header, body, None, self.config.secret())?;
        Ok(Some(message))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Stream ended inside a frame
        let (expected, actual) = if src.len() < HEADER_SIZE {
            (HEADER_SIZE, src.len())
        } else {
            let header = Header::decode(&src[..HEADER_SIZE])?;
            (header.body_len as usize, src.len() - HEADER_SIZE)
        };
        Err(DecodeError::Truncated { expected, actual }.into())
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let body = item.body();
        self.config.check_outgoing_body(body.len())?;

        dst.reserve(item.encoded_len());
        dst.put_slice(&item.header().encode());
        dst.put_slice(body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::header::{Flags, MessageType};
    use crate::error::EncodeError;

    fn message(body: &[u8]) -> Message {
        Message::build(MessageType::Invoke, Flags::empty(), 3, body, None).unwrap()
    }

    #[test]
    fn test_partial_frames_wait_for_more() {
        let mut codec = MessageCodec::default();
        let bytes = message(b"hello").to_bytes();

        let mut buf = BytesMut::from(&bytes[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[20..40]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[40..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.body(), b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(message(b"one"), &mut buf).unwrap();
        codec.encode(message(b""), &mut buf).unwrap();
        codec.encode(message(b"three"), &mut buf).unwrap();

        let bodies: Vec<Vec<u8>> = std::iter::from_fn(|| codec.decode(&mut buf).unwrap())
            .map(Message::into_body)
            .collect();
        assert_eq!(bodies, vec![b"one".to_vec(), Vec::new(), b"three".to_vec()]);
    }

    #[test]
    fn test_oversized_body_rejected_from_header_alone() {
        let config = SessionConfig {
            max_body_size: 4,
            ..SessionConfig::default()
        };
        let mut codec = MessageCodec::new(Arc::new(config));
        let bytes = message(b"too long").to_bytes();

        let mut buf = BytesMut::from(&bytes[..HEADER_SIZE]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::Decode(DecodeError::BodyTooLarge { declared: 8, limit: 4 }))
        ));
        assert!(matches!(
            codec.encode(message(b"too long"), &mut BytesMut::new()),
            Err(ProtocolError::Encode(EncodeError::BodyTooLarge(8)))
        ));
    }

    #[test]
    fn test_eof_inside_frame_is_truncated() {
        let mut codec = MessageCodec::default();
        let bytes = message(b"abcdef").to_bytes();

        let mut buf = BytesMut::from(&bytes[..bytes.len() - 2]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ProtocolError::Decode(DecodeError::Truncated { expected: 6, actual: 4 }))
        ));

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_authentication_applies_to_frames() {
        let signed = MessageCodec::new(Arc::new(SessionConfig::with_secret("frame-key")));
        let mut plain = MessageCodec::default();

        let msg = Message::build(
            MessageType::Result,
            Flags::empty(),
            0,
            b"payload".to_vec(),
            signed.config().secret(),
        )
        .unwrap();
        let mut buf = BytesMut::from(msg.to_bytes().as_slice());
        assert!(matches!(
            plain.decode(&mut buf),
            Err(ProtocolError::AuthenticationModeMismatch {
                flag_set: true,
                key_configured: false
            })
        ));
    }
}
