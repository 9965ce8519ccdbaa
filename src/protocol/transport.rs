//! Byte-stream collaborator consumed by sessions.
//!
//! The protocol core never opens, configures or closes a connection. It only
//! needs blocking reads and writes; anything implementing [`Transport`] will
//! do, and [`StreamTransport`] adapts any `std::io::Read + Write` (a
//! `TcpStream`, a `UnixStream`, an in-memory duplex in tests).

use crate::config::{SessionConfig, HEADER_SIZE};
use crate::core::header::{Header, MessageType};
use crate::error::{DecodeError, Result};
use crate::protocol::message::Message;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

pub trait Transport {
    /// Read `n` bytes, blocking. Returns fewer than `n` only at end of stream.
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Write `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        (**self).read(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        (**self).write(bytes)
    }
}

/// [`Transport`] over any blocking `Read + Write` stream
#[derive(Debug)]
pub struct StreamTransport<S> {
    inner: S,
}

impl<S> StreamTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        Ok(bytes.len())
    }
}

/// Write a whole message, failing if the transport accepts fewer bytes.
pub fn write_message<T: Transport + ?Sized>(transport: &mut T, message: &Message) -> Result<usize> {
    let bytes = message.to_bytes();
    let written = transport.write(&bytes)?;
    if written != bytes.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {written} of {} bytes", bytes.len()),
        )
        .into());
    }
    debug!(
        msg_type = %message.msg_type(),
        sequence = message.sequence(),
        body_len = message.body().len(),
        "Sent message"
    );
    Ok(written)
}

/// Read and validate one message.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first header
/// byte. A stream that ends anywhere inside a message is `Truncated`. The
/// declared body length is checked against `config.max_body_size` before the
/// body is read.
pub fn read_message<T: Transport + ?Sized>(
    transport: &mut T,
    expected: Option<MessageType>,
    config: &SessionConfig,
) -> Result<Option<Message>> {
    let head = transport.read(HEADER_SIZE)?;
    if head.is_empty() {
        return Ok(None);
    }

    let header = Header::decode(&head).map_err(|e| {
        warn!(error = %e, "Rejected message header");
        e
    })?;

    let limit = config.max_body_size;
    if header.body_len as usize > limit {
        warn!(declared = header.body_len, limit, "Declared body exceeds limit");
        return Err(DecodeError::BodyTooLarge {
            declared: header.body_len,
            limit,
        }
        .into());
    }

    let body = transport.read(header.body_len as usize)?;
    let message = Message::from_header(header, body, expected, config.secret())?;
    debug!(
        msg_type = %message.msg_type(),
        sequence = message.sequence(),
        body_len = message.body().len(),
        "Received message"
    );
    Ok(Some(message))
}

/// Like [`read_message`], treating end of stream as truncation.
pub fn expect_message<T: Transport + ?Sized>(
    transport: &mut T,
    expected: Option<MessageType>,
    config: &SessionConfig,
) -> Result<Message> {
    read_message(transport, expected, config)?.ok_or_else(|| {
        DecodeError::Truncated {
            expected: HEADER_SIZE,
            actual: 0,
        }
        .into()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::header::Flags;
    use crate::error::ProtocolError;
    use std::io::Cursor;

    /// Reads from a fixed input, records writes.
    struct Loopback {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // Hand out at most 3 bytes per call to exercise the fill loop
            let len = buf.len().min(3);
            self.input.read(&mut buf[..len])
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn transport(input: Vec<u8>) -> StreamTransport<Loopback> {
        StreamTransport::new(Loopback {
            input: Cursor::new(input),
            output: Vec::new(),
        })
    }

    #[test]
    fn test_read_fills_across_short_reads() {
        let mut t = transport((0u8..20).collect());
        assert_eq!(t.read(10).unwrap(), (0u8..10).collect::<Vec<_>>());
        assert_eq!(t.read(20).unwrap().len(), 10);
        assert!(t.read(5).unwrap().is_empty());
    }

    #[test]
    fn test_message_roundtrip_through_stream() {
        let config = SessionConfig::with_secret(b"secret-key".to_vec());
        let msg = Message::build(
            MessageType::Invoke,
            Flags::empty(),
            9,
            b"args".to_vec(),
            config.secret(),
        )
        .unwrap();

        let mut t = transport(msg.to_bytes());
        let received = read_message(&mut t, Some(MessageType::Invoke), &config)
            .unwrap()
            .unwrap();
        assert_eq!(received, msg);
        assert!(read_message(&mut t, None, &config).unwrap().is_none());

        write_message(&mut t, &msg).unwrap();
        assert_eq!(t.get_ref().output, msg.to_bytes());
    }

    #[test]
    fn test_truncated_stream() {
        let msg = Message::build(MessageType::Result, Flags::empty(), 0, vec![1u8; 8], None)
            .unwrap();
        let bytes = msg.to_bytes();
        let config = SessionConfig::default();

        let mut short_body = transport(bytes[..bytes.len() - 1].to_vec());
        assert!(matches!(
            read_message(&mut short_body, None, &config),
            Err(ProtocolError::Decode(DecodeError::Truncated { expected: 8, actual: 7 }))
        ));

        let mut short_header = transport(bytes[..20].to_vec());
        assert!(matches!(
            read_message(&mut short_header, None, &config),
            Err(ProtocolError::Decode(DecodeError::Truncated { expected: 38, actual: 20 }))
        ));

        let mut empty = transport(Vec::new());
        assert!(matches!(
            expect_message(&mut empty, None, &config),
            Err(ProtocolError::Decode(DecodeError::Truncated { actual: 0, .. }))
        ));
    }

    #[test]
    fn test_body_limit_checked_before_read() {
        let msg = Message::build(MessageType::Result, Flags::empty(), 0, vec![0u8; 64], None)
            .unwrap();
        let config = SessionConfig {
            max_body_size: 32,
            ..SessionConfig::default()
        };
        // Only the header is available; the limit must trip without reading the body.
        let mut t = transport(msg.to_bytes()[..HEADER_SIZE].to_vec());
        assert!(matches!(
            read_message(&mut t, None, &config),
            Err(ProtocolError::Decode(DecodeError::BodyTooLarge {
                declared: 64,
                limit: 32
            }))
        ));
    }
}
