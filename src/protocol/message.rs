//! Message envelope: a validated header paired with its body.
//!
//! A [`Message`] can only be obtained through [`Message::build`] (outgoing) or
//! [`Message::parse`] / [`Message::from_header`] (incoming), and it is
//! immutable afterwards. Incoming messages are returned only once every check
//! has passed.

use crate::config::{SharedSecret, HEADER_SIZE, MAX_BODY_SIZE};
use crate::core::header::{Digest, Flags, Header, MessageType, ZERO_DIGEST};
use crate::error::{DecodeError, EncodeError, ProtocolError, Result};
use crate::utils::integrity;
use tracing::{trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    body: Vec<u8>,
}

impl Message {
    /// Build an outgoing message.
    ///
    /// With a secret, `HMAC_PRESENT` is forced on and the digest is computed
    /// over `body`. Without one, the flag is cleared and the digest is zero.
    /// Bodies above [`MAX_BODY_SIZE`] are refused.
    pub fn build(
        msg_type: MessageType,
        flags: Flags,
        sequence: u32,
        body: impl Into<Vec<u8>>,
        secret: Option<&SharedSecret>,
    ) -> std::result::Result<Self, EncodeError> {
        let body = body.into();
        let sequence = u16::try_from(sequence)
            .map_err(|_| EncodeError::SequenceOutOfRange(u64::from(sequence)))?;
        if body.len() > MAX_BODY_SIZE {
            return Err(EncodeError::BodyTooLarge(body.len()));
        }
        let body_len =
            u32::try_from(body.len()).map_err(|_| EncodeError::BodyTooLarge(body.len()))?;

        let (flags, digest) = match secret {
            Some(secret) => (flags.with(Flags::HMAC_PRESENT), integrity::sign(secret, &body)),
            None => (flags.without(Flags::HMAC_PRESENT), ZERO_DIGEST),
        };

        let header = Header {
            msg_type,
            flags,
            sequence,
            body_len,
            digest,
        };
        trace!(%msg_type, sequence, body_len, "Built message");

        Ok(Self { header, body })
    }

    /// Decode `header_bytes` and validate the message against local settings.
    pub fn parse(
        header_bytes: &[u8],
        body: &[u8],
        expected: Option<MessageType>,
        secret: Option<&SharedSecret>,
    ) -> Result<Self> {
        let header = Header::decode(header_bytes).map_err(|e| {
            warn!(error = %e, "Rejected message header");
            e
        })?;
        Self::from_header(header, body.to_vec(), expected, secret)
    }

    /// Validate a body against an already decoded header.
    ///
    /// Checks run in order: body length, expected type, authentication mode,
    /// digest.
    pub fn from_header(
        header: Header,
        body: Vec<u8>,
        expected: Option<MessageType>,
        secret: Option<&SharedSecret>,
    ) -> Result<Self> {
        let declared = header.body_len;
        if body.len() < declared as usize {
            warn!(declared, actual = body.len(), "Body shorter than declared");
            return Err(DecodeError::Truncated {
                expected: declared as usize,
                actual: body.len(),
            }
            .into());
        }
        if body.len() > declared as usize {
            warn!(declared, actual = body.len(), "Body longer than declared");
            return Err(DecodeError::BodyLengthMismatch {
                declared,
                actual: body.len(),
            }
            .into());
        }

        if let Some(expected) = expected {
            if header.msg_type != expected {
                warn!(%expected, actual = %header.msg_type, "Unexpected message type");
                return Err(ProtocolError::UnexpectedType {
                    expected: expected.name(),
                    actual: header.msg_type.name(),
                });
            }
        }

        let flag_set = header.flags.contains(Flags::HMAC_PRESENT);
        match (flag_set, secret) {
            (true, Some(secret)) => {
                if !integrity::verify(secret, &body, &header.digest) {
                    warn!(
                        msg_type = %header.msg_type,
                        sequence = header.sequence,
                        "Body digest verification failed"
                    );
                    return Err(ProtocolError::AuthenticationFailed);
                }
            }
            (false, None) => {}
            (flag_set, secret) => {
                warn!(
                    flag_set,
                    key_configured = secret.is_some(),
                    "Authentication mode mismatch"
                );
                return Err(ProtocolError::AuthenticationModeMismatch {
                    flag_set,
                    key_configured: secret.is_some(),
                });
            }
        }

        Ok(Self { header, body })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    pub fn sequence(&self) -> u16 {
        self.header.sequence
    }

    pub fn digest(&self) -> &Digest {
        &self.header.digest
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Total bytes on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Header followed by body, ready to write to the stream
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.body);
        out
    }
}
