//! Fixed 38-byte message header.
//!
//! ```text
//! offset  size  field
//!      0     4  magic tag ("PYRO")
//!      4     2  protocol version
//!      6     2  message type
//!      8     2  flags
//!     10     2  sequence number
//!     12     4  body length
//!     16     2  header checksum
//!     18    20  body digest (HMAC-SHA1, zero when unauthenticated)
//! ```
//!
//! All integers are big-endian. Every field goes through `put_be` /
//! `get_be`, the single encode/decode primitive for this layout. The field
//! primitive stays private; callers go through [`Header::decode`], which
//! checks the input length first.
//!
//! ```compile_fail
//! use rpc_frame::core::header::BeField;
//! ```

use crate::config::{
    CHECKSUM_MAGIC, DIGEST_SIZE, HEADER_SIZE, MAGIC_BYTES, MAX_BODY_SIZE, PROTOCOL_VERSION,
};
use crate::error::{DecodeError, EncodeError};
use std::fmt;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_TYPE: usize = 6;
const OFF_FLAGS: usize = 8;
const OFF_SEQUENCE: usize = 10;
const OFF_BODY_LEN: usize = 12;
const OFF_CHECKSUM: usize = 16;
const OFF_DIGEST: usize = 18;

/// Keyed body digest as carried in the header
pub type Digest = [u8; DIGEST_SIZE];

/// Digest value used when authentication is disabled
pub const ZERO_DIGEST: Digest = [0u8; DIGEST_SIZE];

/// Kind of message. New codes require a protocol version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Connect = 1,
    ConnectOk = 2,
    ConnectFail = 3,
    Invoke = 4,
    Result = 5,
}

impl MessageType {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Connect => "CONNECT",
            MessageType::ConnectOk => "CONNECT_OK",
            MessageType::ConnectFail => "CONNECT_FAIL",
            MessageType::Invoke => "INVOKE",
            MessageType::Result => "RESULT",
        }
    }
}

impl TryFrom<u16> for MessageType {
    type Error = DecodeError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(MessageType::Connect),
            2 => Ok(MessageType::ConnectOk),
            3 => Ok(MessageType::ConnectFail),
            4 => Ok(MessageType::Invoke),
            5 => Ok(MessageType::Result),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header flag bits.
///
/// Bits without a named constant are kept as received; the checksum covers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u16);

impl Flags {
    /// Result body carries an exception rather than a return value
    pub const EXCEPTION: Flags = Flags(1 << 0);
    /// Body is compressed (opaque to this crate)
    pub const COMPRESSED: Flags = Flags(1 << 1);
    /// Invocation expects no result
    pub const ONEWAY: Flags = Flags(1 << 2);
    /// Digest field holds an HMAC of the body
    pub const HMAC_PRESENT: Flags = Flags(1 << 3);
    /// Body is a batch of invocations (opaque to this crate)
    pub const BATCH: Flags = Flags(1 << 4);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    #[must_use]
    pub const fn with(self, other: Flags) -> Self {
        Flags(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Flags) -> Self {
        Flags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.with(rhs)
    }
}

/// Decoded, validated header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub flags: Flags,
    pub sequence: u16,
    pub body_len: u32,
    pub digest: Digest,
}

/// Header checksum over the numeric fields, reduced mod 2^16.
///
/// Only the low 16 bits of `body_len` affect the result.
pub fn checksum(msg_type: u16, version: u16, body_len: u32, flags: u16, sequence: u16) -> u16 {
    let sum = u64::from(msg_type)
        + u64::from(version)
        + u64::from(body_len)
        + u64::from(flags)
        + u64::from(sequence)
        + u64::from(CHECKSUM_MAGIC);
    (sum & 0xFFFF) as u16
}

/// Big-endian integer that occupies a fixed header slot.
trait BeField: Sized {
    const WIDTH: usize;
    fn write_be(self, out: &mut [u8]);
    fn read_be(input: &[u8]) -> Self;
}

impl BeField for u16 {
    const WIDTH: usize = 2;

    fn write_be(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_be_bytes());
    }

    fn read_be(input: &[u8]) -> Self {
        u16::from_be_bytes([input[0], input[1]])
    }
}

impl BeField for u32 {
    const WIDTH: usize = 4;

    fn write_be(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_be_bytes());
    }

    fn read_be(input: &[u8]) -> Self {
        u32::from_be_bytes([input[0], input[1], input[2], input[3]])
    }
}

#[inline]
fn put_be<T: BeField>(buf: &mut [u8; HEADER_SIZE], offset: usize, value: T) {
    value.write_be(&mut buf[offset..offset + T::WIDTH]);
}

#[inline]
fn get_be<T: BeField>(buf: &[u8], offset: usize) -> T {
    T::read_be(&buf[offset..offset + T::WIDTH])
}

/// Encode header fields, validating a caller-supplied wide sequence number.
pub fn encode_header(
    msg_type: MessageType,
    flags: Flags,
    sequence: u32,
    body_len: u32,
    digest: &Digest,
) -> Result<[u8; HEADER_SIZE], EncodeError> {
    let sequence = u16::try_from(sequence)
        .map_err(|_| EncodeError::SequenceOutOfRange(u64::from(sequence)))?;
    Ok(Header {
        msg_type,
        flags,
        sequence,
        body_len,
        digest: *digest,
    }
    .encode())
}

impl Header {
    pub fn new(msg_type: MessageType, flags: Flags, sequence: u16, body_len: u32) -> Self {
        Self {
            msg_type,
            flags,
            sequence,
            body_len,
            digest: ZERO_DIGEST,
        }
    }

    /// Checksum this header will carry on the wire
    pub fn checksum(&self) -> u16 {
        checksum(
            self.msg_type.code(),
            PROTOCOL_VERSION,
            self.body_len,
            self.flags.bits(),
            self.sequence,
        )
    }

    /// Serialize into the fixed wire layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[OFF_MAGIC..OFF_VERSION].copy_from_slice(&MAGIC_BYTES);
        put_be(&mut buf, OFF_VERSION, PROTOCOL_VERSION);
        put_be(&mut buf, OFF_TYPE, self.msg_type.code());
        put_be(&mut buf, OFF_FLAGS, self.flags.bits());
        put_be(&mut buf, OFF_SEQUENCE, self.sequence);
        put_be(&mut buf, OFF_BODY_LEN, self.body_len);
        put_be(&mut buf, OFF_CHECKSUM, self.checksum());
        buf[OFF_DIGEST..].copy_from_slice(&self.digest);
        buf
    }

    /// Parse and validate the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// Checks run in order: length, magic/version, checksum, message type,
    /// body length ceiling. Trailing bytes are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[OFF_MAGIC..OFF_VERSION]);
        let version: u16 = get_be(buf, OFF_VERSION);
        if magic != MAGIC_BYTES || version != PROTOCOL_VERSION {
            return Err(DecodeError::BadMagicOrVersion { magic, version });
        }

        let type_code: u16 = get_be(buf, OFF_TYPE);
        let flags: u16 = get_be(buf, OFF_FLAGS);
        let sequence: u16 = get_be(buf, OFF_SEQUENCE);
        let body_len: u32 = get_be(buf, OFF_BODY_LEN);
        let carried: u16 = get_be(buf, OFF_CHECKSUM);

        let computed = checksum(type_code, version, body_len, flags, sequence);
        if computed != carried {
            return Err(DecodeError::ChecksumMismatch {
                expected: computed,
                actual: carried,
            });
        }

        let msg_type = MessageType::try_from(type_code)?;

        if body_len as usize > MAX_BODY_SIZE {
            return Err(DecodeError::BodyTooLarge {
                declared: body_len,
                limit: MAX_BODY_SIZE,
            });
        }

        let mut digest = ZERO_DIGEST;
        digest.copy_from_slice(&buf[OFF_DIGEST..HEADER_SIZE]);

        Ok(Self {
            msg_type,
            flags: Flags::from_bits(flags),
            sequence,
            body_len,
            digest,
        })
    }
}
