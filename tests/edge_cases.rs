#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Boundary conditions and malformed-input handling across the public API

use rpc_frame::config::{SessionConfig, SharedSecret, HEADER_SIZE, MAX_BODY_SIZE};
use rpc_frame::core::header::{checksum, encode_header, Flags, Header, MessageType, ZERO_DIGEST};
use rpc_frame::error::{DecodeError, EncodeError, ProtocolError};
use rpc_frame::protocol::message::Message;
use rpc_frame::utils::integrity::{sign, sign_raw, verify};

// ============================================================================
// HEADER CODEC EDGE CASES
// ============================================================================

#[test]
fn test_header_sequence_boundaries() {
    let max = encode_header(MessageType::Invoke, Flags::empty(), 65535, 0, &ZERO_DIGEST)
        .expect("65535 is the largest sequence");
    assert_eq!(Header::decode(&max).unwrap().sequence, u16::MAX);

    assert_eq!(
        encode_header(MessageType::Invoke, Flags::empty(), 65536, 0, &ZERO_DIGEST),
        Err(EncodeError::SequenceOutOfRange(65536))
    );
}

#[test]
fn test_header_37_bytes_truncated() {
    let bytes = Header::new(MessageType::Connect, Flags::empty(), 0, 0).encode();
    assert_eq!(
        Header::decode(&bytes[..HEADER_SIZE - 1]),
        Err(DecodeError::Truncated {
            expected: HEADER_SIZE,
            actual: 37
        })
    );
    assert!(matches!(
        Header::decode(&[]),
        Err(DecodeError::Truncated { actual: 0, .. })
    ));
}

#[test]
fn test_header_known_bytes() {
    let bytes = Header::new(MessageType::Connect, Flags::empty(), 0, 0).encode();
    assert_eq!(&bytes[0..4], b"PYRO");
    assert_eq!(&bytes[4..6], &[0x00, 0x2C]);
    assert_eq!(&bytes[6..8], &[0x00, 0x01]);
    // 1 + 44 + 0 + 0 + 0 + 0x34E9
    assert_eq!(&bytes[16..18], &[0x35, 0x16]);
    assert!(bytes[18..].iter().all(|&b| b == 0));
}

#[test]
fn test_checksum_wraps_modulo_16_bits() {
    let sum = checksum(5, 44, u32::MAX, 0xFFFF, 0xFFFF);
    let expected = (5u64 + 44 + u64::from(u32::MAX) + 0xFFFF + 0xFFFF + 0x34E9) & 0xFFFF;
    assert_eq!(u64::from(sum), expected);
}

#[test]
fn test_checksum_checked_before_message_type() {
    let mut bytes = Header::new(MessageType::Result, Flags::empty(), 0, 0).encode();
    bytes[6..8].copy_from_slice(&9u16.to_be_bytes());
    assert!(matches!(
        Header::decode(&bytes),
        Err(DecodeError::ChecksumMismatch { .. })
    ));

    // With a consistent checksum the unknown code itself is reported
    let sum = checksum(9, 44, 0, 0, 0);
    bytes[16..18].copy_from_slice(&sum.to_be_bytes());
    assert_eq!(Header::decode(&bytes), Err(DecodeError::UnknownMessageType(9)));
}

#[test]
fn test_declared_body_above_ceiling() {
    let header = Header::new(
        MessageType::Result,
        Flags::empty(),
        0,
        (MAX_BODY_SIZE + 1) as u32,
    );
    assert!(matches!(
        Header::decode(&header.encode()),
        Err(DecodeError::BodyTooLarge { .. })
    ));
}

#[test]
fn test_unknown_flag_bits_survive() {
    let flags = Flags::from_bits(0x8000).with(Flags::BATCH);
    let bytes = Header::new(MessageType::Invoke, flags, 3, 0).encode();
    let decoded = Header::decode(&bytes).unwrap();
    assert_eq!(decoded.flags.bits(), 0x8010);
    assert!(decoded.flags.contains(Flags::BATCH));
}

// ============================================================================
// INTEGRITY EDGE CASES
// ============================================================================

#[test]
fn test_hmac_reference_vector() {
    let digest = sign_raw(b"Jefe", b"what do ya want for nothing?");
    assert_eq!(
        digest,
        [
            0xef, 0xfc, 0xdf, 0x6a, 0xe5, 0xeb, 0x2f, 0xa2, 0xd2, 0x74, 0x16, 0xd5, 0xf1, 0x84,
            0xdf, 0x9c, 0x25, 0x9a, 0x7c, 0x79
        ]
    );
}

#[test]
fn test_matching_digest_is_accepted() {
    let secret = SharedSecret::from("Jefe");
    let body = b"what do ya want for nothing?";
    let digest = sign(&secret, body);
    assert!(verify(&secret, body, &digest));

    let mut tampered = digest;
    tampered[19] ^= 0x01;
    assert!(!verify(&secret, body, &tampered));
}

#[test]
fn test_key_longer_than_block() {
    let secret = SharedSecret::new(vec![0xAA; 80]);
    let digest = sign(&secret, b"Test Using Larger Than Block-Size Key - Hash Key First");
    assert_eq!(digest[..4], [0xaa_u8, 0x4a, 0xe5, 0xe1]);
}

// ============================================================================
// MESSAGE ENVELOPE EDGE CASES
// ============================================================================

#[test]
fn test_empty_body_message() {
    let msg = Message::build(MessageType::ConnectOk, Flags::empty(), 0, b"".to_vec(), None).unwrap();
    let bytes = msg.to_bytes();
    assert_eq!(bytes.len(), HEADER_SIZE);

    let parsed = Message::parse(&bytes, &[], Some(MessageType::ConnectOk), None).unwrap();
    assert!(parsed.body().is_empty());
}

#[test]
fn test_extra_body_bytes_rejected() {
    let msg = Message::build(MessageType::Invoke, Flags::empty(), 0, b"abc".to_vec(), None).unwrap();
    let bytes = msg.to_bytes();
    assert!(matches!(
        Message::parse(&bytes[..HEADER_SIZE], b"abcd", None, None),
        Err(ProtocolError::Decode(DecodeError::BodyLengthMismatch {
            declared: 3,
            actual: 4
        }))
    ));
}

#[test]
fn test_build_respects_configuration_for_hmac_flag() {
    let config = SessionConfig::with_secret("secret-key");
    let forced = Message::build(
        MessageType::Invoke,
        Flags::empty(),
        0,
        b"x".to_vec(),
        config.secret(),
    )
    .unwrap();
    assert!(forced.flags().contains(Flags::HMAC_PRESENT));
    assert_ne!(forced.digest(), &ZERO_DIGEST);

    let cleared = Message::build(
        MessageType::Invoke,
        Flags::HMAC_PRESENT,
        0,
        b"x".to_vec(),
        None,
    )
    .unwrap();
    assert!(!cleared.flags().contains(Flags::HMAC_PRESENT));
    assert_eq!(cleared.digest(), &ZERO_DIGEST);
}

#[test]
fn test_flag_without_key_and_key_without_flag() {
    let secret = SharedSecret::from("secret-key");
    let signed =
        Message::build(MessageType::Invoke, Flags::empty(), 0, b"x".to_vec(), Some(&secret))
            .unwrap()
            .to_bytes();
    let plain = Message::build(MessageType::Invoke, Flags::empty(), 0, b"x".to_vec(), None)
        .unwrap()
        .to_bytes();

    assert!(matches!(
        Message::parse(&signed[..HEADER_SIZE], &signed[HEADER_SIZE..], None, None),
        Err(ProtocolError::AuthenticationModeMismatch {
            flag_set: true,
            key_configured: false
        })
    ));
    assert!(matches!(
        Message::parse(&plain[..HEADER_SIZE], &plain[HEADER_SIZE..], None, Some(&secret)),
        Err(ProtocolError::AuthenticationModeMismatch {
            flag_set: false,
            key_configured: true
        })
    ));
}

#[test]
fn test_tampered_body_fails_authentication() {
    let secret = SharedSecret::from("secret-key");
    let bytes = Message::build(
        MessageType::Result,
        Flags::empty(),
        4,
        b"balance=100".to_vec(),
        Some(&secret),
    )
    .unwrap()
    .to_bytes();

    assert!(matches!(
        Message::parse(&bytes[..HEADER_SIZE], b"balance=999", None, Some(&secret)),
        Err(ProtocolError::AuthenticationFailed)
    ));
}

#[test]
fn test_unexpected_type_reported_by_name() {
    let bytes = Message::build(MessageType::ConnectFail, Flags::empty(), 0, b"".to_vec(), None)
        .unwrap()
        .to_bytes();
    let err = Message::parse(&bytes, &[], Some(MessageType::Result), None).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedType {
            expected: "RESULT",
            actual: "CONNECT_FAIL"
        }
    ));
}
