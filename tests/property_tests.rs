//! Property-based tests using proptest
//!
//! These tests validate wire-format and authentication invariants across a
//! wide range of randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use rpc_frame::config::{SharedSecret, HEADER_SIZE};
use rpc_frame::core::header::{encode_header, Flags, Header, MessageType, ZERO_DIGEST};
use rpc_frame::error::{DecodeError, EncodeError, ProtocolError};
use rpc_frame::protocol::message::Message;
use rpc_frame::utils::integrity::{sign, verify};

fn message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Connect),
        Just(MessageType::ConnectOk),
        Just(MessageType::ConnectFail),
        Just(MessageType::Invoke),
        Just(MessageType::Result),
    ]
}

// Property: any valid header decodes back to the fields it was built from
proptest! {
    #[test]
    fn prop_header_roundtrip(
        msg_type in message_type(),
        flags in any::<u16>(),
        sequence in any::<u16>(),
        body_len in 0u32..=(16 * 1024 * 1024),
        digest in any::<[u8; 20]>(),
    ) {
        let header = Header {
            msg_type,
            flags: Flags::from_bits(flags),
            sequence,
            body_len,
            digest,
        };
        let decoded = Header::decode(&header.encode()).expect("valid header must decode");
        prop_assert_eq!(decoded, header);
    }
}

// Property: a single flipped bit in type, flags, sequence or the low half of
// the body length is caught by the checksum
proptest! {
    #[test]
    fn prop_single_bit_flip_detected(
        msg_type in message_type(),
        flags in any::<u16>(),
        sequence in any::<u16>(),
        body_len in 0u32..=u32::from(u16::MAX),
        byte in prop_oneof![6usize..12, 14usize..16],
        bit in 0u8..8,
    ) {
        let mut bytes = Header {
            msg_type,
            flags: Flags::from_bits(flags),
            sequence,
            body_len,
            digest: ZERO_DIGEST,
        }
        .encode();
        bytes[byte] ^= 1 << bit;

        let is_checksum_mismatch =
            matches!(Header::decode(&bytes), Err(DecodeError::ChecksumMismatch { .. }));
        prop_assert!(is_checksum_mismatch);
    }
}

// Property: flips in the magic tag or version never get past the identity check
proptest! {
    #[test]
    fn prop_identity_flip_detected(byte in 0usize..6, bit in 0u8..8) {
        let mut bytes = Header::new(MessageType::Invoke, Flags::empty(), 1, 0).encode();
        bytes[byte] ^= 1 << bit;

        let is_bad_identity =
            matches!(Header::decode(&bytes), Err(DecodeError::BadMagicOrVersion { .. }));
        prop_assert!(is_bad_identity);
    }
}

// Property: sequence numbers outside u16 are refused at the API boundary
proptest! {
    #[test]
    fn prop_wide_sequence_rejected(sequence in 65536u32..) {
        let result = encode_header(MessageType::Invoke, Flags::empty(), sequence, 0, &ZERO_DIGEST);
        prop_assert_eq!(result, Err(EncodeError::SequenceOutOfRange(u64::from(sequence))));
    }
}

// Property: signing is a pure function of key and body
proptest! {
    #[test]
    fn prop_sign_is_deterministic(
        key in prop::collection::vec(any::<u8>(), 1..128),
        body in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let secret = SharedSecret::new(key);
        let first = sign(&secret, &body);
        prop_assert_eq!(first, sign(&secret, &body));
        prop_assert!(verify(&secret, &body, &first));
    }
}

// Property: authentication symmetry between sender and receiver configuration
proptest! {
    #[test]
    fn prop_authentication_symmetry(
        key in prop::collection::vec(any::<u8>(), 1..64),
        other in prop::collection::vec(any::<u8>(), 1..64),
        body in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        prop_assume!(key != other);
        let secret = SharedSecret::new(key);
        let wrong = SharedSecret::new(other);

        let msg = Message::build(MessageType::Invoke, Flags::empty(), 1, body.clone(), Some(&secret))
            .unwrap();
        let bytes = msg.to_bytes();
        let (head, tail) = bytes.split_at(HEADER_SIZE);

        let same = Message::parse(head, tail, None, Some(&secret)).expect("same key must verify");
        prop_assert_eq!(same.digest(), &sign(&secret, &body));

        let unkeyed = matches!(
            Message::parse(head, tail, None, None),
            Err(ProtocolError::AuthenticationModeMismatch { flag_set: true, key_configured: false })
        );
        prop_assert!(unkeyed);

        let different = matches!(
            Message::parse(head, tail, None, Some(&wrong)),
            Err(ProtocolError::AuthenticationFailed)
        );
        prop_assert!(different);
    }
}

// Property: a body shorter than declared is always reported as truncated
proptest! {
    #[test]
    fn prop_short_body_truncated(
        body in prop::collection::vec(any::<u8>(), 1..1024),
        cut in 1usize..1024,
    ) {
        let cut = cut.min(body.len());
        let msg = Message::build(MessageType::Result, Flags::empty(), 0, body.clone(), None).unwrap();
        let bytes = msg.to_bytes();
        let (head, tail) = bytes.split_at(HEADER_SIZE);

        let result = Message::parse(head, &tail[..tail.len() - cut], None, None);
        let is_truncated = matches!(
            result,
            Err(ProtocolError::Decode(DecodeError::Truncated { expected, actual }))
                if expected == body.len() && actual == body.len() - cut
        );
        prop_assert!(is_truncated);
    }
}
