//! Keyed body digests.
//!
//! HMAC-SHA1 over the message body under the session's shared secret. The
//! output is always [`DIGEST_SIZE`] bytes and depends only on key and body,
//! so the receiver can recompute it exactly.

use crate::config::{SharedSecret, DIGEST_SIZE};
use crate::core::header::Digest;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

#[allow(clippy::expect_used)]
fn keyed(key: &[u8], body: &[u8]) -> HmacSha1 {
    // Longer keys are hashed, shorter ones padded to the block size
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac
}

/// Digest of `body` under raw key bytes
pub fn sign_raw(key: &[u8], body: &[u8]) -> Digest {
    let mut digest = [0u8; DIGEST_SIZE];
    digest.copy_from_slice(&keyed(key, body).finalize().into_bytes());
    digest
}

/// Digest of `body` under the shared secret
pub fn sign(secret: &SharedSecret, body: &[u8]) -> Digest {
    sign_raw(secret.as_bytes(), body)
}

/// Recompute the digest and compare it with `expected` in constant time.
///
/// Returns true only on an exact 20-byte match.
pub fn verify(secret: &SharedSecret, body: &[u8], expected: &Digest) -> bool {
    keyed(secret.as_bytes(), body).verify_slice(expected).is_ok()
}
