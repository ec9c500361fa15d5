//! DingTalk robot request signing.
//!
//! The platform signs `"{timestamp}\n{secret}"` with HMAC-SHA256 keyed by
//! the shared secret and base64-encodes the digest. The same computation is
//! used in both directions: verifying inbound callbacks and signing
//! outbound robot messages.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature for `timestamp`.
pub fn sign(secret: &str, timestamp: &str) -> String {
    let string_to_sign = format!("{timestamp}\n{secret}");
    // HMAC-SHA256 accepts keys of any length, so this cannot fail.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(string_to_sign.as_bytes());
    B64.encode(mac.finalize().into_bytes())
}

/// Verify an inbound callback signature. Missing or malformed inputs fail
/// verification rather than erroring.
pub fn verify(secret: &str, timestamp: &str, claimed: &str) -> bool {
    if timestamp.is_empty() || claimed.is_empty() {
        return false;
    }
    sign(secret, timestamp) == claimed
}
