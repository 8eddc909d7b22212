// Shared-secret and HMAC signature checks for the trigger endpoint and the
// inbound delivery webhook

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Generate a secret suitable for trigger or webhook authentication:
/// 32 random bytes, hex-encoded.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    hex::encode(random_bytes)
}

/// Validate an HMAC-SHA256 hex signature over a raw request body.
///
/// The comparison runs through `Mac::verify_slice`, which is constant-time.
pub fn validate_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(signature_bytes) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Compute the hex HMAC-SHA256 signature for a payload. Used by tests and
/// by operators wiring up providers.
pub fn sign(payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Compare a provided shared secret against the expected one without
/// leaking position information: both sides are hashed to fixed length
/// before the byte-wise comparison.
pub fn verify_shared_secret(provided: &str, expected: &str) -> bool {
    let provided_digest = Sha256::digest(provided.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());

    let mut diff = 0u8;
    for (a, b) in provided_digest.iter().zip(expected_digest.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
