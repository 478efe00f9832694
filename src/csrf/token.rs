//! Token value generation, format checks, and hash helpers.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Generate a hex-encoded token of `len_bytes` random bytes.
///
/// `thread_rng` is a CSPRNG; failure of the underlying entropy source is a
/// process-fatal condition, not a recoverable error. The raw byte buffer is
/// scrubbed once the hex encoding exists.
pub fn generate_value(len_bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = Zeroizing::new(vec![0u8; len_bytes]);
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes.as_slice())
}

/// Check that a token is a hex string of exactly `len_bytes * 2` characters.
///
/// This is the stateless fallback used when no session identifier is
/// available to look up server-side state.
pub fn is_well_formed(token: &str, len_bytes: usize) -> bool {
    token.len() == len_bytes * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hex SHA-256 digest of `token || secret`.
///
/// Optional integrity layer binding a token to a secret that is never sent
/// to the client.
pub fn token_hash(token: &str, secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(secret);
    hex::encode(hasher.finalize())
}

/// Re-derive the hash and compare in constant time.
pub fn verify_token_hash(token: &str, hash: &str, secret: &[u8]) -> bool {
    constant_time_eq(token_hash(token, secret).as_bytes(), hash.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
