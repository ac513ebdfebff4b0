//! Opaque bearer key generation, hashing and header parsing.

use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Random bytes per key; rendered as twice as many hex characters.
const KEY_BYTES: usize = 20;

/// Characters of the raw key kept for display.
pub const KEY_PREFIX_LEN: usize = 10;

/// Generate a cryptographically random key (20 bytes, lowercase hex).
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; KEY_BYTES] = rand::Rng::random(&mut rng);
    hex::encode(bytes)
}

/// SHA-256 hash of a raw key, hex-encoded.
///
/// This is the value stored as `token.key_hash`.
pub fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn key_prefix(raw: &str) -> String {
    raw.chars().take(KEY_PREFIX_LEN).collect()
}

/// Extract the key from an `Authorization: Bearer <key>` header value.
pub fn parse_authorization_header(value: &str) -> Result<&str, AuthError> {
    let (scheme, key) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::TokenInvalid("no credentials provided".into()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::TokenInvalid(format!(
            "unsupported authorization scheme: {scheme}"
        )));
    }

    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(AuthError::TokenInvalid(
            "token string should not contain spaces".into(),
        ));
    }
    Ok(key)
}
