//! Password verification using Argon2id.

use argon2::{Argon2, PasswordVerifier};
use tms_core::validation::ValidationErrors;

use crate::error::AuthError;

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// If `pepper` is provided it is prepended to the password before
/// verification; it must match the pepper used during hashing.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Length policy for new passwords, reported against `field`.
pub fn check_password_policy(
    password: &str,
    min_length: usize,
    field: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if password.chars().count() < min_length {
        errors.add(
            field,
            format!("Ensure this field has at least {min_length} characters."),
        );
    }
    if !password.is_empty() && password.trim().is_empty() {
        errors.add(field, "Password may not be only whitespace.");
    }
    errors.into_result()
}
