use crate::error::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng as PasswordRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes behind every session token.
pub const SESSION_TOKEN_BYTES: usize = 32;

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut PasswordRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| ApiError::Internal(format!("Invalid password hash: {}", e)))?;

    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::Internal(format!(
            "Password verification error: {}",
            e
        ))),
    }
}

/// Generate a URL-safe session token from the OS entropy source.
///
/// # Panics
/// Panics if the operating system cannot supply random bytes. Issuing
/// predictable tokens is never an acceptable fallback.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        tracing::error!(error = %e, "OS entropy source unavailable");
        panic!("insufficient entropy source: {e}");
    }
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derive the stored session id from a raw token (lowercase hex HMAC-SHA256).
pub fn derive_session_id(secret: &str, token: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}
