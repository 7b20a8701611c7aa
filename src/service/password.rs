use argon2::{
    password_hash::{PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use rand::RngCore;

use crate::error::{ServiceError, ServiceResult};

/// Only rule: a minimum length in characters.
pub fn validate_password(password: &str, min_length: usize) -> ServiceResult<()> {
    if password.chars().count() < min_length {
        return Err(ServiceError::WeakPassword(min_length));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|err| ServiceError::PasswordHash(err.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| ServiceError::PasswordHash(err.to_string()))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(hash: &str, password: &str) -> ServiceResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|_| ServiceError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ServiceError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_verifies() {
        let first = hash_password("longenough1").unwrap();
        let second = hash_password("longenough1").unwrap();
        assert_ne!(first, "longenough1");
        assert_ne!(first, second);
        assert!(verify_password(&first, "longenough1").is_ok());
        assert!(matches!(
            verify_password(&first, "wrong-password"),
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[test]
    fn length_is_counted_in_characters() {
        assert!(matches!(validate_password("short", 8), Err(ServiceError::WeakPassword(8))));
        assert!(validate_password("ünïcödé", 7).is_ok());
        assert!(validate_password("12345678", 8).is_ok());
    }

    #[test]
    fn garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("not-a-phc-string", "whatever"),
            Err(ServiceError::InvalidCredentials)
        ));
    }
}
