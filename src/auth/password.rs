// Password hashing and validation service

use crate::auth::error::AuthError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password service for hashing and verification
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!("Password hashing failed: {}", e);
                AuthError::PasswordHash
            })
    }

    /// Verify a password against a stored hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            tracing::error!("Stored password hash is unreadable: {}", e);
            AuthError::PasswordHash
        })?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Validate password strength requirements:
    /// at least 8 characters with at least one letter and one digit
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }
        if !password.chars().any(|c| c.is_alphabetic()) || !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one letter and one number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = PasswordService::hash_password("correct-horse-9").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordService::verify_password("correct-horse-9", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong-horse-9", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = PasswordService::hash_password("correct-horse-9").unwrap();
        let second = PasswordService::hash_password("correct-horse-9").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert_eq!(
            PasswordService::verify_password("anything", "not-a-hash"),
            Err(AuthError::PasswordHash)
        );
    }

    #[test]
    fn strength_rules() {
        assert!(PasswordService::validate_password_strength("abc123").is_err());
        assert!(PasswordService::validate_password_strength("abcdefghij").is_err());
        assert!(PasswordService::validate_password_strength("1234567890").is_err());
        assert!(PasswordService::validate_password_strength("abcdefg1").is_ok());
    }
}
