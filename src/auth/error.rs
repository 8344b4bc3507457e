// Authentication error types
//
// These carry the precise reason a credential was refused so it can be logged.
// Clients never see that reason: every verification failure collapses into the
// same 401 message when converted to `ApiError`.

use thiserror::Error;

use crate::error::ApiError;
use crate::validation::FieldError;

/// 401 message when no credential was presented
pub const TOKEN_REQUIRED: &str = "Access token required";

/// 401 message for every other verification failure
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// 401 message from a gate that found no identity in the context
pub const AUTHENTICATION_REQUIRED: &str = "Authentication required";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("missing authentication token")]
    MissingToken,

    /// Authorization header present but not `Bearer <token>`
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Bad signature, wrong secret, wrong token kind or undecodable token
    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("token subject does not exist")]
    UnknownIdentity,

    #[error("token subject is deactivated")]
    InactiveIdentity,

    /// The identity store could not answer
    #[error("identity lookup failed")]
    LookupFailed,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is deactivated")]
    AccountDeactivated,

    #[error("password hashing error")]
    PasswordHash,

    #[error("token generation error: {0}")]
    TokenGeneration(String),

    #[error("invalid password: {0}")]
    WeakPassword(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingToken => ApiError::unauthenticated(TOKEN_REQUIRED),
            AuthError::MalformedHeader
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::UnknownIdentity
            | AuthError::InactiveIdentity
            | AuthError::LookupFailed => ApiError::unauthenticated(INVALID_TOKEN),
            AuthError::InvalidCredentials => ApiError::unauthenticated("Invalid email or password"),
            AuthError::AccountDeactivated => ApiError::forbidden("Account is deactivated"),
            AuthError::PasswordHash => ApiError::Internal("password hashing failed".to_string()),
            AuthError::TokenGeneration(detail) => ApiError::Internal(detail),
            AuthError::WeakPassword(message) => ApiError::Validation(vec![FieldError {
                field: "password".to_string(),
                message,
                value: None,
            }]),
        }
    }
}
