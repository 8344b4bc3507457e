// JWT token generation and validation service

use crate::auth::error::AuthError;
use crate::config::TokenConfig;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Which secret signed a token, also carried as a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub kind: TokenKind,
    pub iat: i64, // issued at timestamp
    pub exp: i64, // expiration timestamp
}

/// Freshly issued access/refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl SigningKeys {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

/// Token service for JWT operations
///
/// Access and refresh tokens are signed with independent secrets, so a token of
/// one kind never verifies as the other.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: SigningKeys::new(&config.access_secret, config.access_ttl_secs),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_ttl_secs),
            validation,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access.ttl_secs
    }

    /// Generate both access and refresh tokens for a user
    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair, AuthError> {
        self.issue_pair_at(user_id, Utc::now())
    }

    /// Generate both tokens as if issued at `now`
    pub fn issue_pair_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_at(TokenKind::Access, user_id, now)?,
            refresh_token: self.issue_at(TokenKind::Refresh, user_id, now)?,
            expires_in: self.access.ttl_secs,
        })
    }

    /// Generate an access token only
    pub fn issue_access_token(&self, user_id: &str) -> Result<String, AuthError> {
        self.issue_at(TokenKind::Access, user_id, Utc::now())
    }

    fn issue_at(&self, kind: TokenKind, user_id: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let keys = self.keys(kind);
        let iat = now.timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            kind,
            iat,
            exp: iat + keys.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    /// Validate an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(TokenKind::Access, token)
    }

    /// Validate a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(TokenKind::Refresh, token)
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?;

        if claims.kind != kind {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}
