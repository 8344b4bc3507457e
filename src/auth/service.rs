// Authentication service - business logic layer

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    error::AuthError,
    models::{AccessTokenResponse, AuthResponse, NewUser, Role, User, UserResponse},
    password::PasswordService,
    repository::UserStore,
    token::{TokenPair, TokenService},
};
use crate::error::ApiError;

const TOKEN_TYPE: &str = "Bearer";

/// Authentication service coordinating account and token operations
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    /// Register a new account with the `regular` role and sign it in
    ///
    /// Emails are stored lowercased; a second account with the same email
    /// is a conflict.
    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<AuthResponse, ApiError> {
        PasswordService::validate_password_strength(password)?;

        let email = email.trim().to_lowercase();
        if self.users.find_by_email(&email).await?.is_some() {
            warn!("Registration attempt with existing email");
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }

        let password_hash = PasswordService::hash_password(password)?;
        let user = self
            .users
            .create(NewUser {
                email,
                display_name: display_name.trim().to_string(),
                password_hash,
                role: Role::Regular,
            })
            .await?;

        info!("Registered user {}", user.id);
        self.sign_in(user)
    }

    /// Exchange credentials for a token pair
    ///
    /// Unknown email and wrong password share one error. A deactivated account
    /// is only revealed to a caller who knows the password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !PasswordService::verify_password(password, &user.password_hash)? {
            warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            warn!("Login attempt on deactivated account {}", user.id);
            return Err(AuthError::AccountDeactivated.into());
        }

        info!("User {} logged in", user.id);
        self.sign_in(user)
    }

    /// Mint a new access token from a refresh token.
    /// The account must still exist and be active.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, ApiError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let identity = self
            .users
            .find_identity(&claims.sub)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;
        if !identity.is_active {
            return Err(AuthError::InactiveIdentity.into());
        }

        Ok(AccessTokenResponse {
            access_token: self.tokens.issue_access_token(&identity.id)?,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Profile of the authenticated caller
    pub async fn current_user(&self, user_id: &str) -> Result<UserResponse, ApiError> {
        let id = Uuid::parse_str(user_id).map_err(|_| ApiError::not_found("User", user_id))?;
        self.users
            .find_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| ApiError::not_found("User", id))
    }

    fn sign_in(&self, user: User) -> Result<AuthResponse, ApiError> {
        let TokenPair {
            access_token,
            refresh_token,
            expires_in,
        } = self.tokens.issue_pair(&user.id.to_string())?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in,
            user: user.into(),
        })
    }
}
