// Authentication stage and the extractors handlers use to read its result

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::{
    error::{AuthError, AUTHENTICATION_REQUIRED},
    models::{Identity, Role},
    repository::UserStore,
    token::TokenService,
};
use crate::error::ApiError;
use crate::pipeline::{AuthContext, Flow, RequestContext, Stage, StageKind};

/// Whether a request without a usable credential may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Halt with 401
    Required,
    /// Continue anonymously
    Optional,
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?
        .trim_start();

    if value.trim_end().is_empty() {
        return Err(AuthError::MissingToken);
    }

    // A bare scheme with nothing after it is a missing credential, not a malformed one
    let (scheme, token) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verifies the bearer credential and attaches the caller's identity to the context.
///
/// Performs exactly one identity lookup per request carrying a valid token. An
/// unknown or deactivated identity, or a failed lookup, is treated exactly like a
/// bad signature.
#[derive(Clone)]
pub struct Authenticate {
    mode: AuthMode,
    tokens: Arc<TokenService>,
    users: Arc<dyn UserStore>,
}

impl Authenticate {
    pub fn new(mode: AuthMode, tokens: Arc<TokenService>, users: Arc<dyn UserStore>) -> Self {
        Self { mode, tokens, users }
    }

    pub fn required(tokens: Arc<TokenService>, users: Arc<dyn UserStore>) -> Self {
        Self::new(AuthMode::Required, tokens, users)
    }

    pub fn optional(tokens: Arc<TokenService>, users: Arc<dyn UserStore>) -> Self {
        Self::new(AuthMode::Optional, tokens, users)
    }

    /// Resolve the request's credential to an active identity
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.tokens.verify_access(token)?;

        let identity = self
            .users
            .find_identity(&claims.sub)
            .await
            .map_err(|e| {
                error!("Identity lookup failed for user_id={}: {}", claims.sub, e);
                AuthError::LookupFailed
            })?
            .ok_or(AuthError::UnknownIdentity)?;

        if !identity.is_active {
            return Err(AuthError::InactiveIdentity);
        }
        Ok(identity)
    }
}

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        match self.mode {
            AuthMode::Required => "authenticate",
            AuthMode::Optional => "authenticate_optional",
        }
    }

    fn kind(&self) -> StageKind {
        StageKind::Authenticate
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        match self.resolve(&ctx.headers).await {
            Ok(identity) => {
                debug!(user_id = %identity.id, role = %identity.role, "request authenticated");
                ctx.attach_identity(identity);
                Flow::Continue
            }
            Err(reason) => match self.mode {
                AuthMode::Required => {
                    warn!(%reason, path = %ctx.path, "rejecting unauthenticated request");
                    Flow::Halt(reason.into())
                }
                AuthMode::Optional => {
                    if reason != AuthError::MissingToken {
                        warn!(%reason, path = %ctx.path, "ignoring unusable bearer credential, continuing anonymously");
                    }
                    Flow::Continue
                }
            },
        }
    }
}

/// Authenticated caller, for handlers behind a required `Authenticate` stage
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|auth| auth.identity.clone())
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::unauthenticated(AUTHENTICATION_REQUIRED))
    }
}

/// Caller identity if one was established, for routes with optional authentication
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthContext>()
                .and_then(|auth| auth.identity.clone()),
        ))
    }
}
