// HTTP handlers for authentication endpoints
// Request bodies reach these handlers already sanitized and validated by the route pipeline

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::{
    middleware::AuthenticatedUser,
    models::{AccessTokenResponse, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UserResponse},
};
use crate::error::{ApiError, ApiResponse};
use crate::pipeline::ApiJson;
use crate::AppState;

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; body is the success envelope around AuthResponse", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already exists")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    tracing::debug!("Registering new account");
    let response = state
        .auth
        .register(&request.email, &request.password, &request.display_name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User registered successfully", response)),
    ))
}

/// Exchange email and password for a token pair
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account is deactivated")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let response = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(ApiResponse::with_message("Login successful", response)))
}

/// Mint a new access token from a refresh token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<ApiResponse<AccessTokenResponse>>, ApiError> {
    let response = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(ApiResponse::ok(response)))
}

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Access token required")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let profile = state.auth.current_user(user.user_id()).await?;
    Ok(Json(ApiResponse::ok(profile)))
}
