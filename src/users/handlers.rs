// HTTP handlers for user profiles and admin account management
//
// Ownership and role checks happen in the route pipeline, and the `id` path
// parameter has already been checked to be a UUID.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::{
    middleware::AuthenticatedUser,
    models::{User, UserResponse},
};
use crate::error::{ApiError, ApiResponse};
use crate::pipeline::ApiJson;
use crate::users::models::{ChangeRoleRequest, UpdateProfileRequest};
use crate::AppState;

fn found(user: Option<User>, id: Uuid) -> Result<UserResponse, ApiError> {
    user.map(UserResponse::from)
        .ok_or_else(|| ApiError::not_found("User", id))
}

/// Admins may not lock themselves out
fn ensure_not_self(caller: &AuthenticatedUser, id: Uuid, action: &str) -> Result<(), ApiError> {
    if caller.user_id() == id.to_string() {
        tracing::warn!("Admin {} tried to {} their own account", id, action);
        return Err(ApiError::BadRequest(format!("Cannot {} your own account", action)));
    }
    Ok(())
}

/// Fetch a user profile (owner or admin)
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 403, description = "Access denied: not the resource owner"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.users.find_by_id(id).await?;
    Ok(Json(ApiResponse::ok(found(user, id)?)))
}

/// Update display name and bio (owner or admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Access denied: not the resource owner"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let display_name = request.display_name.map(|name| name.trim().to_string());
    let user = state.users.update_profile(id, display_name, request.bio).await?;

    tracing::info!("Updated profile of user {}", id);
    Ok(Json(ApiResponse::with_message("Profile updated", found(user, id)?)))
}

/// Deactivate an account (admin only). Its tokens stop working immediately.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/deactivate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deactivated", body = UserResponse),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn deactivate_user_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    ensure_not_self(&caller, id, "deactivate")?;
    let user = found(state.users.set_active(id, false).await?, id)?;

    tracing::info!("Admin {} deactivated user {}", caller.user_id(), id);
    Ok(Json(ApiResponse::with_message("User deactivated", user)))
}

/// Reactivate an account (admin only)
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/activate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account reactivated", body = UserResponse),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn activate_user_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = found(state.users.set_active(id, true).await?, id)?;

    tracing::info!("Admin {} reactivated user {}", caller.user_id(), id);
    Ok(Json(ApiResponse::with_message("User activated", user)))
}

/// Change an account's role (admin only)
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn change_role_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<ChangeRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    ensure_not_self(&caller, id, "change the role of")?;
    let user = found(state.users.set_role(id, request.role).await?, id)?;

    tracing::info!("Admin {} set role of user {} to {}", caller.user_id(), id, request.role);
    Ok(Json(ApiResponse::with_message("Role updated", user)))
}
