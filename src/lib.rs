// MakerHub API
// Backend of a DIY-tutorial community: accounts, profiles and tutorials behind a per-route guard pipeline

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod telemetry;
pub mod tutorials;
pub mod users;
pub mod validation;

#[cfg(test)]
mod tests;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{
    models::{AccessTokenResponse, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, Role, UserResponse},
    AuthService, TokenService, UserStore,
};
use crate::pipeline::PipelineError;
use crate::tutorials::{
    models::{Category, CreateTutorialRequest, Difficulty, Tutorial, TutorialChanges, TutorialPage},
    TutorialStore,
};
use crate::users::models::{ChangeRoleRequest, UpdateProfileRequest};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register_handler,
        auth::handlers::login_handler,
        auth::handlers::refresh_handler,
        auth::handlers::me_handler,
        users::handlers::get_user_handler,
        users::handlers::update_user_handler,
        users::handlers::deactivate_user_handler,
        users::handlers::activate_user_handler,
        users::handlers::change_role_handler,
        tutorials::handlers::list_tutorials_handler,
        tutorials::handlers::get_tutorial_handler,
        tutorials::handlers::create_tutorial_handler,
        tutorials::handlers::update_tutorial_handler,
        tutorials::handlers::delete_tutorial_handler,
    ),
    components(
        schemas(
            Role, UserResponse, RegisterRequest, LoginRequest, RefreshRequest, AuthResponse,
            AccessTokenResponse, UpdateProfileRequest, ChangeRoleRequest, Category, Difficulty,
            Tutorial, CreateTutorialRequest, TutorialChanges, TutorialPage
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and tokens"),
        (name = "users", description = "User profiles"),
        (name = "admin", description = "Account administration"),
        (name = "tutorials", description = "DIY tutorials")
    ),
    info(
        title = "MakerHub API",
        version = "0.1.0",
        description = "Backend API for the MakerHub DIY tutorial community"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Application state shared across handlers and guard stages
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: Arc<dyn UserStore>,
    pub tutorials: Arc<dyn TutorialStore>,
    pub tokens: Arc<TokenService>,
    /// Largest request body a pipeline buffers
    pub body_limit: usize,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tutorials: Arc<dyn TutorialStore>,
        tokens: Arc<TokenService>,
        body_limit: usize,
    ) -> Self {
        Self {
            auth: AuthService::new(users.clone(), tokens.clone()),
            users,
            tutorials,
            tokens,
            body_limit,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "message": "OK" }))
}

/// Creates the application router: health check, API docs and every guarded route
///
/// Fails if any route's pipeline is misconfigured.
pub fn create_router(state: AppState) -> Result<Router, PipelineError> {
    let api = routes::api_routes(&state)?;

    Ok(Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .merge(api)
        .with_state(state))
}
