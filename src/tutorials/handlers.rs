// HTTP handlers for tutorial endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::{
    authorize::ensure_owner_or_admin,
    middleware::{AuthenticatedUser, MaybeUser},
    models::{Identity, Role},
};
use crate::error::{ApiError, ApiResponse};
use crate::pipeline::{ApiJson, CleanQuery};
use crate::tutorials::models::{
    normalize_tags, CreateTutorialRequest, Tutorial, TutorialChanges, TutorialFilter, TutorialListParams,
    TutorialPage, Visibility,
};
use crate::AppState;

fn visibility_for(viewer: Option<&Identity>) -> Visibility {
    match viewer {
        None => Visibility::PublishedOnly,
        Some(identity) if identity.role == Role::Admin => Visibility::All,
        Some(identity) => match Uuid::parse_str(&identity.id) {
            Ok(id) => Visibility::PublishedOrAuthor(id),
            Err(_) => Visibility::PublishedOnly,
        },
    }
}

/// Load a tutorial the caller may act on as owner or admin
async fn owned_tutorial(state: &AppState, caller: &AuthenticatedUser, id: Uuid) -> Result<Tutorial, ApiError> {
    let tutorial = state
        .tutorials
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tutorial", id))?;

    let owner = tutorial.author_id.to_string();
    ensure_owner_or_admin(Some(caller.identity()), Some(owner.as_str()))?;
    Ok(tutorial)
}

/// List tutorials, newest first
///
/// Anonymous callers see published tutorials only; signed-in callers also see
/// their own drafts, admins see everything.
#[utoipa::path(
    get,
    path = "/api/tutorials",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100"),
        ("category" = Option<String>, Query, description = "Category filter"),
        ("difficulty" = Option<String>, Query, description = "Difficulty filter")
    ),
    responses(
        (status = 200, description = "One page of tutorials", body = TutorialPage),
        (status = 400, description = "Validation failed")
    ),
    tag = "tutorials"
)]
pub async fn list_tutorials_handler(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    CleanQuery(params): CleanQuery<TutorialListParams>,
) -> Result<Json<ApiResponse<TutorialPage>>, ApiError> {
    tracing::debug!("Listing tutorials with {:?}", params);

    let filter = TutorialFilter {
        category: params.category,
        difficulty: params.difficulty,
        visibility: visibility_for(viewer.as_ref()),
        limit: params.limit(),
        offset: params.offset(),
    };
    let (items, total) = state.tutorials.list(&filter).await?;

    Ok(Json(ApiResponse::ok(TutorialPage {
        items,
        page: params.page(),
        limit: params.limit(),
        total,
    })))
}

/// Fetch one tutorial. Drafts read as not found unless the caller is the author or an admin.
#[utoipa::path(
    get,
    path = "/api/tutorials/{id}",
    params(("id" = Uuid, Path, description = "Tutorial ID")),
    responses(
        (status = 200, description = "Tutorial", body = Tutorial),
        (status = 404, description = "Tutorial not found")
    ),
    tag = "tutorials"
)]
pub async fn get_tutorial_handler(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Tutorial>>, ApiError> {
    let tutorial = state
        .tutorials
        .find_by_id(id)
        .await?
        .filter(|tutorial| visibility_for(viewer.as_ref()).allows(tutorial))
        .ok_or_else(|| ApiError::not_found("Tutorial", id))?;

    Ok(Json(ApiResponse::ok(tutorial)))
}

/// Publish a tutorial (content creators and admins)
#[utoipa::path(
    post,
    path = "/api/tutorials",
    request_body = CreateTutorialRequest,
    responses(
        (status = 201, description = "Tutorial created", body = Tutorial),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Access token required"),
        (status = 403, description = "Insufficient permissions")
    ),
    security(("bearer_auth" = [])),
    tag = "tutorials"
)]
pub async fn create_tutorial_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateTutorialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Tutorial>>), ApiError> {
    let author_id = Uuid::parse_str(caller.user_id())
        .map_err(|_| ApiError::Internal(format!("identity id is not a UUID: {}", caller.user_id())))?;

    let tutorial = state.tutorials.create(request.into_new(author_id)).await?;

    tracing::info!("User {} created tutorial {}", author_id, tutorial.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Tutorial created", tutorial)),
    ))
}

/// Edit a tutorial (its author or an admin)
#[utoipa::path(
    put,
    path = "/api/tutorials/{id}",
    params(("id" = Uuid, Path, description = "Tutorial ID")),
    request_body = TutorialChanges,
    responses(
        (status = 200, description = "Tutorial updated", body = Tutorial),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Access denied: not the resource owner"),
        (status = 404, description = "Tutorial not found")
    ),
    security(("bearer_auth" = [])),
    tag = "tutorials"
)]
pub async fn update_tutorial_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
    ApiJson(mut changes): ApiJson<TutorialChanges>,
) -> Result<Json<ApiResponse<Tutorial>>, ApiError> {
    owned_tutorial(&state, &caller, id).await?;

    changes.title = changes.title.map(|title| title.trim().to_string());
    changes.description = changes.description.map(|text| text.trim().to_string());
    changes.tags = changes.tags.map(normalize_tags);

    let tutorial = state
        .tutorials
        .update(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Tutorial", id))?;

    tracing::info!("User {} updated tutorial {}", caller.user_id(), id);
    Ok(Json(ApiResponse::with_message("Tutorial updated", tutorial)))
}

/// Delete a tutorial (its author or an admin)
#[utoipa::path(
    delete,
    path = "/api/tutorials/{id}",
    params(("id" = Uuid, Path, description = "Tutorial ID")),
    responses(
        (status = 204, description = "Tutorial deleted"),
        (status = 403, description = "Access denied: not the resource owner"),
        (status = 404, description = "Tutorial not found")
    ),
    security(("bearer_auth" = [])),
    tag = "tutorials"
)]
pub async fn delete_tutorial_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    owned_tutorial(&state, &caller, id).await?;

    if !state.tutorials.delete(id).await? {
        return Err(ApiError::not_found("Tutorial", id));
    }

    tracing::info!("User {} deleted tutorial {}", caller.user_id(), id);
    Ok(StatusCode::NO_CONTENT)
}
