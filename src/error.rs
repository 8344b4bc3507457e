// Error handling module for the MakerHub API
// Provides the shared error type and the JSON envelopes every response is rendered into

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::StoreError;
use crate::validation::FieldError;

/// Top-level message of every validation failure envelope
pub const VALIDATION_FAILED: &str = "Validation failed";

/// Fixed `error` field of every validation failure envelope
pub const INVALID_INPUT: &str = "Invalid input data";

/// Main error type for the API
///
/// Every pipeline stage and handler fails with this type. Each variant maps to
/// one HTTP status code; the client only ever sees the `{success: false, ...}`
/// envelope, never the internal detail carried by 5xx variants.
#[derive(Debug, Error)]
pub enum ApiError {
    /// One or more field-level rule violations (400)
    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Missing, invalid or expired credential, or an unusable identity (401)
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not allowed (403)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed request that is not a field rule violation (400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found by ID (404)
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    /// Duplicate resource (409)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request body exceeded the buffering limit (413)
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Storage failures; duplicates become 409, everything else 500
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else that went wrong on our side (500)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure envelope: `{ success: false, message, error?, data? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ValidationDetails>,
}

/// Payload of the validation failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub errors: Vec<FieldError>,
}

/// Success envelope: `{ success: true, message?, data }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

impl ErrorBody {
    fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
            data: None,
        }
    }
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        ApiError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert ApiError to its envelope, logging at a level matched to severity:
    /// - debug!: expected client errors (validation, not found, bad input)
    /// - warn!: authentication and authorization rejections
    /// - error!: storage and internal failures, whose detail stays server-side
    fn to_error_body(&self) -> ErrorBody {
        match self {
            ApiError::Validation(errors) => {
                debug!(violations = errors.len(), "request validation failed");
                ErrorBody {
                    success: false,
                    message: VALIDATION_FAILED.to_string(),
                    error: Some(INVALID_INPUT.to_string()),
                    data: Some(ValidationDetails {
                        errors: errors.clone(),
                    }),
                }
            }
            ApiError::Unauthenticated(message) => {
                warn!("Unauthenticated request: {}", message);
                ErrorBody::message(message.clone())
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden request: {}", message);
                ErrorBody::message(message.clone())
            }
            ApiError::BadRequest(message) => {
                debug!("Bad request: {}", message);
                ErrorBody::message(message.clone())
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                ErrorBody::message(format!("{} not found", resource))
            }
            ApiError::Conflict(message) => {
                debug!("Conflict: {}", message);
                ErrorBody::message(message.clone())
            }
            ApiError::PayloadTooLarge { limit } => {
                debug!("Request body over {} bytes rejected", limit);
                ErrorBody::message("Request body too large")
            }
            ApiError::Store(StoreError::Duplicate(field)) => {
                debug!("Duplicate value for {}", field);
                ErrorBody::message(format!("{} already exists", capitalize(field)))
            }
            ApiError::Store(store_error) => {
                error!("Store error: {:?}", store_error);
                ErrorBody::message("Internal server error")
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                ErrorBody::message("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected a JSON body (Content-Type: application/json)"
            }
            JsonRejection::JsonSyntaxError(_) => "Malformed JSON body",
            JsonRejection::JsonDataError(_) => "Request body does not match the expected shape",
            _ => "Invalid request body",
        };
        ApiError::BadRequest(message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.to_error_body();
        (self.status_code(), Json(body)).into_response()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_envelope_has_fixed_shape() {
        let (status, body) = body_json(ApiError::Validation(vec![FieldError {
            field: "title".to_string(),
            message: "Title must be between 5 and 200 characters".to_string(),
            value: Some(json!("abc")),
        }]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Validation failed",
                "error": "Invalid input data",
                "data": { "errors": [{
                    "field": "title",
                    "message": "Title must be between 5 and 200 characters",
                    "value": "abc"
                }]}
            })
        );
    }

    #[tokio::test]
    async fn auth_failures_use_message_envelope() {
        let (status, body) = body_json(ApiError::unauthenticated("Access token required")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"success": false, "message": "Access token required"}));

        let (status, body) = body_json(ApiError::forbidden("Insufficient permissions")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"success": false, "message": "Insufficient permissions"}));
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let (status, body) = body_json(ApiError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn duplicate_store_error_is_conflict() {
        let (status, body) = body_json(ApiError::Store(StoreError::Duplicate("email"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Email already exists");
    }
}
