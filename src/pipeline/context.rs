// Per-request state threaded through the guard pipeline

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, HeaderMap, Method},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::auth::models::Identity;
use crate::error::ApiError;
use crate::validation::{FieldError, Source};

/// Framework-independent view of one request, owned by the pipeline while it runs.
///
/// Body, query and path parameters are held as JSON so stages can read and
/// rewrite them uniformly. Query and path values are always strings.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    /// `Null` when the body was empty or not JSON
    pub body: Value,
    identity: Option<Identity>,
    violations: Vec<FieldError>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            params: Map::new(),
            query: Map::new(),
            body: Value::Null,
            identity: None,
            violations: Vec::new(),
        }
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = string_map(params);
        self
    }

    pub fn with_query<I, K, V>(mut self, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = string_map(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.id.as_str())
    }

    pub fn attach_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Look a field up in one of the three inputs. Body fields may use a dotted
    /// path (`address.city`) to reach nested objects.
    pub fn lookup(&self, source: Source, field: &str) -> Option<&Value> {
        match source {
            Source::Params => self.params.get(field),
            Source::Query => self.query.get(field),
            Source::Body => field
                .split('.')
                .try_fold(&self.body, |current, segment| current.get(segment)),
        }
    }

    pub fn record_violations(&mut self, violations: impl IntoIterator<Item = FieldError>) {
        self.violations.extend(violations);
    }

    pub fn violations(&self) -> &[FieldError] {
        &self.violations
    }

    pub fn take_violations(&mut self) -> Vec<FieldError> {
        std::mem::take(&mut self.violations)
    }
}

fn string_map<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), Value::String(value.into())))
        .collect()
}

/// What the pipeline hands to handlers once it lets a request through
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub identity: Option<Identity>,
}

/// Sanitized query parameters, as seen by the validation rules
#[derive(Debug, Clone, Default)]
pub struct CleanInputs {
    pub query: Map<String, Value>,
}

impl CleanInputs {
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.query.clone()))
    }
}

/// Query parameters as the pipeline left them, after sanitation.
/// Outside a pipeline the raw query string is used.
#[derive(Debug, Clone)]
pub struct CleanQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for CleanQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let parsed = match parts.extensions.get::<CleanInputs>() {
            Some(inputs) => inputs.query_as::<T>().map_err(|e| e.to_string()),
            None => Query::<T>::try_from_uri(&parts.uri)
                .map(|Query(query)| query)
                .map_err(|e| e.body_text()),
        };

        parsed.map(CleanQuery).map_err(|detail| {
            tracing::debug!("Rejected query parameters: {}", detail);
            ApiError::BadRequest("Invalid query parameters".to_string())
        })
    }
}

/// JSON request body whose rejections render as the failure envelope
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Deserialize an optional number that may arrive as a JSON number or as a
/// string (query values are always strings).
pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => raw.trim().parse().map(Some).map_err(serde::de::Error::custom),
        Some(Value::Number(number)) => number
            .to_string()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!("expected a number, got {}", other))),
    }
}
