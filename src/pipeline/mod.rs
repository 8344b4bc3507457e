// Request guard pipeline
//
// Every endpoint declares an ordered list of stages (sanitation, authentication,
// authorization gates, field rules, validation check). Each stage either lets the
// request continue or halts it with an `ApiError`; the first halt ends the chain.
// The pipeline itself knows nothing about axum; `run_pipeline` is the adapter that
// mounts it as middleware in front of a handler.

pub mod context;
pub mod sanitize;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, Instrument};

use crate::error::ApiError;
use crate::validation::{CheckValidation, FieldRule, Rules};

pub use context::{ApiJson, AuthContext, CleanInputs, CleanQuery, RequestContext};
pub use sanitize::Sanitize;

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Outcome of one stage
#[derive(Debug)]
pub enum Flow {
    Continue,
    Halt(ApiError),
}

/// Role a stage plays in the chain; used to check ordering when a pipeline is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Sanitize,
    Authenticate,
    Gate,
    Rules,
    Check,
    Custom,
}

/// One step of a request pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> StageKind {
        StageKind::Custom
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow;
}

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("stage '{stage}' needs an authenticate stage before it")]
    GateBeforeAuthentication { stage: &'static str },

    #[error("sanitize must run before any field rules")]
    SanitizeAfterRules,
}

/// An ordered, immutable chain of stages
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    body_limit: usize,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage in order until one halts
    pub async fn execute(&self, ctx: &mut RequestContext) -> Flow {
        for stage in &self.stages {
            if let Flow::Halt(error) = stage.run(ctx).await {
                debug!(stage = stage.name(), path = %ctx.path, "pipeline halted");
                return Flow::Halt(error);
            }
        }
        Flow::Continue
    }
}

/// Builder enforcing the ordering rules of a pipeline:
/// gates need a preceding authenticate stage, and sanitation precedes rules.
/// A `CheckValidation` stage is appended automatically when rules were added.
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    body_limit: usize,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn sanitize(self) -> Self {
        self.stage(Sanitize)
    }

    pub fn rules(self, rules: Vec<FieldRule>) -> Self {
        self.stage(Rules::new(rules))
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn build(mut self) -> Result<Pipeline, PipelineError> {
        let mut authenticated = false;
        let mut has_rules = false;

        for stage in &self.stages {
            match stage.kind() {
                StageKind::Authenticate => authenticated = true,
                StageKind::Gate if !authenticated => {
                    return Err(PipelineError::GateBeforeAuthentication { stage: stage.name() });
                }
                StageKind::Rules => has_rules = true,
                StageKind::Sanitize if has_rules => return Err(PipelineError::SanitizeAfterRules),
                _ => {}
            }
        }

        let has_check = self.stages.iter().any(|stage| stage.kind() == StageKind::Check);
        if has_rules && !has_check {
            self.stages.push(Box::new(CheckValidation));
        }

        Ok(Pipeline {
            stages: self.stages,
            body_limit: self.body_limit,
        })
    }
}

/// axum middleware running a pipeline in front of the wrapped handler.
///
/// The body is buffered so stages can read and rewrite it; a JSON body is
/// re-serialized after sanitation. On success the handler sees the cleaned
/// body, an `AuthContext` and a `CleanInputs` extension.
pub async fn run_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let span = tracing::debug_span!("pipeline", method = %request.method(), path = %request.uri().path());
    async move {
        let (mut parts, body) = request.into_parts();

        let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
            .map(|Path(params)| params)
            .unwrap_or_default();
        let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
            Ok(Query(query)) => query,
            Err(_) => return ApiError::BadRequest("Malformed query string".to_string()).into_response(),
        };
        let bytes = match to_bytes(body, pipeline.body_limit).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return ApiError::PayloadTooLarge {
                    limit: pipeline.body_limit,
                }
                .into_response()
            }
        };
        let json_body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };

        let mut ctx = RequestContext::new(parts.method.clone(), parts.uri.path(), parts.headers.clone())
            .with_params(params)
            .with_query(query)
            .with_body(json_body.clone().unwrap_or(Value::Null));

        if let Flow::Halt(error) = pipeline.execute(&mut ctx).await {
            return error.into_response();
        }

        let body = match json_body {
            Some(_) => match serde_json::to_vec(&ctx.body) {
                Ok(rewritten) => {
                    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                    Body::from(rewritten)
                }
                Err(e) => return ApiError::Internal(e.to_string()).into_response(),
            },
            None => Body::from(bytes),
        };

        parts.extensions.insert(AuthContext {
            identity: ctx.identity().cloned(),
        });
        parts.extensions.insert(CleanInputs {
            query: std::mem::take(&mut ctx.query),
        });

        next.run(Request::from_parts(parts, body)).await
    }
    .instrument(span)
    .await
}
