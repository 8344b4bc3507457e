// Request validation
//
// Routes declare `FieldRule`s against body, query or path parameters. The `Rules`
// stage evaluates every rule and records violations without halting; the terminal
// `CheckValidation` stage halts with the validation envelope if any were recorded,
// so a client sees every problem in one round trip.

pub mod rules;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::pipeline::{Flow, RequestContext, Stage, StageKind};

pub use rules::{FieldRule, Source};

/// One field-level violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Evaluates a batch of field rules, recording violations in declaration order
pub struct Rules {
    rules: Vec<FieldRule>,
}

impl Rules {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Stage for Rules {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn kind(&self) -> StageKind {
        StageKind::Rules
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        let violations: Vec<FieldError> = self
            .rules
            .iter()
            .flat_map(|rule| rule.evaluate(ctx))
            .collect();
        ctx.record_violations(violations);
        Flow::Continue
    }
}

/// Halts with 400 and every recorded violation, if there are any
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckValidation;

#[async_trait]
impl Stage for CheckValidation {
    fn name(&self) -> &'static str {
        "check_validation"
    }

    fn kind(&self) -> StageKind {
        StageKind::Check
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        if ctx.violations().is_empty() {
            Flow::Continue
        } else {
            Flow::Halt(ApiError::Validation(ctx.take_violations()))
        }
    }
}
