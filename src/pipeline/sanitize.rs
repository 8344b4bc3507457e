// Input sanitation stage
// Strips script blocks and `javascript:` URI prefixes from every string leaf of the request

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::pipeline::{context::RequestContext, Flow, Stage, StageKind};

fn script_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script block pattern is valid")
    })
}

/// Opening or closing script tags left over once whole blocks are gone
fn stray_script_tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</?script\b[^>]*>").expect("script tag pattern is valid"))
}

fn javascript_scheme() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)javascript\s*:").expect("javascript scheme pattern is valid"))
}

/// Clean one string, borrowing when nothing needed removing.
///
/// Passes repeat until none of the patterns match, since removing one match can
/// splice its neighbours into a new one.
pub fn sanitize_str(input: &str) -> Cow<'_, str> {
    let patterns = [script_block(), stray_script_tag(), javascript_scheme()];
    let mut output = Cow::Borrowed(input);
    while let Some(pattern) = patterns.iter().find(|pattern| pattern.is_match(&output)) {
        output = Cow::Owned(pattern.replace_all(&output, "").into_owned());
    }
    output
}

/// Walk a JSON value and clean every string leaf in place.
/// Returns true if anything changed.
pub fn sanitize_value(value: &mut Value) -> bool {
    match value {
        Value::String(text) => {
            let cleaned = match sanitize_str(text) {
                Cow::Owned(cleaned) => Some(cleaned),
                Cow::Borrowed(_) => None,
            };
            match cleaned {
                Some(cleaned) => {
                    *text = cleaned;
                    true
                }
                None => false,
            }
        }
        Value::Array(items) => items.iter_mut().fold(false, |changed, item| sanitize_value(item) | changed),
        Value::Object(fields) => fields
            .values_mut()
            .fold(false, |changed, field| sanitize_value(field) | changed),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Pipeline stage applying `sanitize_value` to body, query and path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitize;

#[async_trait]
impl Stage for Sanitize {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn kind(&self) -> StageKind {
        StageKind::Sanitize
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        let mut changed = sanitize_value(&mut ctx.body);
        for value in ctx.query.values_mut().chain(ctx.params.values_mut()) {
            changed |= sanitize_value(value);
        }

        if changed {
            tracing::debug!(path = %ctx.path, "stripped script content from request input");
        }
        Flow::Continue
    }
}
