// Declarative field rules
// Provides the builder routes use to describe what a valid body, query or path parameter looks like

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::pipeline::RequestContext;
use crate::validation::FieldError;

/// Which part of the request a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Body,
    Query,
    Params,
}

#[derive(Debug, Clone)]
enum Check {
    String,
    Integer { min: Option<i64>, max: Option<i64> },
    Boolean,
    Length { min: Option<usize>, max: Option<usize> },
    OneOf(Vec<String>),
    Email,
    Url,
    Uuid,
    Pattern { regex: Regex, description: String },
    Array { max_items: Option<usize>, max_item_length: Option<usize> },
}

/// Rules for one field, evaluated independently of every other rule.
///
/// A field is required unless `optional()` is called; missing, `null` and blank
/// strings all count as absent. All checks run, so one field can report several
/// problems (identical consecutive messages are collapsed).
#[derive(Debug, Clone)]
pub struct FieldRule {
    source: Source,
    field: String,
    optional: bool,
    sensitive: bool,
    required_message: Option<String>,
    checks: Vec<(Check, Option<String>)>,
}

impl FieldRule {
    pub fn new(source: Source, field: impl Into<String>) -> Self {
        Self {
            source,
            field: field.into(),
            optional: false,
            sensitive: false,
            required_message: None,
            checks: Vec::new(),
        }
    }

    pub fn body(field: impl Into<String>) -> Self {
        Self::new(Source::Body, field)
    }

    pub fn query(field: impl Into<String>) -> Self {
        Self::new(Source::Query, field)
    }

    pub fn param(field: impl Into<String>) -> Self {
        Self::new(Source::Params, field)
    }

    /// Skip every check when the field is absent
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Never echo the offending value back (passwords, tokens)
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn string(self) -> Self {
        self.check(Check::String)
    }

    pub fn integer(self, min: Option<i64>, max: Option<i64>) -> Self {
        self.check(Check::Integer { min, max })
    }

    pub fn boolean(self) -> Self {
        self.check(Check::Boolean)
    }

    /// Inclusive bounds on the character count
    pub fn length(self, min: usize, max: usize) -> Self {
        self.check(Check::Length {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn min_length(self, min: usize) -> Self {
        self.check(Check::Length {
            min: Some(min),
            max: None,
        })
    }

    pub fn max_length(self, max: usize) -> Self {
        self.check(Check::Length {
            min: None,
            max: Some(max),
        })
    }

    pub fn one_of<S: AsRef<str>>(self, allowed: &[S]) -> Self {
        let allowed = allowed.iter().map(|value| value.as_ref().to_string()).collect();
        self.check(Check::OneOf(allowed))
    }

    pub fn email(self) -> Self {
        self.check(Check::Email)
    }

    pub fn url(self) -> Self {
        self.check(Check::Url)
    }

    pub fn uuid(self) -> Self {
        self.check(Check::Uuid)
    }

    /// The whole string must match `regex`; `description` completes "must ..."
    pub fn matches(self, regex: Regex, description: impl Into<String>) -> Self {
        self.check(Check::Pattern {
            regex,
            description: description.into(),
        })
    }

    pub fn array(self, max_items: Option<usize>, max_item_length: Option<usize>) -> Self {
        self.check(Check::Array {
            max_items,
            max_item_length,
        })
    }

    /// Replace the message of the most recent check, or of the presence check
    /// when no other check was declared yet
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        match self.checks.last_mut() {
            Some((_, slot)) => *slot = Some(message.into()),
            None => self.required_message = Some(message.into()),
        }
        self
    }

    fn check(mut self, check: Check) -> Self {
        self.checks.push((check, None));
        self
    }

    /// Evaluate against a request, returning every violation found
    pub fn evaluate(&self, ctx: &RequestContext) -> Vec<FieldError> {
        let value = ctx.lookup(self.source, &self.field);

        if is_absent(value) {
            if self.optional {
                return Vec::new();
            }
            let message = self
                .required_message
                .clone()
                .unwrap_or_else(|| format!("{} is required", self.field));
            let mut error = FieldError::new(&self.field, message);
            if let Some(value) = value.filter(|_| !self.sensitive) {
                error.value = Some(value.clone());
            }
            return vec![error];
        }

        let Some(value) = value else {
            return Vec::new();
        };

        let mut errors: Vec<FieldError> = Vec::new();
        for (check, custom) in &self.checks {
            if let Err(default_message) = check.evaluate(self.source, &self.field, value) {
                let message = custom.clone().unwrap_or(default_message);
                if errors.last().is_some_and(|last| last.message == message) {
                    continue;
                }
                let mut error = FieldError::new(&self.field, message);
                if !self.sensitive {
                    error.value = Some(value.clone());
                }
                errors.push(error);
            }
        }
        errors
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

impl Check {
    fn evaluate(&self, source: Source, field: &str, value: &Value) -> Result<(), String> {
        let not_string = || format!("{} must be a string", field);

        match self {
            Check::String => value.as_str().map(|_| ()).ok_or_else(not_string),
            Check::Integer { min, max } => {
                let number = as_integer(source, value)
                    .ok_or_else(|| format!("{} must be an integer", field))?;
                let in_range =
                    min.map_or(true, |min| number >= min) && max.map_or(true, |max| number <= max);
                if in_range {
                    Ok(())
                } else {
                    Err(match (min, max) {
                        (Some(min), Some(max)) => {
                            format!("{} must be between {} and {}", field, min, max)
                        }
                        (Some(min), None) => format!("{} must be at least {}", field, min),
                        (None, Some(max)) => format!("{} must be at most {}", field, max),
                        (None, None) => unreachable!("an unbounded range always matches"),
                    })
                }
            }
            Check::Boolean => match value {
                Value::Bool(_) => Ok(()),
                Value::String(text)
                    if source != Source::Body && (text == "true" || text == "false") =>
                {
                    Ok(())
                }
                _ => Err(format!("{} must be a boolean", field)),
            },
            Check::Length { min, max } => {
                let length = value.as_str().ok_or_else(not_string)?.chars().count();
                let in_range =
                    min.map_or(true, |min| length >= min) && max.map_or(true, |max| length <= max);
                if in_range {
                    Ok(())
                } else {
                    Err(match (min, max) {
                        (Some(min), Some(max)) => {
                            format!("{} must be between {} and {} characters", field, min, max)
                        }
                        (Some(min), None) => {
                            format!("{} must be at least {} characters", field, min)
                        }
                        (None, Some(max)) => {
                            format!("{} must be at most {} characters", field, max)
                        }
                        (None, None) => unreachable!("an unbounded length always matches"),
                    })
                }
            }
            Check::OneOf(allowed) => {
                let text = value.as_str().ok_or_else(not_string)?;
                if allowed.iter().any(|candidate| candidate == text) {
                    Ok(())
                } else {
                    Err(format!("{} must be one of: {}", field, allowed.join(", ")))
                }
            }
            Check::Email => {
                let text = value.as_str().ok_or_else(not_string)?;
                if validator::validate_email(text) {
                    Ok(())
                } else {
                    Err(format!("{} must be a valid email address", field))
                }
            }
            Check::Url => {
                let text = value.as_str().ok_or_else(not_string)?;
                if validator::validate_url(text) {
                    Ok(())
                } else {
                    Err(format!("{} must be a valid URL", field))
                }
            }
            Check::Uuid => {
                let text = value.as_str().ok_or_else(not_string)?;
                Uuid::parse_str(text)
                    .map(|_| ())
                    .map_err(|_| format!("{} must be a valid id", field))
            }
            Check::Pattern { regex, description } => {
                let text = value.as_str().ok_or_else(not_string)?;
                let whole_match = regex
                    .find(text)
                    .is_some_and(|found| found.start() == 0 && found.end() == text.len());
                if whole_match {
                    Ok(())
                } else {
                    Err(format!("{} must {}", field, description))
                }
            }
            Check::Array {
                max_items,
                max_item_length,
            } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("{} must be an array", field))?;
                if max_items.is_some_and(|max| items.len() > max) {
                    return Err(format!(
                        "{} must contain at most {} items",
                        field,
                        max_items.unwrap_or_default()
                    ));
                }
                for item in items {
                    let text = item
                        .as_str()
                        .ok_or_else(|| format!("{} must contain only strings", field))?;
                    if let Some(max) = max_item_length {
                        if text.chars().count() > *max {
                            return Err(format!(
                                "{} entries must be at most {} characters",
                                field, max
                            ));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Integers arrive as JSON numbers in bodies and as strings in query/params
fn as_integer(source: Source, value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) if source != Source::Body => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use serde_json::json;

    fn body(value: Value) -> RequestContext {
        RequestContext::new(Method::POST, "/", HeaderMap::new()).with_body(value)
    }

    fn messages(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn missing_required_field() {
        let errors = FieldRule::body("title").string().evaluate(&body(json!({})));
        assert_eq!(messages(&errors), ["title is required"]);
        assert_eq!(errors[0].value, None);

        let errors = FieldRule::body("title").evaluate(&body(json!({ "title": "   " })));
        assert_eq!(messages(&errors), ["title is required"]);
        assert_eq!(errors[0].value, Some(json!("   ")));
    }

    #[test]
    fn optional_field_skips_checks_when_absent() {
        let rule = FieldRule::body("bio").optional().max_length(5);
        assert!(rule.evaluate(&body(json!({}))).is_empty());
        assert!(rule.evaluate(&body(json!({ "bio": null }))).is_empty());
        assert_eq!(rule.evaluate(&body(json!({ "bio": "too long" }))).len(), 1);
    }

    #[test]
    fn length_bounds_are_inclusive_and_count_characters() {
        let rule = FieldRule::body("title").length(3, 5);
        assert!(rule.evaluate(&body(json!({ "title": "abc" }))).is_empty());
        assert!(rule.evaluate(&body(json!({ "title": "ébène" }))).is_empty());
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "title": "ab" })))),
            ["title must be between 3 and 5 characters"]
        );
    }

    #[test]
    fn all_checks_run_and_duplicates_collapse() {
        let rule = FieldRule::body("title").string().length(3, 5).one_of(&["abc"]);
        let errors = rule.evaluate(&body(json!({ "title": 42 })));
        assert_eq!(messages(&errors), ["title must be a string"]);

        let rule = FieldRule::body("category").length(1, 3).one_of(&["wood", "metal"]);
        let errors = rule.evaluate(&body(json!({ "category": "glass" })));
        assert_eq!(
            messages(&errors),
            [
                "category must be between 1 and 3 characters",
                "category must be one of: wood, metal"
            ]
        );
    }

    #[test]
    fn custom_messages_replace_defaults() {
        let rule = FieldRule::body("title")
            .with_message("Title is required")
            .length(5, 200)
            .with_message("Title must be between 5 and 200 characters");

        assert_eq!(messages(&rule.evaluate(&body(json!({})))), ["Title is required"]);
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "title": "abc" })))),
            ["Title must be between 5 and 200 characters"]
        );
    }

    #[test]
    fn format_checks() {
        let email = FieldRule::body("email").email();
        assert!(email.evaluate(&body(json!({ "email": "maker@example.com" }))).is_empty());
        assert_eq!(email.evaluate(&body(json!({ "email": "maker@" }))).len(), 1);

        let url = FieldRule::body("link").url();
        assert!(url.evaluate(&body(json!({ "link": "https://example.com/plans" }))).is_empty());
        assert_eq!(url.evaluate(&body(json!({ "link": "plans" }))).len(), 1);

        let id = FieldRule::param("id").uuid();
        let ctx = RequestContext::new(Method::GET, "/", HeaderMap::new())
            .with_params([("id", "3f2b8c2e-9a44-4c1e-8d6f-2b9c1f0e7a11")]);
        assert!(id.evaluate(&ctx).is_empty());
        let ctx =
            RequestContext::new(Method::GET, "/", HeaderMap::new()).with_params([("id", "42")]);
        assert_eq!(messages(&id.evaluate(&ctx)), ["id must be a valid id"]);
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let rule = FieldRule::body("slug").matches(
            Regex::new("[a-z-]+").unwrap(),
            "contain only lowercase letters and dashes",
        );
        assert!(rule.evaluate(&body(json!({ "slug": "bird-house" }))).is_empty());
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "slug": "Bird house" })))),
            ["slug must contain only lowercase letters and dashes"]
        );
    }

    #[test]
    fn integers_from_query_strings() {
        let rule = FieldRule::query("page").optional().integer(Some(1), Some(100));
        let ctx = |page: &str| {
            RequestContext::new(Method::GET, "/", HeaderMap::new()).with_query([("page", page)])
        };

        assert!(rule.evaluate(&ctx("3")).is_empty());
        assert_eq!(messages(&rule.evaluate(&ctx("0"))), ["page must be between 1 and 100"]);
        assert_eq!(messages(&rule.evaluate(&ctx("two"))), ["page must be an integer"]);
    }

    #[test]
    fn body_scalars_must_have_their_json_type() {
        let published = FieldRule::body("published").optional().boolean();
        assert!(published.evaluate(&body(json!({ "published": false }))).is_empty());
        assert_eq!(
            messages(&published.evaluate(&body(json!({ "published": "true" })))),
            ["published must be a boolean"]
        );

        let count = FieldRule::body("count").integer(None, None);
        assert!(count.evaluate(&body(json!({ "count": 3 }))).is_empty());
        assert_eq!(
            messages(&count.evaluate(&body(json!({ "count": "3" })))),
            ["count must be an integer"]
        );

        let flag = FieldRule::query("draft").boolean();
        let ctx = RequestContext::new(Method::GET, "/", HeaderMap::new())
            .with_query([("draft", "true")]);
        assert!(flag.evaluate(&ctx).is_empty());
    }

    #[test]
    fn arrays_of_strings() {
        let rule = FieldRule::body("tags").optional().array(Some(2), Some(4));
        assert!(rule.evaluate(&body(json!({ "tags": ["wood", "diy"] }))).is_empty());
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "tags": ["a", "b", "c"] })))),
            ["tags must contain at most 2 items"]
        );
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "tags": ["woodwork"] })))),
            ["tags entries must be at most 4 characters"]
        );
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "tags": [1] })))),
            ["tags must contain only strings"]
        );
    }

    #[test]
    fn sensitive_fields_do_not_echo_values() {
        let rule = FieldRule::body("password").sensitive().min_length(8);
        let errors = rule.evaluate(&body(json!({ "password": "short" })));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].value, None);
    }

    #[test]
    fn nested_body_fields() {
        let rule = FieldRule::body("materials.wood").string();
        assert!(rule.evaluate(&body(json!({ "materials": { "wood": "oak" } }))).is_empty());
        assert_eq!(
            messages(&rule.evaluate(&body(json!({ "materials": {} })))),
            ["materials.wood is required"]
        );
    }
}
