//! Request and response validation
//!
//! Bridges [`keel_validation`] into the request pipeline: picks the object
//! mode for a route, converts parse issues into [`ValidationError`]s and logs
//! failures when the app asks for it.

use std::fmt;

use keel_validation::{parse, Issue, ObjectMode, TypeDescriptor};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::AppConfig;

// ============================================================================
// Input Sources
// ============================================================================

/// Which part of the exchange a schema is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Query,
    Params,
    Body,
    /// Handler output for the given status code
    Response(u16),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Params => write!(f, "params"),
            Self::Body => write!(f, "body"),
            Self::Response(code) => write!(f, "response ({})", code),
        }
    }
}

// ============================================================================
// Validation Error
// ============================================================================

/// One failed constraint, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationDetail {
    /// Dotted path, empty for the root
    pub path: String,
    pub message: String,
    /// The entire payload that was validated
    pub value: Value,
}

impl ValidationDetail {
    fn from_issue(issue: &Issue, data: &Value) -> Self {
        Self {
            path: issue.path_string(),
            message: issue.message.clone(),
            value: data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation failed for {context}")]
pub struct ValidationError {
    pub context: InputSource,
    pub details: Vec<ValidationDetail>,
}

impl ValidationError {
    pub fn details_json(&self) -> Value {
        serde_json::to_value(&self.details).unwrap_or(Value::Array(Vec::new()))
    }
}

// ============================================================================
// Validators
// ============================================================================

/// How unknown keys on the top-level object are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Unknown keys pass through to the handler unmodified
    Lenient,
    /// Unknown keys are reported as issues
    Strict,
}

impl Validator {
    pub fn for_strictness(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }

    pub fn mode(&self) -> ObjectMode {
        match self {
            Self::Lenient => ObjectMode::Passthrough,
            Self::Strict => ObjectMode::Strict,
        }
    }

    /// Parse `data`, mapping every issue to a detail under `context`.
    pub fn run(
        &self,
        data: &Value,
        schema: &TypeDescriptor,
        context: InputSource,
    ) -> Result<Value, ValidationError> {
        parse(data, schema, self.mode()).map_err(|issues| ValidationError {
            context,
            details: issues
                .iter()
                .map(|issue| ValidationDetail::from_issue(issue, data))
                .collect(),
        })
    }
}

/// Validate `data` against `schema`.
///
/// `strict` overrides `config.strict` when given. Failures are logged as
/// warnings when `config.log_validation_errors` is set.
pub fn validate(
    data: &Value,
    schema: &TypeDescriptor,
    context: InputSource,
    strict: Option<bool>,
    config: &AppConfig,
) -> Result<Value, ValidationError> {
    let validator = Validator::for_strictness(strict.unwrap_or(config.strict));

    validator.run(data, schema, context).map_err(|err| {
        if config.log_validation_errors {
            warn!(
                context = %err.context,
                data = %data,
                details = %err.details_json(),
                "Validation failed"
            );
        }
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_validation::FieldDescriptor;
    use serde_json::json;

    fn user_schema() -> TypeDescriptor {
        TypeDescriptor::object(vec![
            FieldDescriptor::new("name", TypeDescriptor::string()),
            FieldDescriptor::new("email", TypeDescriptor::email()),
        ])
    }

    #[test]
    fn test_context_display() {
        assert_eq!(InputSource::Query.to_string(), "query");
        assert_eq!(InputSource::Params.to_string(), "params");
        assert_eq!(InputSource::Body.to_string(), "body");
        assert_eq!(InputSource::Response(200).to_string(), "response (200)");
    }

    #[test]
    fn test_lenient_keeps_unknown_keys() {
        let data = json!({"name": "Ada", "email": "ada@x.io", "extra": 1});
        let out = validate(&data, &user_schema(), InputSource::Body, None, &AppConfig::default())
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_strict_argument_overrides_config() {
        let data = json!({"name": "Ada", "email": "ada@x.io", "extra": 1});
        let config = AppConfig::default();

        let err = validate(&data, &user_schema(), InputSource::Body, Some(true), &config)
            .unwrap_err();
        assert_eq!(err.context, InputSource::Body);
        assert_eq!(err.details.len(), 1);
        assert!(err.details[0].message.contains("extra"));

        let strict_app = AppConfig::default().strict(true);
        assert!(validate(&data, &user_schema(), InputSource::Body, Some(false), &strict_app).is_ok());
    }

    #[test]
    fn test_details_carry_path_and_payload() {
        let data = json!({"name": 5, "email": "nope"});
        let err = validate(
            &data,
            &user_schema(),
            InputSource::Body,
            None,
            &AppConfig::default().log_validation_errors(false),
        )
        .unwrap_err();

        let paths: Vec<&str> = err.details.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "email"]);
        assert!(err.details.iter().all(|d| d.value == data));
        assert_eq!(err.to_string(), "Validation failed for body");
    }

    #[test]
    fn test_root_type_mismatch_has_empty_path() {
        let err = Validator::Lenient
            .run(&json!("x"), &user_schema(), InputSource::Query)
            .unwrap_err();
        assert_eq!(err.details[0].path, "");
        assert_eq!(err.details[0].message, "Expected object, got string");
    }
}
