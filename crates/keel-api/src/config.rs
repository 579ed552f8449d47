//! Application configuration
//!
//! # Example
//! ```rust
//! use keel_api::AppConfig;
//!
//! // Defaults: lenient, no response validation, validation failures logged
//! let config = AppConfig::default();
//! assert!(!config.strict);
//!
//! // Or layered from KEEL_* environment variables
//! let config = AppConfig::from_env();
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_STRICT: &str = "KEEL_STRICT";
pub const ENV_VALIDATE_RESPONSES: &str = "KEEL_VALIDATE_RESPONSES";
pub const ENV_LOG_VALIDATION_ERRORS: &str = "KEEL_LOG_VALIDATION_ERRORS";

/// App-wide validation settings. Individual routes may override `strict` and
/// `validate_responses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reject unknown keys on top-level input objects
    pub strict: bool,
    /// Validate handler return values against `responses[200]`
    pub validate_responses: bool,
    /// Emit a warning for every input validation failure
    pub log_validation_errors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            strict: false,
            validate_responses: false,
            log_validation_errors: true,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    pub fn validate_responses(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    pub fn log_validation_errors(mut self, enabled: bool) -> Self {
        self.log_validation_errors = enabled;
        self
    }

    /// Defaults overridden by `KEEL_STRICT`, `KEEL_VALIDATE_RESPONSES` and
    /// `KEEL_LOG_VALIDATION_ERRORS`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `KEEL_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparsable values are
    /// ignored with a warning.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut bool); 3] = [
            (ENV_STRICT, &mut self.strict),
            (ENV_VALIDATE_RESPONSES, &mut self.validate_responses),
            (ENV_LOG_VALIDATION_ERRORS, &mut self.log_validation_errors),
        ];

        for (key, slot) in targets {
            let Some(raw) = lookup(key) else { continue };
            match parse_flag(&raw) {
                Some(value) => *slot = value,
                None => warn!(key, value = %raw, "Ignoring unparsable boolean setting"),
            }
        }

        self
    }
}

/// Accepts 1/0, true/false, yes/no, on/off (any case).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Per-route settings with the app-level fallback applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub strict: bool,
    pub validate_response: bool,
}

impl ResolvedConfig {
    pub fn resolve(app: &AppConfig, strict: Option<bool>, validate_response: Option<bool>) -> Self {
        Self {
            strict: strict.unwrap_or(app.strict),
            validate_response: validate_response.unwrap_or(app.validate_responses),
        }
    }
}
