//! Bounds and formats attached to primitive descriptors, and the field
//! descriptors that make up object schemas.

use serde_json::Value;

use crate::types::TypeDescriptor;

// ============================================================================
// String Constraints
// ============================================================================

/// Constraints for string validation
#[derive(Debug, Clone, Default)]
pub struct StringConstraints {
    /// Minimum length (in characters, not bytes)
    pub min_length: Option<usize>,
    /// Maximum length (in characters, not bytes)
    pub max_length: Option<usize>,
    /// Regex pattern (compiled at validation time)
    pub pattern: Option<String>,
    /// Predefined format validator
    pub format: Option<StringFormat>,
}

impl StringConstraints {
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Predefined string format validators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// Email address format
    Email,
    /// URL format (http/https)
    Url,
    /// UUID format (any RFC 4122 version)
    Uuid,
    /// ISO 8601 DateTime format
    DateTime,
    /// Date format (YYYY-MM-DD)
    Date,
    /// Time format (HH:MM:SS)
    Time,
}

impl StringFormat {
    /// Name used both in error messages and in the `format` keyword of exported schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "uri",
            Self::Uuid => "uuid",
            Self::DateTime => "date-time",
            Self::Date => "date",
            Self::Time => "time",
        }
    }
}

// ============================================================================
// Numeric Constraints
// ============================================================================

/// Constraints for numeric validation (generic over i64 and f64)
#[derive(Debug, Clone, Default)]
pub struct NumericConstraints<T> {
    /// Minimum value (inclusive)
    pub minimum: Option<T>,
    /// Maximum value (inclusive)
    pub maximum: Option<T>,
    /// Minimum value (exclusive)
    pub exclusive_minimum: Option<T>,
    /// Maximum value (exclusive)
    pub exclusive_maximum: Option<T>,
    /// Value must be a multiple of this number
    pub multiple_of: Option<T>,
}

impl<T> NumericConstraints<T> {
    pub fn minimum(mut self, min: T) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn maximum(mut self, max: T) -> Self {
        self.maximum = Some(max);
        self
    }

    pub fn exclusive_minimum(mut self, min: T) -> Self {
        self.exclusive_minimum = Some(min);
        self
    }

    pub fn exclusive_maximum(mut self, max: T) -> Self {
        self.exclusive_maximum = Some(max);
        self
    }

    pub fn multiple_of(mut self, step: T) -> Self {
        self.multiple_of = Some(step);
        self
    }
}

// ============================================================================
// List Constraints
// ============================================================================

/// Constraints for list/array validation
#[derive(Debug, Clone, Default)]
pub struct ListConstraints {
    /// Minimum number of items
    pub min_items: Option<usize>,
    /// Maximum number of items
    pub max_items: Option<usize>,
    /// Whether all items must be unique
    pub unique_items: bool,
}

// ============================================================================
// Field Descriptor (for Object validation)
// ============================================================================

/// A named member of an object schema.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Type descriptor for this field
    pub type_desc: TypeDescriptor,
    /// Whether this field must be present
    pub required: bool,
    /// Value substituted when the field is absent
    pub default: Option<Value>,
    /// Optional description for documentation
    pub description: Option<String>,
}

impl FieldDescriptor {
    /// Create a required field
    pub fn new(name: impl Into<String>, type_desc: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            type_desc,
            required: true,
            default: None,
            description: None,
        }
    }

    /// Set field as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set default value (implies optional)
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    /// Set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether an absent field is acceptable, taking wrappers like
    /// `Optional` and `Default` on the type into account.
    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none() && self.type_desc.is_required()
    }

    /// Value to fill in when the field is absent, if any.
    pub fn fallback(&self) -> Option<Value> {
        self.default.clone().or_else(|| self.type_desc.default_value())
    }
}
