//! Core type system for validation
//!
//! [`TypeDescriptor`] is an immutable description of an accepted JSON shape.
//! Descriptors are built once (usually at route registration) and shared
//! read-only between requests.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::UnknownKeys;
use crate::constraints::{
    FieldDescriptor, ListConstraints, NumericConstraints, StringConstraints, StringFormat,
};

// ============================================================================
// Checks (refinements and custom predicates)
// ============================================================================

/// Predicate run against a value; `Err` carries the issue message.
pub type CheckFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A named, shareable predicate.
#[derive(Clone)]
pub struct Check {
    pub name: String,
    func: CheckFn,
}

impl Check {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn run(&self, value: &Value) -> Result<(), String> {
        (self.func)(value)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

// ============================================================================
// TypeDescriptor - Type definitions for validation
// ============================================================================

/// Type descriptor for validation
///
/// Covers primitives, collections, objects with per-object unknown-key
/// policies, and the wrappers that change how a value is read (coercion,
/// defaults, refinements).
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    // ========================================================================
    // Primitive Types
    // ========================================================================
    /// String type with constraints (length, pattern, format)
    String(StringConstraints),

    /// Integer type with numeric constraints (i64)
    Int64(NumericConstraints<i64>),

    /// Number type with numeric constraints (f64)
    Float64(NumericConstraints<f64>),

    Bool,

    Null,

    // ========================================================================
    // Collection Types
    // ========================================================================
    /// Array with a single item type
    List {
        items: Box<TypeDescriptor>,
        constraints: ListConstraints,
    },

    /// Fixed-length array with a type per position
    Tuple { items: Vec<TypeDescriptor> },

    /// Object with named fields
    Object {
        fields: Vec<FieldDescriptor>,
        /// What to do with keys not listed in `fields`
        unknown_keys: UnknownKeys,
        /// Schema for undeclared keys; when set, they are validated and kept
        additional: Option<Box<TypeDescriptor>>,
    },

    // ========================================================================
    // Choice Types
    // ========================================================================
    /// First matching variant wins
    Union { variants: Vec<TypeDescriptor> },

    /// Value must equal one of the allowed values
    Enum { values: Vec<Value> },

    /// Value must equal exactly this value
    Literal(Value),

    // ========================================================================
    // Wrappers
    // ========================================================================
    /// Absent is accepted; a present null must still satisfy the inner type
    Optional(Box<TypeDescriptor>),

    /// Null is accepted
    Nullable(Box<TypeDescriptor>),

    /// Converts strings (and booleans) to the inner primitive before parsing.
    /// Query strings and path parameters always arrive as strings.
    Coerce(Box<TypeDescriptor>),

    /// Substitutes `value` when the input is absent
    Default {
        inner: Box<TypeDescriptor>,
        value: Value,
    },

    /// Parses with `inner`, then runs `check` on the parsed output
    Refine {
        inner: Box<TypeDescriptor>,
        check: Check,
    },

    /// Arbitrary predicate with no structural description
    Custom(Check),

    /// Reusable schema; exported inline with `name` as its title
    Named {
        name: String,
        inner: Box<TypeDescriptor>,
    },

    /// Any value (no validation)
    Any,
}

impl TypeDescriptor {
    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn string() -> Self {
        Self::String(StringConstraints::default())
    }

    pub fn string_with(constraints: StringConstraints) -> Self {
        Self::String(constraints)
    }

    pub fn email() -> Self {
        Self::String(StringConstraints::default().format(StringFormat::Email))
    }

    pub fn url() -> Self {
        Self::String(StringConstraints::default().format(StringFormat::Url))
    }

    pub fn uuid() -> Self {
        Self::String(StringConstraints::default().format(StringFormat::Uuid))
    }

    pub fn datetime() -> Self {
        Self::String(StringConstraints::default().format(StringFormat::DateTime))
    }

    pub fn date() -> Self {
        Self::String(StringConstraints::default().format(StringFormat::Date))
    }

    pub fn int() -> Self {
        Self::Int64(NumericConstraints::default())
    }

    pub fn int_with(constraints: NumericConstraints<i64>) -> Self {
        Self::Int64(constraints)
    }

    pub fn number() -> Self {
        Self::Float64(NumericConstraints::default())
    }

    pub fn number_with(constraints: NumericConstraints<f64>) -> Self {
        Self::Float64(constraints)
    }

    pub fn boolean() -> Self {
        Self::Bool
    }

    pub fn any() -> Self {
        Self::Any
    }

    pub fn list(items: TypeDescriptor) -> Self {
        Self::List {
            items: Box::new(items),
            constraints: ListConstraints::default(),
        }
    }

    pub fn list_with(items: TypeDescriptor, constraints: ListConstraints) -> Self {
        Self::List {
            items: Box::new(items),
            constraints,
        }
    }

    pub fn tuple(items: Vec<TypeDescriptor>) -> Self {
        Self::Tuple { items }
    }

    /// Object that strips unknown keys unless told otherwise.
    pub fn object(fields: Vec<FieldDescriptor>) -> Self {
        Self::Object {
            fields,
            unknown_keys: UnknownKeys::Strip,
            additional: None,
        }
    }

    pub fn union(variants: Vec<TypeDescriptor>) -> Self {
        Self::Union { variants }
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Check::new(name, check))
    }

    // ========================================================================
    // Modifiers
    // ========================================================================

    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    pub fn nullable(self) -> Self {
        Self::Nullable(Box::new(self))
    }

    pub fn coerce(self) -> Self {
        Self::Coerce(Box::new(self))
    }

    pub fn with_default(self, value: impl Into<Value>) -> Self {
        Self::Default {
            inner: Box::new(self),
            value: value.into(),
        }
    }

    pub fn refine<F>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Refine {
            inner: Box::new(self),
            check: Check::new(name, check),
        }
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            inner: Box::new(self),
        }
    }

    /// Reject unknown keys on this object. No effect on other types.
    pub fn strict(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Strict)
    }

    /// Keep unknown keys on this object. No effect on other types.
    pub fn passthrough(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Passthrough)
    }

    /// Validate undeclared keys of this object against `schema`.
    pub fn additional(self, schema: TypeDescriptor) -> Self {
        match self {
            Self::Object {
                fields,
                unknown_keys,
                ..
            } => Self::Object {
                fields,
                unknown_keys,
                additional: Some(Box::new(schema)),
            },
            other => other,
        }
    }

    fn with_unknown_keys(self, policy: UnknownKeys) -> Self {
        match self {
            Self::Object {
                fields, additional, ..
            } => Self::Object {
                fields,
                unknown_keys: policy,
                additional,
            },
            Self::Named { name, inner } => Self::Named {
                name,
                inner: Box::new(inner.with_unknown_keys(policy)),
            },
            other => other,
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int64(_) => "integer",
            Self::Float64(_) => "number",
            Self::Bool => "boolean",
            Self::Null => "null",
            Self::List { .. } => "array",
            Self::Tuple { .. } => "tuple",
            Self::Object { .. } => "object",
            Self::Union { .. } => "union",
            Self::Enum { .. } => "enum",
            Self::Literal(_) => "literal",
            Self::Custom(_) => "custom",
            Self::Any => "any",
            Self::Optional(inner)
            | Self::Nullable(inner)
            | Self::Coerce(inner)
            | Self::Default { inner, .. }
            | Self::Refine { inner, .. }
            | Self::Named { inner, .. } => inner.type_name(),
        }
    }

    /// Whether an absent value fails the parse.
    pub fn is_required(&self) -> bool {
        match self {
            Self::Optional(_) | Self::Default { .. } | Self::Any => false,
            Self::Nullable(inner)
            | Self::Coerce(inner)
            | Self::Refine { inner, .. }
            | Self::Named { inner, .. } => inner.is_required(),
            _ => true,
        }
    }

    /// Value substituted for an absent input, if this type declares one.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::Default { value, .. } => Some(value.clone()),
            Self::Optional(inner)
            | Self::Nullable(inner)
            | Self::Coerce(inner)
            | Self::Refine { inner, .. }
            | Self::Named { inner, .. } => inner.default_value(),
            _ => None,
        }
    }

    /// Whether the type, once wrappers are peeled off, is an object.
    pub fn is_object(&self) -> bool {
        match self {
            Self::Object { .. } => true,
            Self::Optional(inner)
            | Self::Nullable(inner)
            | Self::Coerce(inner)
            | Self::Default { inner, .. }
            | Self::Refine { inner, .. }
            | Self::Named { inner, .. } => inner.is_object(),
            _ => false,
        }
    }
}

/// Human-readable JSON type of a value, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
