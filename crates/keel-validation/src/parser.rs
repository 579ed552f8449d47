//! Core parse engine
//!
//! Parsing validates a JSON value against a [`TypeDescriptor`] and produces the
//! parsed output: defaults filled in, coercions applied and unknown keys
//! stripped or kept according to each object's policy. Issues are accumulated
//! rather than returned on the first failure.

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::config::{ObjectMode, UnknownKeys};
use crate::constraints::{
    FieldDescriptor, ListConstraints, NumericConstraints, StringConstraints,
};
use crate::errors::{Issue, IssueCode, Issues, ParseContext, ParseResult};
use crate::formats;
use crate::types::{json_type_name, Check, TypeDescriptor};

/// Largest integer an f64 represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

// ============================================================================
// Public API
// ============================================================================

/// Parse a value, applying `mode` to the top-level object.
///
/// # Example
///
/// ```
/// use keel_validation::{parse, FieldDescriptor, ObjectMode, TypeDescriptor};
/// use serde_json::json;
///
/// let schema = TypeDescriptor::object(vec![
///     FieldDescriptor::new("name", TypeDescriptor::string()),
/// ]);
///
/// let parsed = parse(&json!({"name": "Ada", "x": 1}), &schema, ObjectMode::Passthrough).unwrap();
/// assert_eq!(parsed, json!({"name": "Ada", "x": 1}));
///
/// let issues = parse(&json!({"name": "Ada", "x": 1}), &schema, ObjectMode::Strict).unwrap_err();
/// assert_eq!(issues.as_slice()[0].message, "Unrecognized key(s) in object: 'x'");
/// ```
pub fn parse(value: &Value, schema: &TypeDescriptor, mode: ObjectMode) -> ParseResult<Value> {
    let mut ctx = ParseContext::with_root_keys(mode.root_policy());
    parse_with_context(value, schema, &mut ctx)
}

/// Parse a value honoring only the policies declared on the schema itself.
pub fn parse_as_declared(value: &Value, schema: &TypeDescriptor) -> ParseResult<Value> {
    let mut ctx = ParseContext::new();
    parse_with_context(value, schema, &mut ctx)
}

pub fn parse_with_context(
    value: &Value,
    schema: &TypeDescriptor,
    ctx: &mut ParseContext,
) -> ParseResult<Value> {
    let mut issues = Issues::new();
    let output = parse_value(value, schema, ctx, &mut issues);

    if issues.is_empty() {
        Ok(output)
    } else {
        Err(issues)
    }
}

// ============================================================================
// Core Parse Function
// ============================================================================

/// Recursively parse `value`, pushing any problems onto `issues`.
///
/// The returned value is only meaningful when no issues were added.
pub fn parse_value(
    value: &Value,
    schema: &TypeDescriptor,
    ctx: &mut ParseContext,
    issues: &mut Issues,
) -> Value {
    match schema {
        TypeDescriptor::String(constraints) => parse_string(value, constraints, ctx, issues),
        TypeDescriptor::Int64(constraints) => parse_int64(value, constraints, ctx, issues),
        TypeDescriptor::Float64(constraints) => parse_float64(value, constraints, ctx, issues),
        TypeDescriptor::Bool => expect_type(value, "boolean", Value::is_boolean, ctx, issues),
        TypeDescriptor::Null => expect_type(value, "null", Value::is_null, ctx, issues),
        TypeDescriptor::List { items, constraints } => {
            parse_list(value, items, constraints, ctx, issues)
        }
        TypeDescriptor::Tuple { items } => parse_tuple(value, items, ctx, issues),
        TypeDescriptor::Object {
            fields,
            unknown_keys,
            additional,
        } => parse_object(value, fields, *unknown_keys, additional.as_deref(), ctx, issues),
        TypeDescriptor::Union { variants } => parse_union(value, variants, ctx, issues),
        TypeDescriptor::Enum { values } => parse_enum(value, values, ctx, issues),
        TypeDescriptor::Literal(expected) => {
            if value != expected {
                issues.add(ctx.issue(
                    format!("Invalid literal value, expected {}", expected),
                    IssueCode::InvalidValue,
                ));
            }
            value.clone()
        }
        TypeDescriptor::Nullable(inner) => {
            if value.is_null() {
                Value::Null
            } else {
                parse_value(value, inner, ctx, issues)
            }
        }
        // Absence is handled by the enclosing object; a present value,
        // null included, must satisfy the inner type.
        TypeDescriptor::Optional(inner) | TypeDescriptor::Default { inner, .. } => {
            parse_value(value, inner, ctx, issues)
        }
        TypeDescriptor::Coerce(inner) => {
            let coerced = coerce(value, inner);
            parse_value(&coerced, inner, ctx, issues)
        }
        TypeDescriptor::Refine { inner, check } => {
            let before = issues.len();
            let output = parse_value(value, inner, ctx, issues);
            if issues.len() == before {
                run_check(&output, check, ctx, issues);
            }
            output
        }
        TypeDescriptor::Custom(check) => {
            run_check(value, check, ctx, issues);
            value.clone()
        }
        TypeDescriptor::Named { inner, .. } => parse_value(value, inner, ctx, issues),
        TypeDescriptor::Any => value.clone(),
    }
}

fn expect_type(
    value: &Value,
    expected: &str,
    accepts: fn(&Value) -> bool,
    ctx: &ParseContext,
    issues: &mut Issues,
) -> Value {
    if !accepts(value) {
        issues.add(type_issue(expected, value, ctx));
    }
    value.clone()
}

fn type_issue(expected: &str, value: &Value, ctx: &ParseContext) -> Issue {
    ctx.issue(
        format!("Expected {}, got {}", expected, json_type_name(value)),
        IssueCode::InvalidType,
    )
}

fn run_check(value: &Value, check: &Check, ctx: &ParseContext, issues: &mut Issues) {
    if let Err(message) = check.run(value) {
        issues.add(ctx.issue(message, IssueCode::Custom));
    }
}

// ============================================================================
// String Parsing
// ============================================================================

fn parse_string(
    value: &Value,
    constraints: &StringConstraints,
    ctx: &ParseContext,
    issues: &mut Issues,
) -> Value {
    let Value::String(s) = value else {
        issues.add(type_issue("string", value, ctx));
        return value.clone();
    };

    // Length is counted in characters, not bytes
    let char_count = s.chars().count();

    if let Some(min) = constraints.min_length {
        if char_count < min {
            issues.add(ctx.issue(
                format!("String must contain at least {} character(s)", min),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(max) = constraints.max_length {
        if char_count > max {
            issues.add(ctx.issue(
                format!("String must contain at most {} character(s)", max),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(pattern) = &constraints.pattern {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(s) => {}
            Ok(_) => issues.add(ctx.issue(
                format!("String does not match pattern: {}", pattern),
                IssueCode::InvalidValue,
            )),
            Err(_) => issues.add(ctx.issue(
                format!("Invalid regex pattern: {}", pattern),
                IssueCode::InvalidValue,
            )),
        }
    }

    if let Some(format) = constraints.format {
        if !formats::matches(format, s) {
            issues.add(ctx.issue(
                format!("Invalid {}", format.as_str()),
                IssueCode::InvalidFormat,
            ));
        }
    }

    value.clone()
}

// ============================================================================
// Numeric Parsing
// ============================================================================

fn parse_int64(
    value: &Value,
    constraints: &NumericConstraints<i64>,
    ctx: &ParseContext,
    issues: &mut Issues,
) -> Value {
    let Value::Number(number) = value else {
        issues.add(type_issue("integer", value, ctx));
        return value.clone();
    };

    // 2.0 is an integer as far as JSON is concerned
    let int = match number.as_i64() {
        Some(i) => i,
        None => match number.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => f as i64,
            Some(f) if f.fract() == 0.0 => {
                issues.add(ctx.issue("Integer out of range", IssueCode::InvalidValue));
                return value.clone();
            }
            _ => {
                issues.add(ctx.issue("Expected integer, got number", IssueCode::InvalidType));
                return value.clone();
            }
        },
    };

    check_bounds(int, constraints, ctx, issues);

    if let Some(step) = constraints.multiple_of {
        if step != 0 && int % step != 0 {
            issues.add(ctx.issue(
                format!("Number must be a multiple of {}", step),
                IssueCode::InvalidValue,
            ));
        }
    }

    Value::from(int)
}

fn parse_float64(
    value: &Value,
    constraints: &NumericConstraints<f64>,
    ctx: &ParseContext,
    issues: &mut Issues,
) -> Value {
    let Some(num) = value.as_f64() else {
        issues.add(type_issue("number", value, ctx));
        return value.clone();
    };

    check_bounds(num, constraints, ctx, issues);

    if let Some(step) = constraints.multiple_of {
        if step != 0.0 {
            let ratio = num / step;
            if (ratio - ratio.round()).abs() > 1e-9 {
                issues.add(ctx.issue(
                    format!("Number must be a multiple of {}", step),
                    IssueCode::InvalidValue,
                ));
            }
        }
    }

    // Integers stay integers in the output
    value.clone()
}

fn check_bounds<T>(
    value: T,
    constraints: &NumericConstraints<T>,
    ctx: &ParseContext,
    issues: &mut Issues,
) where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(min) = constraints.minimum {
        if value < min {
            issues.add(ctx.issue(
                format!("Number must be greater than or equal to {}", min),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(max) = constraints.maximum {
        if value > max {
            issues.add(ctx.issue(
                format!("Number must be less than or equal to {}", max),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(min) = constraints.exclusive_minimum {
        if value <= min {
            issues.add(ctx.issue(
                format!("Number must be greater than {}", min),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(max) = constraints.exclusive_maximum {
        if value >= max {
            issues.add(ctx.issue(
                format!("Number must be less than {}", max),
                IssueCode::InvalidValue,
            ));
        }
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Primitive that a coercion targets, found by peeling wrappers off `schema`.
fn coercion_target(schema: &TypeDescriptor) -> Option<&TypeDescriptor> {
    match schema {
        TypeDescriptor::String(_)
        | TypeDescriptor::Int64(_)
        | TypeDescriptor::Float64(_)
        | TypeDescriptor::Bool => Some(schema),
        TypeDescriptor::Optional(inner)
        | TypeDescriptor::Nullable(inner)
        | TypeDescriptor::Coerce(inner)
        | TypeDescriptor::Default { inner, .. }
        | TypeDescriptor::Refine { inner, .. }
        | TypeDescriptor::Named { inner, .. } => coercion_target(inner),
        _ => None,
    }
}

/// Convert `value` toward the primitive `schema` expects.
///
/// Values that cannot be converted are returned unchanged, so the inner parse
/// reports the type mismatch.
fn coerce(value: &Value, schema: &TypeDescriptor) -> Value {
    match (coercion_target(schema), value) {
        (Some(TypeDescriptor::Int64(_) | TypeDescriptor::Float64(_)), Value::String(s)) => {
            coerce_number(s).unwrap_or_else(|| value.clone())
        }
        (Some(TypeDescriptor::Int64(_) | TypeDescriptor::Float64(_)), Value::Bool(b)) => {
            Value::from(i64::from(*b))
        }
        (Some(TypeDescriptor::Bool), Value::String(s)) => match s.trim() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => value.clone(),
        },
        (Some(TypeDescriptor::Bool), Value::Number(n)) => {
            Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))
        }
        (Some(TypeDescriptor::String(_)), Value::Number(n)) => Value::String(n.to_string()),
        (Some(TypeDescriptor::String(_)), Value::Bool(b)) => Value::String(b.to_string()),
        _ => value.clone(),
    }
}

fn coerce_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

// ============================================================================
// Collection Parsing
// ============================================================================

fn parse_list(
    value: &Value,
    items: &TypeDescriptor,
    constraints: &ListConstraints,
    ctx: &mut ParseContext,
    issues: &mut Issues,
) -> Value {
    let Value::Array(input) = value else {
        issues.add(type_issue("array", value, ctx));
        return value.clone();
    };

    if let Some(min) = constraints.min_items {
        if input.len() < min {
            issues.add(ctx.issue(
                format!("Array must contain at least {} item(s)", min),
                IssueCode::InvalidValue,
            ));
        }
    }

    if let Some(max) = constraints.max_items {
        if input.len() > max {
            issues.add(ctx.issue(
                format!("Array must contain at most {} item(s)", max),
                IssueCode::InvalidValue,
            ));
        }
    }

    let mut output = Vec::with_capacity(input.len());
    for (index, item) in input.iter().enumerate() {
        ctx.push(index.to_string());
        output.push(parse_value(item, items, ctx, issues));
        ctx.pop();
    }

    if constraints.unique_items && has_duplicates(&output) {
        issues.add(ctx.issue("Array items must be unique", IssueCode::InvalidValue));
    }

    Value::Array(output)
}

fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, item)| items[i + 1..].contains(item))
}

fn parse_tuple(
    value: &Value,
    items: &[TypeDescriptor],
    ctx: &mut ParseContext,
    issues: &mut Issues,
) -> Value {
    let Value::Array(input) = value else {
        issues.add(type_issue("array", value, ctx));
        return value.clone();
    };

    if input.len() != items.len() {
        issues.add(ctx.issue(
            format!(
                "Expected array of length {}, got length {}",
                items.len(),
                input.len()
            ),
            IssueCode::InvalidValue,
        ));
        return value.clone();
    }

    let mut output = Vec::with_capacity(items.len());
    for (index, (item, schema)) in input.iter().zip(items).enumerate() {
        ctx.push(index.to_string());
        output.push(parse_value(item, schema, ctx, issues));
        ctx.pop();
    }
    Value::Array(output)
}

// ============================================================================
// Object Parsing
// ============================================================================

fn parse_object(
    value: &Value,
    fields: &[FieldDescriptor],
    declared: UnknownKeys,
    additional: Option<&TypeDescriptor>,
    ctx: &mut ParseContext,
    issues: &mut Issues,
) -> Value {
    let Value::Object(input) = value else {
        issues.add(type_issue("object", value, ctx));
        return value.clone();
    };

    let policy = ctx.unknown_keys(declared);
    let mut output = Map::new();

    for field in fields {
        ctx.push(field.name.as_str());
        match input.get(&field.name) {
            Some(raw) => {
                let parsed = parse_value(raw, &field.type_desc, ctx, issues);
                output.insert(field.name.clone(), parsed);
            }
            None => {
                if let Some(fallback) = field.fallback() {
                    output.insert(field.name.clone(), fallback);
                } else if field.is_required() {
                    issues.add(ctx.issue("Required", IssueCode::Missing));
                }
            }
        }
        ctx.pop();
    }

    let unknown: Vec<&String> = input
        .keys()
        .filter(|key| !fields.iter().any(|f| &f.name == *key))
        .collect();

    if let Some(schema) = additional {
        for key in unknown {
            ctx.push(key.as_str());
            let parsed = parse_value(&input[key], schema, ctx, issues);
            output.insert(key.clone(), parsed);
            ctx.pop();
        }
        return Value::Object(output);
    }

    match policy {
        UnknownKeys::Strip => {}
        UnknownKeys::Passthrough => {
            for key in unknown {
                output.insert(key.clone(), input[key].clone());
            }
        }
        UnknownKeys::Strict => {
            if !unknown.is_empty() {
                let keys: Vec<String> = unknown.iter().map(|k| format!("'{}'", k)).collect();
                issues.add(ctx.issue(
                    format!("Unrecognized key(s) in object: {}", keys.join(", ")),
                    IssueCode::UnrecognizedKeys,
                ));
            }
        }
    }

    Value::Object(output)
}

// ============================================================================
// Choice Parsing
// ============================================================================

fn parse_union(
    value: &Value,
    variants: &[TypeDescriptor],
    ctx: &mut ParseContext,
    issues: &mut Issues,
) -> Value {
    for variant in variants {
        let mut attempt = Issues::new();
        let output = parse_value(value, variant, ctx, &mut attempt);
        if attempt.is_empty() {
            return output;
        }
    }

    let names: Vec<&str> = variants.iter().map(TypeDescriptor::type_name).collect();
    issues.add(ctx.issue(
        format!("Invalid input: expected one of {}", names.join(" | ")),
        IssueCode::InvalidUnion,
    ));
    value.clone()
}

fn parse_enum(value: &Value, values: &[Value], ctx: &ParseContext, issues: &mut Issues) -> Value {
    if !values.contains(value) {
        let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
        issues.add(ctx.issue(
            format!(
                "Invalid enum value. Expected {}, got {}",
                allowed.join(" | "),
                value
            ),
            IssueCode::InvalidValue,
        ));
    }
    value.clone()
}
