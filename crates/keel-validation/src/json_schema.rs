//! JSON Schema export for validation types
//!
//! Produces OpenAPI 3.0 flavoured schemas (`nullable`, boolean
//! `exclusiveMinimum`) from [`TypeDescriptor`]s. Refinements export as their
//! underlying structure; custom checks have no structure and fail the export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::config::UnknownKeys;
use crate::types::TypeDescriptor;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaExportError {
    #[error("{kind} at '{path}' has no JSON Schema representation")]
    Unsupported { kind: String, path: String },
}

// ============================================================================
// JSON Schema Types
// ============================================================================

/// JSON Schema representation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    // String constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // Numeric constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,

    // Array constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    // Object constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    // Composition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

/// `additionalProperties` is either a flag or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<JsonSchema>),
}

impl JsonSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: Some(schema_type.into()),
            ..Default::default()
        }
    }

    /// Fallback for schemas that could not be exported.
    pub fn placeholder_object() -> Self {
        Self::with_type("object")
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Structural conformance: types, required members, enums, item and
    /// property shapes. Value constraints such as lengths are not checked, and
    /// `$ref`s are not resolved (any value is accepted).
    pub fn accepts(&self, value: &Value) -> bool {
        if self.reference.is_some() {
            return true;
        }

        if value.is_null() && self.nullable == Some(true) {
            return true;
        }

        if let Some(all) = &self.all_of {
            if !all.iter().all(|s| s.accepts(value)) {
                return false;
            }
        }

        if let Some(any) = &self.any_of {
            if !any.iter().any(|s| s.accepts(value)) {
                return false;
            }
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                return false;
            }
        }

        let Some(schema_type) = self.schema_type.as_deref() else {
            return true;
        };

        match (schema_type, value) {
            ("string", Value::String(_)) => true,
            ("boolean", Value::Bool(_)) => true,
            ("number", Value::Number(_)) => true,
            ("integer", Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            ("array", Value::Array(items)) => match &self.items {
                Some(item_schema) => items
                    .iter()
                    .all(|item| item_schema.accepts(item)),
                None => true,
            },
            ("object", Value::Object(map)) => {
                let required_present = self
                    .required
                    .iter()
                    .flatten()
                    .all(|name| map.contains_key(name));
                if !required_present {
                    return false;
                }

                let properties = self.properties.as_ref();
                map.iter().all(|(key, member)| {
                    match properties.and_then(|p| p.get(key)) {
                        Some(schema) => schema.accepts(member),
                        None => match &self.additional_properties {
                            Some(AdditionalProperties::Allowed(false)) => false,
                            Some(AdditionalProperties::Schema(schema)) => {
                                schema.accepts(member)
                            }
                            _ => true,
                        },
                    }
                })
            }
            _ => false,
        }
    }
}

// ============================================================================
// Conversion from TypeDescriptor
// ============================================================================

/// Convert a descriptor to a self-contained schema. Named schemas are
/// inlined with their name as `title`.
pub fn to_json_schema(desc: &TypeDescriptor) -> Result<JsonSchema, SchemaExportError> {
    let mut path = Vec::new();
    SchemaExporter.convert(desc, &mut path)
}

struct SchemaExporter;

impl SchemaExporter {
    fn convert(
        &self,
        desc: &TypeDescriptor,
        path: &mut Vec<String>,
    ) -> Result<JsonSchema, SchemaExportError> {
        let schema = match desc {
            TypeDescriptor::String(constraints) => JsonSchema {
                schema_type: Some("string".into()),
                min_length: constraints.min_length,
                max_length: constraints.max_length,
                pattern: constraints.pattern.clone(),
                format: constraints.format.map(|f| f.as_str().to_string()),
                ..Default::default()
            },

            TypeDescriptor::Int64(c) => JsonSchema {
                schema_type: Some("integer".into()),
                minimum: c.minimum.or(c.exclusive_minimum).map(Number::from),
                maximum: c.maximum.or(c.exclusive_maximum).map(Number::from),
                exclusive_minimum: exclusive_flag(c.minimum, c.exclusive_minimum),
                exclusive_maximum: exclusive_flag(c.maximum, c.exclusive_maximum),
                multiple_of: c.multiple_of.map(Number::from),
                ..Default::default()
            },

            TypeDescriptor::Float64(c) => JsonSchema {
                schema_type: Some("number".into()),
                minimum: c.minimum.or(c.exclusive_minimum).and_then(Number::from_f64),
                maximum: c.maximum.or(c.exclusive_maximum).and_then(Number::from_f64),
                exclusive_minimum: exclusive_flag(c.minimum, c.exclusive_minimum),
                exclusive_maximum: exclusive_flag(c.maximum, c.exclusive_maximum),
                multiple_of: c.multiple_of.and_then(Number::from_f64),
                ..Default::default()
            },

            TypeDescriptor::Bool => JsonSchema::with_type("boolean"),

            // OpenAPI 3.0 has no null type
            TypeDescriptor::Null => JsonSchema {
                nullable: Some(true),
                ..Default::default()
            },

            TypeDescriptor::List { items, constraints } => {
                path.push("[]".into());
                let items = self.convert(items, path)?;
                path.pop();
                JsonSchema {
                    schema_type: Some("array".into()),
                    items: Some(Box::new(items)),
                    min_items: constraints.min_items,
                    max_items: constraints.max_items,
                    unique_items: constraints.unique_items.then_some(true),
                    ..Default::default()
                }
            }

            TypeDescriptor::Tuple { items } => {
                let mut positions = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(index.to_string());
                    positions.push(self.convert(item, path)?);
                    path.pop();
                }
                let item_schema = match positions.len() {
                    0 => JsonSchema::new(),
                    1 => positions.remove(0),
                    _ => JsonSchema {
                        any_of: Some(positions),
                        ..Default::default()
                    },
                };
                JsonSchema {
                    schema_type: Some("array".into()),
                    items: Some(Box::new(item_schema)),
                    min_items: Some(items.len()),
                    max_items: Some(items.len()),
                    ..Default::default()
                }
            }

            TypeDescriptor::Object {
                fields,
                unknown_keys,
                additional,
            } => {
                let mut properties = BTreeMap::new();
                let mut required = Vec::new();

                for field in fields {
                    path.push(field.name.clone());
                    let mut property = self.convert(&field.type_desc, path)?;
                    path.pop();

                    if let Some(desc) = &field.description {
                        property.description = Some(desc.clone());
                    }
                    if let Some(default) = &field.default {
                        property.default = Some(default.clone());
                    }
                    if field.is_required() {
                        required.push(field.name.clone());
                    }
                    properties.insert(field.name.clone(), property);
                }

                let additional_properties = match additional {
                    Some(schema) => {
                        path.push("*".into());
                        let converted = self.convert(schema, path)?;
                        path.pop();
                        Some(AdditionalProperties::Schema(Box::new(converted)))
                    }
                    None => match unknown_keys {
                        UnknownKeys::Strict => Some(AdditionalProperties::Allowed(false)),
                        UnknownKeys::Passthrough => Some(AdditionalProperties::Allowed(true)),
                        UnknownKeys::Strip => None,
                    },
                };

                JsonSchema {
                    schema_type: Some("object".into()),
                    properties: Some(properties),
                    required: (!required.is_empty()).then_some(required),
                    additional_properties,
                    ..Default::default()
                }
            }

            TypeDescriptor::Union { variants } => {
                let mut any_of = Vec::with_capacity(variants.len());
                let mut nullable = false;
                for variant in variants {
                    if matches!(variant, TypeDescriptor::Null) {
                        nullable = true;
                        continue;
                    }
                    any_of.push(self.convert(variant, path)?);
                }
                JsonSchema {
                    any_of: Some(any_of),
                    nullable: nullable.then_some(true),
                    ..Default::default()
                }
            }

            TypeDescriptor::Enum { values } => JsonSchema {
                schema_type: common_type(values),
                enum_values: Some(values.clone()),
                ..Default::default()
            },

            TypeDescriptor::Literal(value) => JsonSchema {
                schema_type: common_type(std::slice::from_ref(value)),
                enum_values: Some(vec![value.clone()]),
                ..Default::default()
            },

            // Optionality is expressed by the parent's `required` list
            TypeDescriptor::Optional(inner)
            | TypeDescriptor::Coerce(inner)
            | TypeDescriptor::Refine { inner, .. } => self.convert(inner, path)?,

            TypeDescriptor::Nullable(inner) => {
                let inner = self.convert(inner, path)?;
                JsonSchema {
                    nullable: Some(true),
                    ..inner
                }
            }

            TypeDescriptor::Default { inner, value } => {
                let mut schema = self.convert(inner, path)?;
                schema.default = Some(value.clone());
                schema
            }

            TypeDescriptor::Custom(check) => {
                return Err(SchemaExportError::Unsupported {
                    kind: format!("custom check '{}'", check.name),
                    path: path.join("."),
                })
            }

            TypeDescriptor::Named { name, inner } => {
                let mut schema = self.convert(inner, path)?;
                schema.title.get_or_insert_with(|| name.clone());
                schema
            }

            TypeDescriptor::Any => JsonSchema::new(),
        };

        Ok(schema)
    }
}

/// `Some(true)` when only the exclusive bound is set.
fn exclusive_flag<T>(inclusive: Option<T>, exclusive: Option<T>) -> Option<bool> {
    (inclusive.is_none() && exclusive.is_some()).then_some(true)
}

/// JSON type shared by every value, if there is one.
fn common_type(values: &[Value]) -> Option<String> {
    let mut types = values.iter().map(|v| match v {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_f64() => Some("number"),
        Value::Number(_) => Some("integer"),
        _ => None,
    });
    let first = types.next()??;
    types
        .all(|t| t == Some(first))
        .then(|| first.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{FieldDescriptor, ListConstraints, NumericConstraints, StringConstraints};
    use serde_json::json;

    #[test]
    fn test_string_with_constraints() {
        let desc = TypeDescriptor::string_with(
            StringConstraints::default()
                .min_length(1)
                .max_length(100)
                .pattern("^[a-z]+$"),
        );
        let schema = to_json_schema(&desc).unwrap();

        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.min_length, Some(1));
        assert_eq!(schema.max_length, Some(100));
        assert_eq!(schema.pattern.as_deref(), Some("^[a-z]+$"));
    }

    #[test]
    fn test_integer_bounds_serialize_as_integers() {
        let desc = TypeDescriptor::int_with(NumericConstraints::default().minimum(1).maximum(100));
        let value = to_json_schema(&desc).unwrap().to_value();
        assert_eq!(value, json!({"type": "integer", "minimum": 1, "maximum": 100}));
    }

    #[test]
    fn test_exclusive_bounds_use_flags() {
        let desc = TypeDescriptor::number_with(NumericConstraints::default().exclusive_minimum(0.0));
        let schema = to_json_schema(&desc).unwrap();
        assert_eq!(schema.exclusive_minimum, Some(true));
        assert!(schema.minimum.is_some());
    }

    #[test]
    fn test_array_schema() {
        let desc = TypeDescriptor::list_with(
            TypeDescriptor::string(),
            ListConstraints {
                min_items: Some(1),
                max_items: Some(10),
                unique_items: true,
            },
        );
        let schema = to_json_schema(&desc).unwrap();

        assert_eq!(schema.schema_type.as_deref(), Some("array"));
        assert_eq!(schema.min_items, Some(1));
        assert_eq!(schema.max_items, Some(10));
        assert_eq!(schema.unique_items, Some(true));
        assert!(schema.items.is_some());
    }

    #[test]
    fn test_object_required_and_additional() {
        let desc = TypeDescriptor::object(vec![
            FieldDescriptor::new("name", TypeDescriptor::string()).description("Display name"),
            FieldDescriptor::new("age", TypeDescriptor::int()).optional(),
            FieldDescriptor::new("role", TypeDescriptor::string().with_default("member")),
        ])
        .strict();
        let schema = to_json_schema(&desc).unwrap();

        assert_eq!(schema.required, Some(vec!["name".to_string()]));
        assert_eq!(
            schema.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
        let props = schema.properties.unwrap();
        assert_eq!(props["name"].description.as_deref(), Some("Display name"));
        assert_eq!(props["role"].default, Some(json!("member")));
    }

    #[test]
    fn test_nullable_and_union() {
        let schema = to_json_schema(&TypeDescriptor::string().nullable()).unwrap();
        assert_eq!(schema.to_value(), json!({"type": "string", "nullable": true}));

        let union = TypeDescriptor::union(vec![TypeDescriptor::int(), TypeDescriptor::Null]);
        let schema = to_json_schema(&union).unwrap();
        assert_eq!(schema.any_of.as_ref().map(Vec::len), Some(1));
        assert_eq!(schema.nullable, Some(true));
    }

    #[test]
    fn test_enum_type_inferred() {
        let schema = to_json_schema(&TypeDescriptor::one_of(["asc", "desc"])).unwrap();
        assert_eq!(schema.to_value(), json!({"type": "string", "enum": ["asc", "desc"]}));
    }

    #[test]
    fn test_custom_fails_refine_exports_inner() {
        let custom = TypeDescriptor::object(vec![FieldDescriptor::new(
            "token",
            TypeDescriptor::custom("opaque", |_| Ok(())),
        )]);
        let err = to_json_schema(&custom).unwrap_err();
        assert_eq!(
            err,
            SchemaExportError::Unsupported {
                kind: "custom check 'opaque'".into(),
                path: "token".into(),
            }
        );

        let refined = TypeDescriptor::int().refine("even", |_| Ok(()));
        assert_eq!(
            to_json_schema(&refined).unwrap().schema_type.as_deref(),
            Some("integer")
        );
    }

    #[test]
    fn test_named_schema_is_inlined_with_title() {
        let user = TypeDescriptor::object(vec![FieldDescriptor::new("id", TypeDescriptor::int())])
            .named("User");
        let schema = to_json_schema(&TypeDescriptor::list(user)).unwrap();
        let items = schema.items.unwrap();
        assert!(items.reference.is_none());
        assert_eq!(items.title.as_deref(), Some("User"));
        assert_eq!(items.schema_type.as_deref(), Some("object"));
    }

    #[test]
    fn test_accepts_structural_shape() {
        let desc = TypeDescriptor::object(vec![
            FieldDescriptor::new("id", TypeDescriptor::int()),
            FieldDescriptor::new("tags", TypeDescriptor::list(TypeDescriptor::string())),
        ])
        .strict();
        let schema = to_json_schema(&desc).unwrap();

        assert!(schema.accepts(&json!({"id": 1, "tags": ["a"]})));
        assert!(!schema.accepts(&json!({"tags": ["a"]})));
        assert!(!schema.accepts(&json!({"id": 1, "tags": [1]})));
        assert!(!schema.accepts(&json!({"id": 1, "tags": [], "x": 0})));
    }
}
