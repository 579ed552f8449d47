//! Keel Validation
//!
//! Schema descriptors and the parse engine used by `keel-api` to check
//! request inputs and response bodies.
//!
//! - [`TypeDescriptor`] describes an accepted JSON shape, including
//!   coercions, defaults and refinements.
//! - [`parse`] checks a `serde_json::Value` against a descriptor and returns
//!   the parsed output or every [`Issue`] found. [`ObjectMode`] decides what
//!   happens to unknown keys of the top-level object.
//! - [`to_json_schema`] turns descriptors into JSON
//!   Schema documents for OpenAPI generation.
//!
//! # Example
//!
//! ```rust
//! use keel_validation::{parse, FieldDescriptor, ObjectMode, TypeDescriptor};
//! use serde_json::json;
//!
//! let query = TypeDescriptor::object(vec![
//!     FieldDescriptor::new("search", TypeDescriptor::string().optional()),
//!     FieldDescriptor::new("page", TypeDescriptor::number().coerce().with_default(1)),
//! ]);
//!
//! let parsed = parse(&json!({"page": "2"}), &query, ObjectMode::Passthrough).unwrap();
//! assert_eq!(parsed, json!({"page": 2}));
//! ```

pub mod config;
pub mod constraints;
pub mod errors;
pub mod formats;
pub mod json_schema;
pub mod parser;
pub mod types;

pub use config::{ObjectMode, UnknownKeys};
pub use constraints::{
    FieldDescriptor, ListConstraints, NumericConstraints, StringConstraints, StringFormat,
};
pub use errors::{Issue, IssueCode, Issues, ParseContext, ParseResult};
pub use json_schema::{
    to_json_schema, AdditionalProperties, JsonSchema, SchemaExportError,
};
pub use parser::{parse, parse_as_declared, parse_value, parse_with_context};
pub use types::{json_type_name, Check, CheckFn, TypeDescriptor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
