//! OpenAPI 3.0 document generation
//!
//! Builds a document from registered route definitions. Query and path
//! schemas are flattened into parameters, body schemas become JSON request
//! bodies, and declared responses are documented with their schemas.
//!
//! Generation never fails: a schema that cannot be exported is logged and
//! replaced by a placeholder (or omitted, for response content).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use keel_validation::{to_json_schema, FieldDescriptor, JsonSchema, TypeDescriptor};

use crate::request::HttpMethod;
use crate::route::RouteDefinition;

pub use keel_validation::JsonSchema as Schema;

pub const OPENAPI_VERSION: &str = "3.0.3";

#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("Failed to write OpenAPI document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode OpenAPI document as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode OpenAPI document as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// Document Types
// ============================================================================

/// OpenAPI 3.0 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiSpec {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl OpenApiSpec {
    pub fn new(info: Info) -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info,
            servers: Vec::new(),
            paths: BTreeMap::new(),
            components: None,
            tags: Vec::new(),
        }
    }

    /// Add an operation, replacing any existing one for the same method.
    pub fn add_operation(&mut self, method: HttpMethod, path: &str, operation: Operation) {
        let path_item = self.paths.entry(path.to_string()).or_default();
        match method {
            HttpMethod::Get => path_item.get = Some(operation),
            HttpMethod::Post => path_item.post = Some(operation),
            HttpMethod::Put => path_item.put = Some(operation),
            HttpMethod::Patch => path_item.patch = Some(operation),
            HttpMethod::Delete => path_item.delete = Some(operation),
            HttpMethod::Head => path_item.head = Some(operation),
            HttpMethod::Options => path_item.options = Some(operation),
        }
    }

    /// Look up the operation for `method` at a document path.
    pub fn operation(&self, method: HttpMethod, path: &str) -> Option<&Operation> {
        let item = self.paths.get(path)?;
        match method {
            HttpMethod::Get => item.get.as_ref(),
            HttpMethod::Post => item.post.as_ref(),
            HttpMethod::Put => item.put.as_ref(),
            HttpMethod::Patch => item.patch.as_ref(),
            HttpMethod::Delete => item.delete.as_ref(),
            HttpMethod::Head => item.head.as_ref(),
            HttpMethod::Options => item.options.as_ref(),
        }
    }

    /// Add a schema to components
    pub fn add_schema(&mut self, name: impl Into<String>, schema: Schema) {
        let components = self.components.get_or_insert_with(Components::default);
        components.schemas.insert(name.into(), schema);
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Write the document to `path`, as YAML for `.yaml`/`.yml` files and
    /// JSON otherwise.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), OpenApiError> {
        let path = path.as_ref();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let contents = if is_yaml { self.to_yaml()? } else { self.to_json()? };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl Info {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            contact: None,
            license: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn license(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.license = Some(License {
            name: name.into(),
            url,
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none", rename = "operationId")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "requestBody")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

impl Operation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn request_body(mut self, body: RequestBody) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn response(mut self, status: impl ToString, response: Response) -> Self {
        self.responses.insert(status.to_string(), response);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaType>,
    #[serde(default)]
    pub required: bool,
}

impl RequestBody {
    pub fn json(schema: Schema) -> Self {
        Self {
            description: None,
            content: json_content(schema),
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Schema>,
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(
        "application/json".to_string(),
        MediaType {
            schema: Some(schema),
        },
    );
    content
}

// ============================================================================
// Generator
// ============================================================================

/// Builds [`OpenApiSpec`]s from route definitions.
///
/// ```rust
/// use keel_api::openapi::{Info, OpenApiGenerator};
///
/// let generator = OpenApiGenerator::new(Info::new("Users API", "1.0.0"))
///     .server("http://localhost:3000", Some("local".into()));
/// let spec = generator.generate(&[]);
/// assert_eq!(spec.openapi, "3.0.3");
/// ```
#[derive(Debug, Clone)]
pub struct OpenApiGenerator {
    info: Info,
    servers: Vec<Server>,
    tags: Vec<Tag>,
    components: Vec<(String, TypeDescriptor)>,
}

impl OpenApiGenerator {
    pub fn new(info: Info) -> Self {
        Self {
            info,
            servers: Vec::new(),
            tags: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    pub fn tag(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.tags.push(Tag {
            name: name.into(),
            description,
        });
        self
    }

    /// Publish a named schema under `components.schemas`.
    pub fn component(mut self, name: impl Into<String>, schema: TypeDescriptor) -> Self {
        self.components.push((name.into(), schema));
        self
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Generate a document for `routes`, in registration order.
    pub fn generate(&self, routes: &[Arc<RouteDefinition>]) -> OpenApiSpec {
        let mut spec = OpenApiSpec::new(self.info.clone());
        spec.servers = self.servers.clone();
        spec.tags = self.tags.clone();

        for (name, desc) in &self.components {
            let schema = export_or_placeholder(desc, &format!("component '{}'", name));
            spec.add_schema(name.clone(), schema);
        }

        for route in routes {
            let path = to_openapi_path(&route.path);
            spec.add_operation(route.method, &path, build_operation(route));
        }

        spec
    }
}

/// Generate a document with no servers or components.
pub fn generate(routes: &[Arc<RouteDefinition>], info: Info) -> OpenApiSpec {
    OpenApiGenerator::new(info).generate(routes)
}

fn build_operation(route: &RouteDefinition) -> Operation {
    let schema = &route.schema;
    let context = format!("{} {}", route.method, route.path);

    let mut operation = Operation {
        operation_id: route.metadata.operation_id.clone(),
        summary: route.metadata.summary.clone(),
        description: route.metadata.description.clone(),
        tags: route.metadata.tags.clone(),
        deprecated: route.metadata.deprecated.then_some(true),
        ..Operation::new()
    };

    match &schema.params {
        Some(params) => operation.parameters.extend(flatten_parameters(
            params,
            ParameterLocation::Path,
            &context,
        )),
        None => {
            for name in path_parameter_names(&route.path) {
                operation = operation.parameter(Parameter {
                    name,
                    location: ParameterLocation::Path,
                    description: None,
                    required: true,
                    schema: Some(JsonSchema::with_type("string")),
                });
            }
        }
    }

    if let Some(query) = &schema.query {
        operation
            .parameters
            .extend(flatten_parameters(query, ParameterLocation::Query, &context));
    }

    if let Some(body) = &schema.body {
        let body_schema = export_or_placeholder(body, &format!("{} body", context));
        operation = operation.request_body(RequestBody::json(body_schema));
    }

    for (status, spec) in &schema.responses {
        let content = spec.schema.as_ref().and_then(|desc| match to_json_schema(desc) {
            Ok(exported) => Some(json_content(exported)),
            Err(err) => {
                warn!(route = %context, status, error = %err, "Omitting response schema from OpenAPI document");
                None
            }
        });
        operation = operation.response(
            status,
            Response {
                description: spec.description.clone(),
                content,
            },
        );
    }

    if operation.responses.is_empty() {
        operation = operation.response(
            200,
            Response {
                description: "Success".to_string(),
                content: None,
            },
        );
    }

    operation
}

/// One parameter per top-level property of an object schema.
fn flatten_parameters(
    desc: &TypeDescriptor,
    location: ParameterLocation,
    context: &str,
) -> Vec<Parameter> {
    let Some(fields) = object_fields(desc) else {
        warn!(route = %context, ?location, "Parameter schema is not an object; no parameters documented");
        return Vec::new();
    };

    fields
        .iter()
        .map(|field| Parameter {
            name: field.name.clone(),
            location,
            description: field.description.clone(),
            required: location == ParameterLocation::Path || field.is_required(),
            schema: Some(field_schema(field, context)),
        })
        .collect()
}

fn field_schema(field: &FieldDescriptor, context: &str) -> Schema {
    let mut schema = export_or_placeholder(
        &field.type_desc,
        &format!("{} parameter '{}'", context, field.name),
    );
    if let Some(default) = &field.default {
        schema.default = Some(default.clone());
    }
    schema
}

/// Fields of an object schema, looking through wrappers that keep its shape.
fn object_fields(desc: &TypeDescriptor) -> Option<&[FieldDescriptor]> {
    match desc {
        TypeDescriptor::Object { fields, .. } => Some(fields),
        TypeDescriptor::Named { inner, .. }
        | TypeDescriptor::Refine { inner, .. }
        | TypeDescriptor::Coerce(inner)
        | TypeDescriptor::Optional(inner)
        | TypeDescriptor::Nullable(inner)
        | TypeDescriptor::Default { inner, .. } => object_fields(inner),
        _ => None,
    }
}

fn export_or_placeholder(desc: &TypeDescriptor, what: &str) -> Schema {
    to_json_schema(desc).unwrap_or_else(|err| {
        warn!(schema = what, error = %err, "Using placeholder schema in OpenAPI document");
        JsonSchema::placeholder_object()
    })
}

// ============================================================================
// Paths
// ============================================================================

/// `/users/:id` becomes `/users/{id}`; `*rest` becomes `{rest}`.
pub fn to_openapi_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match param_name(segment) {
            Some(name) => format!("{{{}}}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Names of the parameters in a colon-style path, in order.
pub fn path_parameter_names(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(param_name)
        .map(String::from)
        .collect()
}

fn param_name(segment: &str) -> Option<&str> {
    let name = segment
        .strip_prefix(':')
        .or_else(|| segment.strip_prefix('*'))?;
    let name = name.strip_suffix('?').unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use crate::route::{Route, RoutePaths};
    use keel_validation::NumericConstraints;
    use serde_json::json;

    fn definition(method: HttpMethod, path: &str, route: Route) -> Arc<RouteDefinition> {
        let (def, _) = route.into_definition(method, RoutePaths::from(path)).unwrap();
        Arc::new(def)
    }

    fn noop() -> Route {
        Route::new(handler(|_ctx| async { Ok(None) }))
    }

    #[test]
    fn test_to_openapi_path() {
        assert_eq!(to_openapi_path("/users/:id"), "/users/{id}");
        assert_eq!(
            to_openapi_path("/orgs/:org/users/:id?"),
            "/orgs/{org}/users/{id}"
        );
        assert_eq!(to_openapi_path("/files/*path"), "/files/{path}");
        assert_eq!(to_openapi_path("/health"), "/health");
        assert_eq!(path_parameter_names("/orgs/:org/users/:id"), vec!["org", "id"]);
    }

    #[test]
    fn test_default_response() {
        let spec = generate(&[definition(HttpMethod::Get, "/ping", noop())], Info::new("t", "1"));
        let op = spec.operation(HttpMethod::Get, "/ping").unwrap();
        assert_eq!(op.responses.len(), 1);
        assert_eq!(op.responses["200"].description, "Success");
    }

    #[test]
    fn test_query_parameters_flattened() {
        let query = TypeDescriptor::object(vec![
            FieldDescriptor::new("search", TypeDescriptor::string()),
            FieldDescriptor::new(
                "page",
                TypeDescriptor::int_with(NumericConstraints::default().minimum(1)).coerce(),
            )
            .optional(),
        ]);
        let route = definition(HttpMethod::Get, "/users", noop().query(query));
        let spec = generate(&[route], Info::new("t", "1"));

        let params = &spec.operation(HttpMethod::Get, "/users").unwrap().parameters;
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "search");
        assert!(params[0].required);
        assert_eq!(params[1].name, "page");
        assert!(!params[1].required);
        assert_eq!(params[1].location, ParameterLocation::Query);
        assert_eq!(
            serde_json::to_value(&params[1].schema).unwrap(),
            json!({"type": "integer", "minimum": 1})
        );
    }

    #[test]
    fn test_path_params_always_required() {
        let params = TypeDescriptor::object(vec![
            FieldDescriptor::new("id", TypeDescriptor::uuid()).optional(),
        ]);
        let route = definition(HttpMethod::Get, "/users/:id", noop().params(params));
        let spec = generate(&[route], Info::new("t", "1"));

        let param = &spec.operation(HttpMethod::Get, "/users/{id}").unwrap().parameters[0];
        assert_eq!(param.location, ParameterLocation::Path);
        assert!(param.required);
        assert_eq!(param.schema.as_ref().unwrap().format.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_undeclared_path_params_are_strings() {
        let route = definition(HttpMethod::Delete, "/users/:id", noop());
        let spec = generate(&[route], Info::new("t", "1"));

        let params = &spec.operation(HttpMethod::Delete, "/users/{id}").unwrap().parameters;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].schema.as_ref().unwrap().schema_type.as_deref(), Some("string"));
    }

    #[test]
    fn test_unexportable_body_uses_placeholder() {
        let body = TypeDescriptor::custom("opaque", |_| Ok(()));
        let route = definition(
            HttpMethod::Post,
            "/blobs",
            noop()
                .body(body.clone())
                .response(201, "Created", Some(body)),
        );
        let spec = generate(&[route], Info::new("t", "1"));
        let op = spec.operation(HttpMethod::Post, "/blobs").unwrap();

        let request_body = op.request_body.as_ref().unwrap();
        assert!(request_body.required);
        assert_eq!(
            request_body.content["application/json"].schema,
            Some(JsonSchema::placeholder_object())
        );
        assert_eq!(op.responses["201"].content, None);
    }

    #[test]
    fn test_components_and_document_shape() {
        let user = TypeDescriptor::object(vec![FieldDescriptor::new("id", TypeDescriptor::int())]);
        let spec = OpenApiGenerator::new(
            Info::new("Users", "2.0.0")
                .description("User directory")
                .license("MIT", None),
        )
        .server("https://api.example.com", None)
        .tag("users", Some("User operations".into()))
        .component("User", user)
        .generate(&[]);

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["openapi"], "3.0.3");
        assert_eq!(value["info"]["license"]["name"], "MIT");
        assert_eq!(value["servers"][0]["url"], "https://api.example.com");
        assert_eq!(value["components"]["schemas"]["User"]["type"], "object");
        assert_eq!(value["tags"][0]["name"], "users");
        assert_eq!(value["paths"], json!({}));
    }

    #[test]
    fn test_yaml_output() {
        let spec = generate(&[definition(HttpMethod::Get, "/ping", noop())], Info::new("t", "1"));
        let yaml = spec.to_yaml().unwrap();
        let parsed: OpenApiSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, spec);
    }
}
