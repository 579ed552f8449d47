//! Route declarations
//!
//! A [`Route`] bundles a handler with its schemas, documentation metadata and
//! per-route overrides. Registering it on an [`App`](crate::App) freezes it
//! into an immutable [`RouteDefinition`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use keel_validation::TypeDescriptor;

use crate::error::{ApiError, ApiResult};
use crate::handler::HandlerFn;
use crate::middleware::Middleware;
use crate::request::HttpMethod;

/// A documented response for one status code.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub description: String,
    pub schema: Option<TypeDescriptor>,
}

/// Schemas declared for a route. Absent entries are not validated.
#[derive(Debug, Clone, Default)]
pub struct RouteSchema {
    pub query: Option<TypeDescriptor>,
    pub params: Option<TypeDescriptor>,
    pub body: Option<TypeDescriptor>,
    pub responses: BTreeMap<u16, ResponseSpec>,
}

impl RouteSchema {
    pub fn response_schema(&self, status: u16) -> Option<&TypeDescriptor> {
        self.responses.get(&status).and_then(|r| r.schema.as_ref())
    }
}

/// Documentation-only route metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteMetadata {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
}

// ============================================================================
// Paths
// ============================================================================

/// One path or several equivalent paths for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths(Vec<String>);

impl RoutePaths {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The path used in generated documentation.
    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl From<&str> for RoutePaths {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<String> for RoutePaths {
    fn from(path: String) -> Self {
        Self(vec![path])
    }
}

impl From<Vec<String>> for RoutePaths {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}

impl From<Vec<&str>> for RoutePaths {
    fn from(paths: Vec<&str>) -> Self {
        Self(paths.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RoutePaths {
    fn from(paths: [&str; N]) -> Self {
        Self(paths.iter().map(|p| p.to_string()).collect())
    }
}

// ============================================================================
// Route Builder
// ============================================================================

/// Route under construction
///
/// ```rust
/// use keel_api::{handler::handler, Route};
/// use keel_validation::{FieldDescriptor, TypeDescriptor};
///
/// let route = Route::new(handler(|ctx| async move { Ok(Some(ctx.body)) }))
///     .body(TypeDescriptor::object(vec![
///         FieldDescriptor::new("name", TypeDescriptor::string()),
///     ]))
///     .response(201, "Created", None)
///     .summary("Create a user")
///     .tag("users")
///     .strict(true);
/// # let _ = route;
/// ```
pub struct Route {
    handler: HandlerFn,
    schema: RouteSchema,
    metadata: RouteMetadata,
    strict: Option<bool>,
    validate_response: Option<bool>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Route {
    pub fn new(handler: HandlerFn) -> Self {
        Self {
            handler,
            schema: RouteSchema::default(),
            metadata: RouteMetadata::default(),
            strict: None,
            validate_response: None,
            middlewares: Vec::new(),
        }
    }

    pub fn query(mut self, schema: TypeDescriptor) -> Self {
        self.schema.query = Some(schema);
        self
    }

    pub fn params(mut self, schema: TypeDescriptor) -> Self {
        self.schema.params = Some(schema);
        self
    }

    pub fn body(mut self, schema: TypeDescriptor) -> Self {
        self.schema.body = Some(schema);
        self
    }

    /// Declare a response. `schema` documents the body; for status 200 it is
    /// also what response validation checks against.
    pub fn response(
        mut self,
        status: u16,
        description: impl Into<String>,
        schema: Option<TypeDescriptor>,
    ) -> Self {
        self.schema.responses.insert(
            status,
            ResponseSpec {
                description: description.into(),
                schema,
            },
        );
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.metadata.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.operation_id = Some(id.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.metadata.deprecated = true;
        self
    }

    /// Override the app's strictness for this route.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Override the app's response validation setting for this route.
    pub fn validate_response(mut self, enabled: bool) -> Self {
        self.validate_response = Some(enabled);
        self
    }

    /// Route-level middleware, run before input validation.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Freeze into a definition for `method` at `paths`.
    pub(crate) fn into_definition(
        self,
        method: HttpMethod,
        paths: RoutePaths,
    ) -> ApiResult<(RouteDefinition, HandlerFn)> {
        let path = paths
            .primary()
            .ok_or_else(|| ApiError::Registration {
                path: String::new(),
                reason: "at least one path is required".into(),
            })?
            .to_string();

        if let Some(bad) = paths.as_slice().iter().find(|p| !p.starts_with('/')) {
            return Err(ApiError::Registration {
                path: bad.clone(),
                reason: "paths must start with '/'".into(),
            });
        }

        let definition = RouteDefinition {
            method,
            path,
            paths: paths.0,
            schema: Arc::new(self.schema),
            metadata: self.metadata,
            strict: self.strict,
            validate_response: self.validate_response,
            middlewares: self.middlewares,
        };
        Ok((definition, self.handler))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("schema", &self.schema)
            .field("metadata", &self.metadata)
            .field("strict", &self.strict)
            .field("validate_response", &self.validate_response)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Route Definition
// ============================================================================

/// A registered route. Never modified after registration.
pub struct RouteDefinition {
    pub method: HttpMethod,
    /// Documented path (the first one given)
    pub path: String,
    /// Every dispatched path
    pub paths: Vec<String>,
    pub schema: Arc<RouteSchema>,
    pub metadata: RouteMetadata,
    pub strict: Option<bool>,
    pub validate_response: Option<bool>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("paths", &self.paths)
            .field("metadata", &self.metadata)
            .field("strict", &self.strict)
            .field("validate_response", &self.validate_response)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}
