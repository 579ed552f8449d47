//! keel-api: schema-validated HTTP routes
//!
//! Routes declare schemas for their query string, path parameters, body and
//! responses. Requests are validated before the business handler runs, handler
//! output can be validated before it is sent, and the same schemas produce an
//! OpenAPI 3.0 document.
//!
//! - [`App`] registers routes per HTTP method and runs the server
//! - [`adapter::RouteHandler`] drives validation and error responses
//! - [`registry::RouteRegistry`] keeps every registration for documentation
//! - [`openapi::OpenApiGenerator`] turns the registry into a document

pub mod adapter;
pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod openapi;
pub mod registry;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod validation;

// Re-exports
pub use adapter::{RouteHandler, Stage};
pub use app::{App, RunningServer};
pub use config::{AppConfig, ResolvedConfig};
pub use error::{ApiError, ApiResult};
pub use handler::{handler, json, HandlerContext, HandlerFn, HandlerResult};
pub use middleware::{FnMiddleware, Middleware, MiddlewareChain};
pub use openapi::{generate, Info, OpenApiGenerator, OpenApiSpec};
pub use registry::RouteRegistry;
pub use request::{HttpMethod, Request};
pub use response::{ResponseHandle, SentResponse};
pub use route::{Route, RouteDefinition, RouteMetadata, RoutePaths, RouteSchema};
pub use server::{ServerConfig, ServerError};
pub use validation::{validate, InputSource, ValidationDetail, ValidationError, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
