//! App facade
//!
//! Registration by HTTP method, app-level middlewares, OpenAPI access and
//! server lifecycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use keel_api::handler::{handler, json};
//! use keel_api::{App, AppConfig, Route, ServerConfig};
//! use keel_validation::{FieldDescriptor, TypeDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::new(AppConfig::default());
//!     app.get(
//!         "/users/:id",
//!         Route::new(handler(|ctx| async move { json(&ctx.params) })).params(
//!             TypeDescriptor::object(vec![FieldDescriptor::new(
//!                 "id",
//!                 TypeDescriptor::int().coerce(),
//!             )]),
//!         ),
//!     )?;
//!
//!     app.listen(ServerConfig::new("127.0.0.1:3000")).await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, field, info, info_span, Instrument};

use crate::adapter::{send_error, RouteHandler};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{Flow, Middleware, MiddlewareChain};
use crate::openapi::{Info, OpenApiGenerator, OpenApiSpec};
use crate::registry::RouteRegistry;
use crate::request::{HttpMethod, Request};
use crate::response::{ResponseHandle, SentResponse};
use crate::route::{Route, RouteDefinition, RoutePaths};
use crate::router::Router;
use crate::server::{self, ServerConfig, ServerError};

struct DocsEndpoint {
    path: String,
    generator: OpenApiGenerator,
}

pub struct App {
    config: Arc<AppConfig>,
    registry: RouteRegistry,
    router: Router,
    middlewares: MiddlewareChain,
    docs: Option<DocsEndpoint>,
}

impl Default for App {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: RouteRegistry::new(),
            router: Router::new(),
            middlewares: MiddlewareChain::new(),
            docs: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register `route` for `method` on one or more paths.
    pub fn route(
        &mut self,
        method: HttpMethod,
        paths: impl Into<RoutePaths>,
        route: Route,
    ) -> ApiResult<&mut Self> {
        let (definition, handler) = route.into_definition(method, paths.into())?;
        let definition = Arc::new(definition);
        let bound = Arc::new(RouteHandler::new(
            definition.clone(),
            handler,
            self.config.clone(),
        ));

        // Every path must insert cleanly before the route goes live
        let mut staged = self.router.clone();
        for path in &definition.paths {
            staged.insert(method, path, bound.clone())?;
        }
        self.router = staged;

        info!(%method, path = %definition.path, "Registered route");
        self.registry.register(definition);
        Ok(self)
    }

    pub fn get(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Get, paths, route)
    }

    pub fn post(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Post, paths, route)
    }

    pub fn put(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Put, paths, route)
    }

    pub fn patch(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Patch, paths, route)
    }

    pub fn delete(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Delete, paths, route)
    }

    pub fn head(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Head, paths, route)
    }

    pub fn options(&mut self, paths: impl Into<RoutePaths>, route: Route) -> ApiResult<&mut Self> {
        self.route(HttpMethod::Options, paths, route)
    }

    /// App-level middleware, run before routing.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middlewares.add(Arc::new(middleware));
        self
    }

    /// Registered definitions, in registration order
    pub fn routes(&self) -> &[Arc<RouteDefinition>] {
        self.registry.list()
    }

    pub fn openapi(&self, info: Info) -> OpenApiSpec {
        OpenApiGenerator::new(info).generate(self.routes())
    }

    pub fn openapi_with(&self, generator: &OpenApiGenerator) -> OpenApiSpec {
        generator.generate(self.routes())
    }

    /// Serve the generated document as JSON on `GET path`. The endpoint does
    /// not document itself.
    pub fn serve_openapi(&mut self, path: impl Into<String>, generator: OpenApiGenerator) -> &mut Self {
        self.docs = Some(DocsEndpoint {
            path: path.into(),
            generator,
        });
        self
    }

    /// Handle one request in process.
    pub async fn dispatch(&self, request: Request) -> SentResponse {
        let span = info_span!(
            "http.request",
            http.method = %request.method,
            http.target = %request.path,
            http.status_code = field::Empty,
        );

        let response = ResponseHandle::new();
        self.route_request(request, &response)
            .instrument(span.clone())
            .await;

        let sent = response.sent().unwrap_or_else(|| {
            error!("Request finished without a response");
            let err = ApiError::Handler(anyhow::anyhow!("No response was sent"));
            SentResponse {
                status: err.status_code(),
                headers: [("content-type".to_string(), "application/json".to_string())].into(),
                body: Bytes::from(err.to_body().to_string()),
            }
        });
        span.record("http.status_code", sent.status);
        sent
    }

    async fn route_request(&self, mut request: Request, response: &ResponseHandle) {
        match self.middlewares.run(&mut request, response).await {
            Ok(Flow::Halt) => return,
            Ok(Flow::Continue) => {}
            Err(err) => {
                send_error(&ApiError::Handler(err), response);
                return;
            }
        }

        if let Some(docs) = &self.docs {
            if matches!(request.method, HttpMethod::Get | HttpMethod::Head) && request.path == docs.path {
                let spec = self.openapi_with(&docs.generator);
                let body = serde_json::to_value(&spec).unwrap_or_else(|err| {
                    error!(error = %err, "Failed to encode OpenAPI document");
                    json!({})
                });
                if let Err(err) = response.json(&body) {
                    error!(error = %err, "Failed to send OpenAPI document");
                }
                return;
            }
        }

        match self.router.match_route(request.method, &request.path) {
            Some(matched) => {
                request.params = matched.params;
                matched.handler.dispatch(request, response.clone()).await;
            }
            None => {
                let err = ApiError::NotFound(format!("Cannot {} {}", request.method, request.path));
                send_error(&err, response);
            }
        }
    }

    /// Bind and serve in the background.
    pub async fn start(self, config: ServerConfig) -> Result<RunningServer, ServerError> {
        let addr: SocketAddr = config.bind_addr.parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Server listening on http://{}", local_addr);
        info!("Max body size: {} bytes", config.max_body_size);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server::serve(listener, Arc::new(self), config, async move {
            let _ = shutdown_rx.await;
        }));

        Ok(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn listen(self, config: ServerConfig) -> Result<(), ServerError> {
        let running = self.start(config).await?;
        info!("Press Ctrl+C to shutdown");
        server::shutdown_signal().await;
        running.close().await;
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("routes", &self.registry.len())
            .field("router", &self.router)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

/// Handle to a server started with [`App::start`].
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            error!(error = %err, "Server task failed");
        }
        info!("Server stopped");
    }
}
