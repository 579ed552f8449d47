//! Route handler adapter
//!
//! Wraps a business handler with the validation pipeline:
//!
//! 1. Route middlewares
//! 2. Query, params and body validation (each only when a schema is declared)
//! 3. Handler execution
//! 4. Optional response validation against `responses[200]`
//! 5. JSON send, unless the handler already wrote the response
//!
//! Failures at any step become a JSON error response with the matching
//! status, unless a response was already sent, in which case they are only
//! logged.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, field, info_span, warn, Instrument, Span};

use keel_validation::TypeDescriptor;

use crate::config::{AppConfig, ResolvedConfig};
use crate::error::{ApiError, ApiResult};
use crate::handler::{HandlerContext, HandlerFn};
use crate::middleware::{Flow, MiddlewareChain};
use crate::request::Request;
use crate::response::{ResponseError, ResponseHandle, JSON_CONTENT_TYPE};
use crate::route::RouteDefinition;
use crate::validation::{validate, InputSource};

/// Where a request is in the pipeline. Recorded on the `route` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    ValidatingInputs,
    ExecutingHandler,
    ValidatingResponse,
    Sending,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::ValidatingInputs => "validating_inputs",
            Stage::ExecutingHandler => "executing_handler",
            Stage::ValidatingResponse => "validating_response",
            Stage::Sending => "sending",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }
}

fn enter_stage(stage: Stage) {
    Span::current().record("stage", stage.as_str());
    debug!(stage = stage.as_str(), "Route stage");
}

/// A registered route bound to its handler.
pub struct RouteHandler {
    definition: Arc<RouteDefinition>,
    resolved: ResolvedConfig,
    config: Arc<AppConfig>,
    middlewares: MiddlewareChain,
    handler: HandlerFn,
}

impl RouteHandler {
    pub fn new(definition: Arc<RouteDefinition>, handler: HandlerFn, config: Arc<AppConfig>) -> Self {
        let resolved =
            ResolvedConfig::resolve(&config, definition.strict, definition.validate_response);

        let mut middlewares = MiddlewareChain::new();
        for middleware in &definition.middlewares {
            middlewares.add(middleware.clone());
        }

        Self {
            definition,
            resolved,
            config,
            middlewares,
            handler,
        }
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    pub fn resolved(&self) -> ResolvedConfig {
        self.resolved
    }

    /// Run route middlewares, then the pipeline. Always leaves a response
    /// sent on `response`.
    pub async fn dispatch(&self, mut request: Request, response: ResponseHandle) {
        let span = info_span!(
            "route",
            method = %self.definition.method,
            route = %self.definition.path,
            stage = field::Empty,
        );

        async move {
            enter_stage(Stage::Received);

            match self.middlewares.run(&mut request, &response).await {
                Ok(Flow::Halt) => {
                    enter_stage(Stage::Done);
                    return;
                }
                Ok(Flow::Continue) => {}
                Err(err) => {
                    self.report(ApiError::Handler(err), &response);
                    return;
                }
            }

            if let Err(err) = self.handle(request, &response).await {
                self.report(err, &response);
            }
        }
        .instrument(span)
        .await
    }

    /// Validate inputs, run the handler and send its result.
    pub async fn handle(&self, request: Request, response: &ResponseHandle) -> ApiResult<()> {
        let schema = self.definition.schema.clone();

        enter_stage(Stage::ValidatingInputs);
        let query = self.validate_input(
            Value::Object(request.query.clone()),
            schema.query.as_ref(),
            InputSource::Query,
        )?;
        let params = self.validate_input(
            Value::Object(request.params.clone()),
            schema.params.as_ref(),
            InputSource::Params,
        )?;
        let body = self.validate_input(request.body.clone(), schema.body.as_ref(), InputSource::Body)?;

        enter_stage(Stage::ExecutingHandler);
        let ctx = HandlerContext {
            query,
            params,
            body,
            request: Arc::new(request),
            response: response.clone(),
        };
        let output = (self.handler)(ctx).await.map_err(ApiError::Handler)?;

        if response.headers_sent() {
            enter_stage(Stage::Done);
            return Ok(());
        }

        let mut output = output.unwrap_or_else(|| json!({}));

        if self.resolved.validate_response {
            if let Some(response_schema) = schema.response_schema(200) {
                // Strictness governs inputs only; extra output keys pass through
                enter_stage(Stage::ValidatingResponse);
                output = validate(
                    &output,
                    response_schema,
                    InputSource::Response(200),
                    Some(false),
                    &self.config,
                )
                .map_err(ApiError::ResponseValidation)?;
            }
        }

        enter_stage(Stage::Sending);
        match response.send(&output, None, &[("content-type", JSON_CONTENT_TYPE)]) {
            Ok(()) => {}
            Err(ResponseError::AlreadySent) => {
                warn!("Response was sent concurrently; dropping handler output");
            }
            Err(err) => return Err(ApiError::Handler(err.into())),
        }

        enter_stage(Stage::Done);
        Ok(())
    }

    fn validate_input(
        &self,
        data: Value,
        schema: Option<&TypeDescriptor>,
        source: InputSource,
    ) -> ApiResult<Value> {
        match schema {
            // A missing body is absent rather than null
            Some(schema) if data.is_null() && !schema.is_required() => {
                Ok(schema.default_value().unwrap_or(Value::Null))
            }
            Some(schema) => validate(&data, schema, source, Some(self.resolved.strict), &self.config)
                .map_err(ApiError::InputValidation),
            None => Ok(data),
        }
    }

    /// Convert an error into a response.
    pub fn report(&self, err: ApiError, response: &ResponseHandle) {
        enter_stage(Stage::Error);
        send_error(&err, response);
    }
}

/// Log `err` and send it as a JSON error response, unless a response was
/// already sent.
pub(crate) fn send_error(err: &ApiError, response: &ResponseHandle) {
    match err {
        ApiError::ResponseValidation(inner) => {
            error!(details = %inner.details_json(), "Response validation failed");
        }
        ApiError::Handler(inner) => error!(error = %inner, "Handler failed"),
        _ => {}
    }

    if response.headers_sent() {
        warn!(error = %err, "Error raised after the response was sent");
        return;
    }

    if let Err(send_err) = response.send(&err.to_body(), Some(err.status_code()), &[]) {
        error!(error = %send_err, "Failed to send error response");
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("definition", &self.definition)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}
