//! Business handlers
//!
//! A handler receives the validated inputs in a [`HandlerContext`] and returns
//! the JSON value to send, or `None` for an empty object. Handlers that need
//! full control can write to `ctx.response` directly; the adapter then sends
//! nothing further.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::request::Request;
use crate::response::ResponseHandle;

/// Boxed future for async handlers
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produces
pub type HandlerResult = anyhow::Result<Option<Value>>;

/// Type-erased async handler
pub type HandlerFn = Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async closure as a [`HandlerFn`].
///
/// ```rust
/// use keel_api::handler::{handler, json};
///
/// let list_users = handler(|ctx| async move {
///     let page = ctx.query["page"].as_i64().unwrap_or(1);
///     json(serde_json::json!({"page": page, "users": []}))
/// });
/// # let _ = list_users;
/// ```
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Serialize `value` as the handler's output.
pub fn json<T: Serialize>(value: T) -> HandlerResult {
    Ok(Some(serde_json::to_value(value)?))
}

/// Inputs available to a handler.
///
/// `query`, `params` and `body` hold the validated values when the route
/// declares a schema for them, the raw values otherwise.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub query: Value,
    pub params: Value,
    pub body: Value,
    pub request: Arc<Request>,
    pub response: ResponseHandle,
}

impl HandlerContext {
    pub fn query_as<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.query.clone())?)
    }

    pub fn params_as<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.params.clone())?)
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Path parameter as a string, whatever its validated type
    pub fn param(&self, name: &str) -> Option<String> {
        match self.params.get(name)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
