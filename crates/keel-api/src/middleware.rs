//! Middleware system
//!
//! Middlewares run before routing (app level) or before validation (route
//! level). They may mutate the request, set response headers, or send the
//! response themselves, which ends the pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::request::Request;
use crate::response::ResponseHandle;

/// Middleware trait
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process a request before it reaches the handler.
    ///
    /// An error is reported to the client like a handler error.
    async fn handle(&self, req: &mut Request, res: &ResponseHandle) -> anyhow::Result<()>;
}

/// Middleware built from a synchronous closure
pub struct FnMiddleware<F> {
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut Request, &ResponseHandle) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &ResponseHandle) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, req: &mut Request, res: &ResponseHandle) -> anyhow::Result<()> {
        (self.func)(req, res)
    }
}

/// Whether the pipeline continues after the middlewares ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A middleware already sent the response
    Halt,
}

/// Ordered list of middlewares
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new middleware chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run every middleware in order, stopping early once one has sent the
    /// response or failed.
    pub async fn run(&self, req: &mut Request, res: &ResponseHandle) -> anyhow::Result<Flow> {
        for middleware in &self.middlewares {
            middleware.handle(req, res).await?;
            if res.headers_sent() {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;
    use serde_json::json;

    fn tagging(tag: &'static str) -> Arc<dyn Middleware> {
        Arc::new(FnMiddleware::new(move |req: &mut Request, _res: &ResponseHandle| {
            let seen = req
                .locals
                .entry("seen")
                .or_insert_with(|| json!([]));
            if let Some(list) = seen.as_array_mut() {
                list.push(json!(tag));
            }
            Ok(())
        }))
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let mut chain = MiddlewareChain::new();
        chain.add(tagging("a"));
        chain.add(tagging("b"));

        let mut req = Request::new(HttpMethod::Get, "/");
        let res = ResponseHandle::new();
        assert_eq!(chain.run(&mut req, &res).await.unwrap(), Flow::Continue);
        assert_eq!(req.locals["seen"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_sending_middleware_halts() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(FnMiddleware::new(|_req: &mut Request, res: &ResponseHandle| {
            res.send(&json!({"error": "Unauthorized"}), Some(401), &[])?;
            Ok(())
        })));
        chain.add(tagging("never"));

        let mut req = Request::new(HttpMethod::Get, "/");
        let res = ResponseHandle::new();
        assert_eq!(chain.run(&mut req, &res).await.unwrap(), Flow::Halt);
        assert!(!req.locals.contains_key("seen"));
        assert_eq!(res.sent().unwrap().status, 401);
    }

    #[tokio::test]
    async fn test_error_stops_chain() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(FnMiddleware::new(|_req: &mut Request, _res: &ResponseHandle| {
            anyhow::bail!("denied")
        })));
        chain.add(tagging("never"));

        let mut req = Request::new(HttpMethod::Get, "/");
        let err = chain.run(&mut req, &ResponseHandle::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "denied");
        assert!(req.locals.is_empty());
    }
}
