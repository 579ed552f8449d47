//! HTTP router using matchit radix trees
//!
//! One tree per method. Paths use the colon convention for parameters
//! (`/users/:id`) and `*name` for catch-alls. Registering the same method and
//! path twice replaces the earlier handler.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::adapter::RouteHandler;
use crate::error::{ApiError, ApiResult};
use crate::request::HttpMethod;

/// A matched route with its bound path parameters
pub struct RouteMatch {
    pub handler: Arc<RouteHandler>,
    pub params: Map<String, Value>,
}

#[derive(Clone, Default)]
pub struct Router {
    trees: HashMap<HttpMethod, matchit::Router<usize>>,
    slots: HashMap<(HttpMethod, String), usize>,
    handlers: Vec<Arc<RouteHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `method` at `path`.
    pub fn insert(&mut self, method: HttpMethod, path: &str, handler: Arc<RouteHandler>) -> ApiResult<()> {
        if let Some(&slot) = self.slots.get(&(method, path.to_string())) {
            warn!(%method, path, "Route registered twice; the later registration wins");
            self.handlers[slot] = handler;
            return Ok(());
        }

        let slot = self.handlers.len();
        self.trees
            .entry(method)
            .or_insert_with(matchit::Router::new)
            .insert(path, slot)
            .map_err(|e| ApiError::Registration {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        self.handlers.push(handler);
        self.slots.insert((method, path.to_string()), slot);
        Ok(())
    }

    /// Find the handler for a request. `HEAD` falls back to `GET`.
    pub fn match_route(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        self.lookup(method, path).or_else(|| match method {
            HttpMethod::Head => self.lookup(HttpMethod::Get, path),
            _ => None,
        })
    }

    fn lookup(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;

        let params = matched
            .params
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(decode_path_segment(value).into_owned())))
            .collect();

        Some(RouteMatch {
            handler: self.handlers[*matched.value].clone(),
            params,
        })
    }

    /// Number of distinct method and path pairs
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<String> = self
            .slots
            .keys()
            .map(|(method, path)| format!("{} {}", method, path))
            .collect();
        routes.sort();
        f.debug_struct("Router").field("routes", &routes).finish()
    }
}

fn decode_path_segment(s: &str) -> Cow<'_, str> {
    if !s.contains('%') {
        return Cow::Borrowed(s);
    }
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handler::handler;
    use crate::route::{Route, RoutePaths};
    use serde_json::json;

    fn route_handler(method: HttpMethod, path: &str, summary: &str) -> Arc<RouteHandler> {
        let (def, h) = Route::new(handler(|_ctx| async { Ok(None) }))
            .summary(summary)
            .into_definition(method, RoutePaths::from(path))
            .unwrap();
        Arc::new(RouteHandler::new(Arc::new(def), h, Arc::new(AppConfig::default())))
    }

    fn summary_of(m: &RouteMatch) -> Option<String> {
        m.handler.definition().metadata.summary.clone()
    }

    #[test]
    fn test_static_and_param_routes() {
        let mut router = Router::new();
        router
            .insert(HttpMethod::Get, "/users", route_handler(HttpMethod::Get, "/users", "list"))
            .unwrap();
        router
            .insert(HttpMethod::Get, "/users/:id", route_handler(HttpMethod::Get, "/users/:id", "get"))
            .unwrap();

        let m = router.match_route(HttpMethod::Get, "/users").unwrap();
        assert_eq!(summary_of(&m).as_deref(), Some("list"));
        assert!(m.params.is_empty());

        let m = router.match_route(HttpMethod::Get, "/users/a%20b").unwrap();
        assert_eq!(summary_of(&m).as_deref(), Some("get"));
        assert_eq!(m.params["id"], json!("a b"));

        assert!(router.match_route(HttpMethod::Post, "/users").is_none());
        assert!(router.match_route(HttpMethod::Get, "/posts").is_none());
    }

    #[test]
    fn test_later_registration_wins() {
        let mut router = Router::new();
        router
            .insert(HttpMethod::Get, "/ping", route_handler(HttpMethod::Get, "/ping", "first"))
            .unwrap();
        router
            .insert(HttpMethod::Get, "/ping", route_handler(HttpMethod::Get, "/ping", "second"))
            .unwrap();

        assert_eq!(router.len(), 1);
        let m = router.match_route(HttpMethod::Get, "/ping").unwrap();
        assert_eq!(summary_of(&m).as_deref(), Some("second"));
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let mut router = Router::new();
        router
            .insert(HttpMethod::Get, "/health", route_handler(HttpMethod::Get, "/health", "health"))
            .unwrap();
        assert!(router.match_route(HttpMethod::Head, "/health").is_some());
    }

    #[test]
    fn test_conflicting_pattern_is_rejected() {
        let mut router = Router::new();
        router
            .insert(HttpMethod::Get, "/users/:id", route_handler(HttpMethod::Get, "/users/:id", "a"))
            .unwrap();
        let err = router
            .insert(HttpMethod::Get, "/users/:name", route_handler(HttpMethod::Get, "/users/:name", "b"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Registration { .. }));
        assert_eq!(router.len(), 1);
    }
}
