//! Append-only registry of route definitions
//!
//! The registry is the source for OpenAPI generation. It keeps every
//! registration in order, duplicates included; dispatch is handled separately
//! by the [`Router`](crate::router::Router).

use std::sync::Arc;

use crate::route::RouteDefinition;

#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<Arc<RouteDefinition>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<RouteDefinition>) {
        self.routes.push(definition);
    }

    /// Definitions in registration order
    pub fn list(&self) -> &[Arc<RouteDefinition>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
