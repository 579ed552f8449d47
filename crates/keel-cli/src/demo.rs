//! Demo users API served by `keel serve`
//!
//! An in-memory store behind four routes: list/search, create, fetch by id
//! and delete.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use keel_api::handler::{handler, json};
use keel_api::{App, ApiResult, Route};
use keel_validation::{FieldDescriptor, NumericConstraints, StringConstraints, TypeDescriptor};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::KeelConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    email: String,
    age: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    page: f64,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct UserId {
    id: i64,
}

#[derive(Debug, Default)]
struct StoreInner {
    users: BTreeMap<i64, User>,
    next_id: i64,
}

/// In-memory user store
#[derive(Debug, Default)]
pub struct UserStore {
    inner: RwLock<StoreInner>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, email: impl Into<String>, age: Option<i64>) -> User {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            name: name.into(),
            email: email.into(),
            age,
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.inner.read().users.get(&id).cloned()
    }

    pub fn remove(&self, id: i64) -> Option<User> {
        self.inner.write().users.remove(&id)
    }

    /// Users whose name contains `search` (case-insensitive), in id order.
    pub fn search(&self, search: Option<&str>) -> Vec<User> {
        let needle = search.map(str::to_lowercase);
        self.inner
            .read()
            .users
            .values()
            .filter(|user| match &needle {
                Some(needle) => user.name.to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Schemas
// ============================================================================

fn user_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![
        FieldDescriptor::new("id", TypeDescriptor::int()),
        FieldDescriptor::new("name", TypeDescriptor::string()),
        FieldDescriptor::new("email", TypeDescriptor::email()),
        FieldDescriptor::new("age", TypeDescriptor::int()).optional(),
    ])
    .named("User")
}

fn user_list_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![
        FieldDescriptor::new("users", TypeDescriptor::list(user_schema())),
        FieldDescriptor::new("page", TypeDescriptor::number()),
        FieldDescriptor::new("total", TypeDescriptor::int()),
    ])
    .named("UserList")
}

fn list_query_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![
        FieldDescriptor::new("search", TypeDescriptor::string())
            .optional()
            .description("Case-insensitive match on the user name"),
        FieldDescriptor::new("page", TypeDescriptor::number().coerce().with_default(1)),
        FieldDescriptor::new(
            "limit",
            TypeDescriptor::int_with(NumericConstraints::default().minimum(1).maximum(100))
                .coerce()
                .with_default(20),
        ),
    ])
}

fn new_user_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![
        FieldDescriptor::new(
            "name",
            TypeDescriptor::string_with(StringConstraints::default().min_length(1).max_length(100)),
        ),
        FieldDescriptor::new("email", TypeDescriptor::email()),
        FieldDescriptor::new(
            "age",
            TypeDescriptor::int_with(NumericConstraints::default().minimum(0).maximum(150)),
        )
        .optional(),
    ])
    .named("NewUser")
}

fn id_params_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![FieldDescriptor::new(
        "id",
        TypeDescriptor::int_with(NumericConstraints::default().minimum(1)).coerce(),
    )])
}

fn not_found(id: i64) -> serde_json::Value {
    json!({"error": "Not Found", "message": format!("User {} not found", id)})
}

// ============================================================================
// Routes
// ============================================================================

/// Register the users routes on `app`.
pub fn register(app: &mut App, store: Arc<UserStore>) -> ApiResult<()> {
    let list_store = store.clone();
    app.get(
        "/users",
        Route::new(handler(move |ctx| {
            let store = list_store.clone();
            async move {
                let query: ListQuery = ctx.query_as()?;
                let matches = store.search(query.search.as_deref());
                let total = matches.len();
                let skip = ((query.page.max(1.0) as usize) - 1) * query.limit as usize;
                let users: Vec<User> = matches
                    .into_iter()
                    .skip(skip)
                    .take(query.limit as usize)
                    .collect();
                json(json!({"users": users, "page": ctx.query["page"], "total": total}))
            }
        }))
        .query(list_query_schema())
        .response(200, "Matching users", Some(user_list_schema()))
        .summary("List users")
        .tag("users")
        .operation_id("listUsers"),
    )?;

    let create_store = store.clone();
    app.post(
        "/users",
        Route::new(handler(move |ctx| {
            let store = create_store.clone();
            async move {
                let new_user: NewUser = ctx.body_as()?;
                let user = store.insert(new_user.name, new_user.email, new_user.age);
                tracing::info!(id = user.id, "Created user");
                ctx.response.status(201);
                json(user)
            }
        }))
        .body(new_user_schema())
        .strict(true)
        .response(201, "Created user", Some(user_schema()))
        .response(400, "Validation failed", None)
        .summary("Create a user")
        .tag("users")
        .operation_id("createUser"),
    )?;

    let get_store = store.clone();
    app.get(
        "/users/:id",
        Route::new(handler(move |ctx| {
            let store = get_store.clone();
            async move {
                let UserId { id } = ctx.params_as()?;
                match store.get(id) {
                    Some(user) => json(user),
                    None => {
                        ctx.response.send(&not_found(id), Some(404), &[])?;
                        Ok(None)
                    }
                }
            }
        }))
        .params(id_params_schema())
        .response(200, "The user", Some(user_schema()))
        .response(404, "No such user", None)
        .validate_response(true)
        .summary("Fetch a user")
        .tag("users")
        .operation_id("getUser"),
    )?;

    app.delete(
        "/users/:id",
        Route::new(handler(move |ctx| {
            let store = store.clone();
            async move {
                let UserId { id } = ctx.params_as()?;
                match store.remove(id) {
                    Some(_) => ctx.response.end(Some(204))?,
                    None => ctx.response.send(&not_found(id), Some(404), &[])?,
                }
                Ok(None)
            }
        }))
        .params(id_params_schema())
        .response(204, "Deleted", None)
        .response(404, "No such user", None)
        .summary("Delete a user")
        .tag("users")
        .operation_id("deleteUser"),
    )?;

    Ok(())
}

/// Build the demo app from `config`, seeded with a few users.
pub fn build(config: &KeelConfig) -> Result<App> {
    let store = Arc::new(UserStore::new());
    store.insert("John Smith", "john@example.com", Some(34));
    store.insert("Johnny Appleseed", "johnny@example.com", None);
    store.insert("Ada Lovelace", "ada@example.com", Some(36));

    let mut app = App::new(config.app);
    register(&mut app, store)?;

    if let Some(path) = &config.openapi.docs_path {
        app.serve_openapi(path.clone(), config.generator());
    }

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_api::{HttpMethod, Request};

    fn app() -> App {
        let mut config = KeelConfig::default();
        config.app = config.app.log_validation_errors(false);
        build(&config).unwrap()
    }

    #[test]
    fn test_store_search() {
        let store = UserStore::new();
        store.insert("John", "john@x.io", None);
        store.insert("Mary", "mary@x.io", None);

        assert_eq!(store.search(Some("JO")).len(), 1);
        assert_eq!(store.search(None).len(), 2);
        assert!(store.remove(1).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_search_with_coerced_page() {
        let app = app();
        let sent = app
            .dispatch(Request::new(HttpMethod::Get, "/users?search=john&page=1"))
            .await;
        assert_eq!(sent.status, 200);

        let body = sent.json().unwrap();
        assert_eq!(body["page"], 1);
        assert_eq!(body["total"], 2);
        assert_eq!(body["users"][0]["name"], "John Smith");
    }

    #[tokio::test]
    async fn test_pagination() {
        let app = app();
        let sent = app
            .dispatch(Request::new(HttpMethod::Get, "/users?page=2&limit=2"))
            .await;
        let body = sent.json().unwrap();
        assert_eq!(body["total"], 3);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
        assert_eq!(body["users"][0]["name"], "Ada Lovelace");

        let sent = app
            .dispatch(Request::new(HttpMethod::Get, "/users?limit=500"))
            .await;
        assert_eq!(sent.status, 400);
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let app = app();
        let req = Request::new(HttpMethod::Post, "/users")
            .with_json(json!({"name": "Grace", "email": "grace@example.com"}));
        let sent = app.dispatch(req).await;
        assert_eq!(sent.status, 201);
        let id = sent.json().unwrap()["id"].as_i64().unwrap();

        let sent = app
            .dispatch(Request::new(HttpMethod::Get, &format!("/users/{}", id)))
            .await;
        assert_eq!(sent.status, 200);
        assert_eq!(sent.json().unwrap()["email"], "grace@example.com");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_keys() {
        let app = app();
        let req = Request::new(HttpMethod::Post, "/users")
            .with_json(json!({"name": "Grace", "email": "grace@example.com", "admin": true}));
        assert_eq!(app.dispatch(req).await.status, 400);
    }

    #[tokio::test]
    async fn test_delete_sends_204_then_404() {
        let app = app();
        let sent = app.dispatch(Request::new(HttpMethod::Delete, "/users/1")).await;
        assert_eq!(sent.status, 204);
        assert!(sent.body.is_empty());

        let sent = app.dispatch(Request::new(HttpMethod::Delete, "/users/1")).await;
        assert_eq!(sent.status, 404);
        assert_eq!(sent.json().unwrap()["message"], "User 1 not found");
    }

    #[test]
    fn test_openapi_document() {
        let config = KeelConfig::default();
        let app = build(&config).unwrap();
        let spec = app.openapi_with(&config.generator());

        assert_eq!(spec.paths.len(), 2);
        let create = spec.operation(HttpMethod::Post, "/users").unwrap();
        assert_eq!(create.operation_id.as_deref(), Some("createUser"));
        assert!(create.responses.contains_key("201"));
        assert!(spec.operation(HttpMethod::Delete, "/users/{id}").is_some());
    }
}
