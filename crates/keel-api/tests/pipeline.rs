//! Request pipeline behaviour through `App::dispatch`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keel_api::handler::{handler, json};
use keel_api::{App, AppConfig, FnMiddleware, HttpMethod, Request, ResponseHandle, Route};
use keel_validation::{FieldDescriptor, NumericConstraints, TypeDescriptor};
use serde_json::{json, Value};

fn echo_route() -> Route {
    Route::new(handler(|ctx| async move {
        json(json!({"query": ctx.query, "params": ctx.params, "body": ctx.body}))
    }))
}

fn user_body_schema() -> TypeDescriptor {
    TypeDescriptor::object(vec![
        FieldDescriptor::new("name", TypeDescriptor::string()),
        FieldDescriptor::new("email", TypeDescriptor::email()),
    ])
}

fn quiet() -> AppConfig {
    AppConfig::default().log_validation_errors(false)
}

fn post_json(path: &str, body: Value) -> Request {
    Request::new(HttpMethod::Post, path).with_json(body)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_query_coercion_with_default() {
    let mut app = App::new(quiet());
    app.get(
        "/users",
        echo_route().query(TypeDescriptor::object(vec![
            FieldDescriptor::new("search", TypeDescriptor::string()).optional(),
            FieldDescriptor::new("page", TypeDescriptor::number().coerce().with_default(1)),
        ])),
    )
    .unwrap();

    let sent = app
        .dispatch(Request::new(HttpMethod::Get, "/users?search=john&page=2"))
        .await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap()["query"], json!({"search": "john", "page": 2}));

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/users")).await;
    assert_eq!(sent.json().unwrap()["query"], json!({"page": 1}));
}

#[tokio::test]
async fn test_passthrough_keeps_extra_fields() {
    let mut app = App::new(quiet());
    app.post("/users", echo_route().body(user_body_schema())).unwrap();

    let body = json!({"name": "John", "email": "john@example.com", "extraField": "x"});
    let sent = app.dispatch(post_json("/users", body.clone())).await;

    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap()["body"], body);
}

#[tokio::test]
async fn test_strict_rejects_extra_fields() {
    let mut app = App::new(quiet().strict(true));
    app.post("/users", echo_route().body(user_body_schema())).unwrap();

    let body = json!({"name": "John", "email": "john@example.com", "extraField": "x"});
    let sent = app.dispatch(post_json("/users", body.clone())).await;

    assert_eq!(sent.status, 400);
    let payload = sent.json().unwrap();
    assert_eq!(payload["error"], "Validation failed");
    assert_eq!(payload["message"], "Validation failed for body");
    let detail = &payload["details"][0];
    assert!(detail["message"].as_str().unwrap().contains("Unrecognized key"));
    assert_eq!(detail["path"], "");
    assert_eq!(detail["value"], body);
}

#[tokio::test]
async fn test_handler_error_becomes_500() {
    let mut app = App::new(quiet());
    app.get(
        "/boom",
        Route::new(handler(|_ctx| async { Err(anyhow::anyhow!("boom")) })),
    )
    .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/boom")).await;
    assert_eq!(sent.status, 500);
    assert_eq!(
        sent.json().unwrap(),
        json!({"error": "Internal Server Error", "message": "boom"})
    );
}

#[tokio::test]
async fn test_handler_sent_response_is_not_overwritten() {
    let mut app = App::new(quiet());
    app.get(
        "/custom",
        Route::new(handler(|ctx| async move {
            ctx.response
                .send(&json!({"custom": true}), Some(202), &[("x-handled", "yes")])?;
            Ok(None)
        })),
    )
    .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/custom")).await;
    assert_eq!(sent.status, 202);
    assert_eq!(sent.header("x-handled"), Some("yes"));
    assert_eq!(sent.json().unwrap(), json!({"custom": true}));
}

#[tokio::test]
async fn test_handler_error_after_send_keeps_response() {
    let mut app = App::new(quiet());
    app.get(
        "/late",
        Route::new(handler(|ctx| async move {
            ctx.response.json(&json!({"partial": true}))?;
            Err(anyhow::anyhow!("failed after sending"))
        })),
    )
    .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/late")).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap(), json!({"partial": true}));
}

// ============================================================================
// Validation Order and Overrides
// ============================================================================

#[tokio::test]
async fn test_params_validated_and_coerced() {
    let mut app = App::new(quiet());
    app.get(
        "/users/:id",
        echo_route().params(TypeDescriptor::object(vec![FieldDescriptor::new(
            "id",
            TypeDescriptor::int_with(NumericConstraints::default().minimum(1)).coerce(),
        )])),
    )
    .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/users/42")).await;
    assert_eq!(sent.json().unwrap()["params"], json!({"id": 42}));

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/users/0")).await;
    assert_eq!(sent.status, 400);
    let payload = sent.json().unwrap();
    assert_eq!(payload["message"], "Validation failed for params");
    assert_eq!(payload["details"][0]["path"], "id");
}

#[tokio::test]
async fn test_query_checked_before_body() {
    let mut app = App::new(quiet());
    app.post(
        "/items",
        echo_route()
            .query(TypeDescriptor::object(vec![FieldDescriptor::new(
                "dry_run",
                TypeDescriptor::boolean().coerce(),
            )]))
            .body(user_body_schema()),
    )
    .unwrap();

    let sent = app.dispatch(post_json("/items", json!({}))).await;
    assert_eq!(sent.status, 400);
    assert_eq!(sent.json().unwrap()["message"], "Validation failed for query");
}

#[tokio::test]
async fn test_every_issue_is_reported() {
    let mut app = App::new(quiet());
    app.post("/users", echo_route().body(user_body_schema())).unwrap();

    let sent = app.dispatch(post_json("/users", json!({"email": "nope"}))).await;
    let payload = sent.json().unwrap();
    let details = payload["details"].as_array().unwrap();
    let paths: Vec<&str> = details.iter().map(|d| d["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["name", "email"]);
    assert_eq!(details[0]["message"], "Required");
}

#[tokio::test]
async fn test_route_strict_overrides_app() {
    let mut app = App::new(quiet().strict(true));
    app.post("/lenient", echo_route().body(user_body_schema()).strict(false))
        .unwrap();

    let body = json!({"name": "A", "email": "a@x.io", "extra": 1});
    let sent = app.dispatch(post_json("/lenient", body)).await;
    assert_eq!(sent.status, 200);
}

#[tokio::test]
async fn test_routes_without_schemas_pass_raw_inputs() {
    let mut app = App::new(quiet());
    app.post("/raw/:slug", echo_route()).unwrap();

    let sent = app
        .dispatch(post_json("/raw/hello?x=1&x=2", json!([1, "two"])))
        .await;
    assert_eq!(
        sent.json().unwrap(),
        json!({"query": {"x": ["1", "2"]}, "params": {"slug": "hello"}, "body": [1, "two"]})
    );
}

// ============================================================================
// Response Validation
// ============================================================================

fn user_response_route(output: Value) -> Route {
    Route::new(handler(move |_ctx| {
        let output = output.clone();
        async move { Ok(Some(output)) }
    }))
    .response(
        200,
        "The user",
        Some(TypeDescriptor::object(vec![
            FieldDescriptor::new("id", TypeDescriptor::int()),
            FieldDescriptor::new("name", TypeDescriptor::string()),
        ])),
    )
}

#[tokio::test]
async fn test_response_validation_failure_is_500() {
    let mut app = App::new(quiet());
    app.get("/me", user_response_route(json!({"id": 1})).validate_response(true))
        .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/me")).await;
    assert_eq!(sent.status, 500);
    let payload = sent.json().unwrap();
    assert_eq!(payload["error"], "Response validation failed");
    assert_eq!(payload["message"], "Validation failed for response (200)");
    assert_eq!(payload["details"][0]["path"], "name");
}

#[tokio::test]
async fn test_response_validation_off_by_default() {
    let mut app = App::new(quiet());
    app.get("/me", user_response_route(json!({"id": 1}))).unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/me")).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap(), json!({"id": 1}));
}

#[tokio::test]
async fn test_app_level_response_validation() {
    let mut app = App::new(quiet().validate_responses(true));
    app.get("/ok", user_response_route(json!({"id": 1, "name": "Ada"})))
        .unwrap();
    app.get("/bad", user_response_route(json!({"id": "one", "name": "Ada"})))
        .unwrap();

    assert_eq!(app.dispatch(Request::new(HttpMethod::Get, "/ok")).await.status, 200);
    assert_eq!(app.dispatch(Request::new(HttpMethod::Get, "/bad")).await.status, 500);
}

#[tokio::test]
async fn test_strict_route_allows_extra_response_fields() {
    let mut app = App::new(quiet());
    app.get(
        "/me",
        user_response_route(json!({"id": 1, "name": "Ada", "role": "admin"}))
            .strict(true)
            .validate_response(true),
    )
    .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/me")).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap()["role"], "admin");
}

// ============================================================================
// Absent Bodies
// ============================================================================

#[tokio::test]
async fn test_absent_body_uses_schema_fallback() {
    let mut app = App::new(quiet());
    app.post(
        "/optional",
        echo_route().body(user_body_schema().optional()),
    )
    .unwrap();
    app.post(
        "/defaulted",
        echo_route().body(user_body_schema().with_default(json!({"name": "anon", "email": "anon@x.io"}))),
    )
    .unwrap();
    app.post("/required", echo_route().body(user_body_schema()))
        .unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Post, "/optional")).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap()["body"], Value::Null);

    let sent = app.dispatch(Request::new(HttpMethod::Post, "/defaulted")).await;
    assert_eq!(sent.json().unwrap()["body"]["name"], "anon");

    let sent = app.dispatch(Request::new(HttpMethod::Post, "/required")).await;
    assert_eq!(sent.status, 400);
}

// ============================================================================
// Middleware and Registration
// ============================================================================

#[tokio::test]
async fn test_route_middleware_runs_before_validation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut app = App::new(quiet());
    app.post(
        "/users",
        echo_route()
            .body(user_body_schema())
            .middleware(FnMiddleware::new(move |req: &mut Request, _res: &ResponseHandle| {
                seen.fetch_add(1, Ordering::SeqCst);
                if let Some(body) = req.body.as_object_mut() {
                    body.entry("email").or_insert_with(|| json!("default@example.com"));
                }
                Ok(())
            })),
    )
    .unwrap();

    let sent = app.dispatch(post_json("/users", json!({"name": "Ada"}))).await;
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap()["body"]["email"], "default@example.com");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_middleware_error_reported_as_500() {
    let mut app = App::new(quiet());
    app.use_middleware(FnMiddleware::new(|_req: &mut Request, _res: &ResponseHandle| {
        anyhow::bail!("middleware exploded")
    }));
    app.get("/any", echo_route()).unwrap();

    let sent = app.dispatch(Request::new(HttpMethod::Get, "/any")).await;
    assert_eq!(sent.status, 500);
    assert_eq!(sent.json().unwrap()["message"], "middleware exploded");
}

#[tokio::test]
async fn test_duplicate_registration_last_wins() {
    let mut app = App::new(quiet());
    app.get("/v", Route::new(handler(|_ctx| async { json(json!({"v": 1})) })))
        .unwrap();
    app.get("/v", Route::new(handler(|_ctx| async { json(json!({"v": 2})) })))
        .unwrap();

    assert_eq!(app.routes().len(), 2);
    let sent = app.dispatch(Request::new(HttpMethod::Get, "/v")).await;
    assert_eq!(sent.json().unwrap(), json!({"v": 2}));
}

#[tokio::test]
async fn test_apps_are_independent() {
    let mut first = App::new(quiet());
    let second = App::new(quiet());
    first.get("/only-first", echo_route()).unwrap();

    assert_eq!(first.routes().len(), 1);
    assert!(second.routes().is_empty());
    let sent = second
        .dispatch(Request::new(HttpMethod::Get, "/only-first"))
        .await;
    assert_eq!(sent.status, 404);
}
