//! HTTP surface tests.
//!
//! These tests drive the router in-process with `tower::ServiceExt::oneshot`
//! and check status codes and JSON bodies.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use abacus::orchestration::Orchestrator;
use abacus::server::build_router;

use crate::fixtures::instant_orchestrator;

fn app() -> (Router, Arc<Orchestrator>) {
    let orchestrator = Arc::new(instant_orchestrator());
    (build_router(Arc::clone(&orchestrator)), orchestrator)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Test: Calculate and inspect
/// Given a valid expression
/// When it is posted to /api/v1/calculate
/// Then it is created and listed as pending
#[tokio::test]
async fn test_calculate_then_get() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({ "expression": "2+2*2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "id": 1 }));

    let (status, body) = send(&app, Method::GET, "/api/v1/expressions/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "expression": { "id": 1, "expression": "2+2*2", "status": "pending" } })
    );

    let (status, body) = send(&app, Method::GET, "/api/v1/expressions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expressions"].as_array().unwrap().len(), 1);
}

/// Test: Invalid expressions
/// Given malformed input or a malformed body
/// When it is posted
/// Then the server answers 422 with an error message
#[tokio::test]
async fn test_calculate_rejects_invalid_input() {
    let (app, orchestrator) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({ "expression": "2+(" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Invalid expression"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({ "formula": "1+1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    assert!(orchestrator.list_expressions().unwrap().is_empty());
}

/// Test: Empty listing
/// Given no expressions
/// When the list is requested
/// Then an empty array is returned
#[tokio::test]
async fn test_list_empty() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/expressions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "expressions": [] }));
}

/// Test: Unknown expression
#[tokio::test]
async fn test_get_unknown_expression() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/expressions/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

/// Test: Worker round trip
/// Given a submitted expression
/// When a worker fetches each task and posts its result over HTTP
/// Then the expression completes with the right value
#[tokio::test]
async fn test_task_round_trip() {
    let (app, _) = app();
    send(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({ "expression": "(2+2)*2" })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::OK);
    let task = &body["task"];
    assert_eq!(task["operation"], "+");
    assert_eq!(task["arg1"], 2.0);
    assert_eq!(task["arg2"], 2.0);
    assert_eq!(task["operation_time"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({ "id": task["id"], "result": 4.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "result accepted" }));

    let (_, body) = send(&app, Method::GET, "/internal/task", None).await;
    let task = &body["task"];
    assert_eq!(task["operation"], "*");
    assert_eq!(task["arg1"], 4.0);
    send(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({ "id": task["id"], "result": 8.0 })),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/v1/expressions/1", None).await;
    assert_eq!(body["expression"]["status"], "completed");
    assert_eq!(body["expression"]["result"], 8.0);
}

/// Test: No work
/// Given an empty queue
/// When a worker fetches a task
/// Then the server answers 404
#[tokio::test]
async fn test_get_task_when_empty() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

/// Test: Stray results
/// Given an id the orchestrator never issued
/// When a result is posted for it
/// Then the server answers 404
#[tokio::test]
async fn test_post_unknown_task() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({ "id": "6f1c1d1e-7d4b-4a36-9a6b-2f5c8d1e0a11", "result": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/internal/task",
        Some(json!({ "id": "not-a-uuid", "result": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

/// Test: Stats
#[tokio::test]
async fn test_stats_counts() {
    let (app, _) = app();
    for expression in ["1+1", "2*3", "7"] {
        send(
            &app,
            Method::POST,
            "/api/v1/calculate",
            Some(json!({ "expression": expression })),
        )
        .await;
    }
    send(&app, Method::GET, "/internal/task", None).await;

    let (status, body) = send(&app, Method::GET, "/internal/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "pending": 1,
            "in_progress": 1,
            "completed": 1,
            "queued_tasks": 1,
            "in_flight_tasks": 1,
        })
    );
}

/// Test: Malformed path id
/// Given a non-numeric expression id
/// When it is requested
/// Then the server answers 400 with a JSON error
#[tokio::test]
async fn test_get_expression_bad_id() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/expressions/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("abc"));
}

/// Test: Unknown route
/// Given a path no route serves
/// When it is requested
/// Then the server answers 404 with a JSON error
#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v2/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not Found" }));
}

/// Test: Wrong method
/// Given a known path
/// When it is called with a method it does not serve
/// Then the server answers 405 with a JSON error
#[tokio::test]
async fn test_wrong_method() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/calculate", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method Not Allowed" }));

    let (status, body) = send(&app, Method::DELETE, "/internal/task", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body["error"].is_string());
}

/// Test: Out of range literal
/// Given a number too large for a double
/// When it is submitted
/// Then it is rejected up front and no task reaches a worker
#[tokio::test]
async fn test_calculate_rejects_out_of_range_number() {
    let (app, orchestrator) = app();
    let expression = format!("1{}+1", "0".repeat(400));
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/calculate",
        Some(json!({ "expression": expression })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (status, _) = send(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(orchestrator.list_expressions().unwrap().is_empty());
}
