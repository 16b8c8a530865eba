//! HTTP surface tests: routing, envelopes, and status codes.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use fees_service::ledger::FeeLedger;
use fees_service::services::MemoryLedgerStore;
use fees_service::AppState;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn test_app(enable_payment_delete: bool) -> (Router, MemoryLedgerStore) {
    common::init_tracing();
    let store = MemoryLedgerStore::new();
    let state = AppState {
        engine: FeeLedger::new(Arc::new(store.clone())),
    };
    (fees_service::router(state, enable_payment_delete), store)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_check_works() {
    let (app, _store) = test_app(false);
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_payment_flow_over_http() {
    let (app, _store) = test_app(false);
    let user_id = Uuid::new_v4();

    let (status, body) = send_json(
        &app,
        "POST",
        "/students",
        json!({ "user_id": user_id, "pending_fees": "10000" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let (status, body) = send_json(
        &app,
        "POST",
        "/payments",
        json!({
            "user_id": user_id,
            "amount": "4000",
            "is_gst": true,
            "mode": "cash",
            "status": "completed",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let receipt = body["data"]["receipt_number"].as_str().unwrap();
    assert!(receipt.starts_with('G'), "GST receipt prefix: {receipt}");
    assert!(receipt.ends_with("0001"), "first in partition: {receipt}");
    let payment_id = body["data"]["payment_id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/payments/{payment_id}"),
        json!({ "amount": "5000", "mode": "upi", "status": "completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pending_fees"], "5000");

    let (status, body) = get(&app, &format!("/students/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pending_fees"], "5000");
    assert_eq!(body["data"]["enrolled"], true);

    let (status, body) = get(&app, &format!("/students/{user_id}/payments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn overdraw_is_a_structured_validation_error() {
    let (app, _store) = test_app(false);
    let user_id = Uuid::new_v4();

    send_json(
        &app,
        "POST",
        "/students",
        json!({ "user_id": user_id, "pending_fees": "100" }),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/payments",
        json!({
            "user_id": user_id,
            "amount": "500",
            "is_gst": false,
            "mode": "cash",
            "status": "completed",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("exceeds pending fees"));
}

#[tokio::test]
async fn unknown_student_is_not_found() {
    let (app, _store) = test_app(false);

    let (status, body) = send_json(
        &app,
        "POST",
        "/payments",
        json!({
            "user_id": Uuid::new_v4(),
            "amount": "100",
            "is_gst": true,
            "mode": "cash",
            "status": "completed",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_student_ledger_conflicts() {
    let (app, _store) = test_app(false);
    let user_id = Uuid::new_v4();
    let body = json!({ "user_id": user_id, "pending_fees": "100" });

    let (status, _) = send_json(&app, "POST", "/students", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send_json(&app, "POST", "/students", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_route_is_absent_unless_enabled() {
    let (app, _store) = test_app(false);
    let payment_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/payments/{payment_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn delete_route_reverses_a_payment_when_enabled() {
    let (app, _store) = test_app(true);
    let user_id = Uuid::new_v4();

    send_json(
        &app,
        "POST",
        "/students",
        json!({ "user_id": user_id, "pending_fees": "1000" }),
    )
    .await;

    let (_, body) = send_json(
        &app,
        "POST",
        "/payments",
        json!({
            "user_id": user_id,
            "amount": "400",
            "is_gst": true,
            "mode": "cash",
            "status": "completed",
        }),
    )
    .await;
    let payment_id = body["data"]["payment_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/payments/{payment_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = get(&app, &format!("/students/{user_id}")).await;
    assert_eq!(body["data"]["pending_fees"], "1000");
    assert_eq!(body["data"]["enrolled"], false);
}
