use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fcst_api::{create_app, AppState};
use fcst_stages::in_memory_orchestrator;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    create_app(AppState::new(in_memory_orchestrator()))
}

async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn series(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64).sin() + 5.0).collect()
}

fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap()
}

#[tokio::test]
async fn test_send_data_returns_run_identity() {
    let app = app();
    let (status, body) = post(
        &app,
        "/",
        json!({ "action": "senddata", "data": series(30) }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let id = message(&body);
    assert_eq!(id.len(), 17);
    assert!(id.bytes().all(|b| b.is_ascii_digit()));
}

#[tokio::test]
async fn test_send_data_out_of_range_is_500() {
    let app = app();
    let (status, body) = post(
        &app,
        "/v1/forecast",
        json!({ "action": "senddata", "data": series(12) }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(message(&body).starts_with("INPUT/SIZE"));
}

#[tokio::test]
async fn test_undecodable_envelope_is_500() {
    let app = app();
    for body in [
        "not json".to_string(),
        json!({ "action": "dropeverything" }).to_string(),
        json!({ "action": "checkimport", "id": "a/b" }).to_string(),
    ] {
        let (status, reply) = post(&app, "/", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message(&reply).starts_with("REQUEST/DECODE"));
    }
}

#[tokio::test]
async fn test_check_right_after_send_data_is_200() {
    let app = app();
    let (_, body) = post(
        &app,
        "/",
        json!({ "action": "senddata", "data": series(30) }).to_string(),
    )
    .await;
    let id = message(&body).to_string();

    let (status, reply) =
        post(&app, "/", json!({ "action": "checkimport", "id": id }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&reply), "Waiting: dataset CREATE_IN_PROGRESS");
}

#[tokio::test]
async fn test_check_unknown_run_is_500() {
    let app = app();
    let (status, body) = post(
        &app,
        "/",
        json!({ "action": "checkimport", "id": "20200101000000000" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(message(&body).starts_with("STAGE/PREREQUISITE"));
}

#[tokio::test]
async fn test_polling_over_http_reaches_result() {
    let app = app();
    let (_, body) = post(
        &app,
        "/",
        json!({ "action": "senddata", "data": series(60) }).to_string(),
    )
    .await;
    let id = message(&body).to_string();

    for action in ["checkimport", "checkpredictor", "checkforecast", "checkexport"] {
        let mut last = String::new();
        for _ in 0..10 {
            let (status, reply) =
                post(&app, "/", json!({ "action": action, "id": id }).to_string()).await;
            last = message(&reply).to_string();
            if status == StatusCode::OK && last == "ACTIVE" {
                break;
            }
        }
        assert_eq!(last, "ACTIVE", "{action} never settled");
    }

    let (status, reply) = post(
        &app,
        "/",
        json!({ "action": "getresult", "id": id }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<f64> = serde_json::from_str(message(&reply)).unwrap();
    assert_eq!(values.len(), 10);
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(&app(), "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], fcst_core::FCST_VERSION);
}

#[tokio::test]
async fn test_metrics_count_actions() {
    let app = app();
    post(
        &app,
        "/",
        json!({ "action": "senddata", "data": series(40) }).to_string(),
    )
    .await;

    let (status, text) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("fcst_actions_total"));
    assert!(text.contains(r#"action="senddata""#));
}
