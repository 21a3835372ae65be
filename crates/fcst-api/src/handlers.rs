//! API Handlers
use crate::metrics::{
    self, OUTCOME_FAILED, OUTCOME_INVALID, OUTCOME_OK, OUTCOME_REJECTED, OUTCOME_RETRYABLE,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fcst_core::FCST_VERSION;
use fcst_stages::Action;
use serde_json::{json, Value};

fn envelope(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "message": message.into() }))
}

/// Runs one pipeline action. 200 carries the action's message; any failure,
/// including an envelope that cannot be decoded, is a 500 with the error
/// as the message.
pub async fn forecast(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let action: Action = match serde_json::from_slice(&body) {
        Ok(action) => action,
        Err(e) => {
            tracing::info!(error = %e, "rejected undecodable envelope");
            metrics::record("unknown", OUTCOME_REJECTED);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(format!("REQUEST/DECODE: {e}")),
            );
        }
    };

    let name = action.name();
    match state.orchestrator.dispatch(action).await {
        Ok(message) => {
            metrics::record(name, OUTCOME_OK);
            (StatusCode::OK, envelope(message))
        }
        Err(e) => {
            let outcome = if e.is_retryable() {
                OUTCOME_RETRYABLE
            } else if e.is_input_error() {
                OUTCOME_INVALID
            } else {
                OUTCOME_FAILED
            };
            metrics::record(name, outcome);
            (StatusCode::INTERNAL_SERVER_ERROR, envelope(e.to_string()))
        }
    }
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": FCST_VERSION })),
    )
}

pub async fn metrics() -> Response {
    match metrics::encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
