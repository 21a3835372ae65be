//! FCST API: one HTTP endpoint per deployment, one pipeline action per request
//!
//! ```text
//! POST /             {"action": "...", ...}  →  {"message": "..."}
//! POST /v1/forecast  same as POST /
//! GET  /v1/health
//! GET  /metrics
//! ```
pub mod handlers;
pub mod metrics;
pub mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use fcst_stages::Orchestrator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::forecast))
        .route("/v1/forecast", post(handlers::forecast))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: &str, orchestrator: Orchestrator) -> std::io::Result<()> {
    let app = create_app(AppState::new(orchestrator));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("FCST API listening on {}", addr);
    axum::serve(listener, app).await
}
