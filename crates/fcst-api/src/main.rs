//! Binary entrypoint for the FCST API server.
use anyhow::Context;
use fcst_core::{InMemoryObjectStore, LocalObjectStore, ObjectStore, PipelineConfig};
use fcst_stages::simulated_orchestrator;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PipelineConfig::from_env().context("reading FCST_* configuration")?;
    let store: Arc<dyn ObjectStore> = match std::env::var("FCST_STORE_DIR") {
        Ok(dir) => {
            tracing::info!(%dir, "using directory object store");
            Arc::new(LocalObjectStore::new(dir))
        }
        Err(_) => {
            tracing::info!("using in-memory object store");
            Arc::new(InMemoryObjectStore::new())
        }
    };
    tracing::info!(
        region = %config.region,
        bucket = %config.bucket,
        policy = ?config.prerequisite_policy,
        "pipeline configured against simulated registry"
    );

    // Default listen address can be overridden with FCST_ADDR
    let addr = std::env::var("FCST_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    fcst_api::run(&addr, simulated_orchestrator(store, config))
        .await
        .with_context(|| format!("serving on {addr}"))
}
