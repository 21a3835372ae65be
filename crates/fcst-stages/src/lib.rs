//! FCST Stages: the check-or-advance engine for a managed forecast pipeline.
//!
//! A run is identified only by its [`RunIdentity`]. Nothing is stored
//! locally: every call rebuilds the run's position from the remote
//! registry listings and performs at most one transition.
//!
//! # Pipeline Flow
//!
//! ```text
//! senddata ─→ stage CSV → DatasetGroup → Dataset → associate
//!                                                      ↓
//! checkimport → checkpredictor → checkforecast → checkexport → getresult
//!   Import        Predictor        Forecast        Export       p50 values
//! ```
//!
//! [`RunIdentity`]: fcst_core::RunIdentity

mod advancer;
mod extractor;
mod identity;
mod ingest;
mod locator;
mod locks;
mod orchestrator;
mod stager;

pub use advancer::{Advance, StageAdvancer, STARTED_TOKEN, WAITING_TOKEN};
pub use extractor::{parse_rows, render_values, ResultExtractor, PARTITION_SUFFIX};
pub use identity::IdentityDeriver;
pub use ingest::Ingestor;
pub use locator::ResourceLocator;
pub use locks::RunLocks;
pub use orchestrator::{Action, Orchestrator, RunProgress, SeriesPayload, StageSnapshot};
pub use stager::{date_points, render_csv, DataStager, CSV_CONTENT_TYPE};

// ============================================================================
// CONVENIENCE BUILDERS
// ============================================================================

use fcst_core::{InMemoryObjectStore, ObjectStore, PipelineConfig, SimulatedRegistry};
use std::sync::Arc;

/// Orchestrator over a simulated registry that publishes export results
/// into `store`. Used for local runs and tests.
pub fn simulated_orchestrator(store: Arc<dyn ObjectStore>, config: PipelineConfig) -> Orchestrator {
    let registry = SimulatedRegistry::new(config.region.clone()).with_store(store.clone());
    Orchestrator::new(Arc::new(registry), store, config)
}

/// Fully in-memory orchestrator with default configuration.
pub fn in_memory_orchestrator() -> Orchestrator {
    simulated_orchestrator(Arc::new(InMemoryObjectStore::new()), PipelineConfig::default())
}
