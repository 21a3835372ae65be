//! FCST Core: data model, errors and remote contracts
//!
//! Everything the pipeline stages share: the run identity, the six stage
//! kinds, the resources the remote registry reports, the unified error
//! enum, configuration, and the two remote collaborators (forecast
//! registry, object storage) together with in-process implementations.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod remote;
pub mod sim;
pub mod stage;
pub mod store;

pub use config::{PipelineConfig, PrerequisitePolicy};
pub use context::ExecutionContext;
pub use data_model::{
    CreateRequest, ObjectAcl, ObjectSummary, PutObject, ResourceStatus, ResultRow, RunIdentity,
    SeriesPoint, StageResource, StoragePath,
};
pub use error::{ForecastError, RemoteError, Result};
pub use remote::{ForecastRegistry, ObjectStore};
pub use sim::SimulatedRegistry;
pub use stage::StageKind;
pub use store::{InMemoryObjectStore, LocalObjectStore};

/// Engine version reported by the health endpoint
pub const FCST_VERSION: &str = "1.0.0";
