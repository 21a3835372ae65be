//! Stage Advancer: check-or-advance for the four pollable stages
//!
//! ```text
//! DatasetGroup → Dataset → Import → Predictor → Forecast → Export
//!   (created at ingestion)   └──────── polled via check* ────────┘
//! ```
//!
//! Each call performs at most one transition. If the stage's resource
//! exists its status is reported; otherwise the preceding stage is checked
//! and the resource is requested. Repeated calls walk the run forward.
use crate::identity::IdentityDeriver;
use crate::locator::ResourceLocator;
use crate::locks::RunLocks;
use fcst_core::{
    ForecastError, ForecastRegistry, PipelineConfig, PrerequisitePolicy, ResourceStatus,
    RunIdentity, StageKind, StageResource,
};
use std::fmt;
use std::sync::Arc;

/// Status token returned when a call has just requested creation.
pub const STARTED_TOKEN: &str = "Start";

/// Leading token of the message returned while a prerequisite settles.
pub const WAITING_TOKEN: &str = "Waiting";

/// Outcome of one advancer call.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The resource did not exist and creation was requested.
    Started { id: String },
    /// The resource exists; its live state is attached.
    Observed(StageResource),
    /// Nothing was created because the prerequisite is not active yet.
    Waiting {
        prerequisite: StageKind,
        status: ResourceStatus,
    },
}

impl Advance {
    /// The message handed back to the caller: `"Start"`, the registry's
    /// status token verbatim, or `"Waiting: <prerequisite> <status>"`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Advance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { .. } => f.write_str(STARTED_TOKEN),
            Self::Observed(resource) => write!(f, "{}", resource.status),
            Self::Waiting {
                prerequisite,
                status,
            } => write!(f, "{WAITING_TOKEN}: {prerequisite} {status}"),
        }
    }
}

/// A located prerequisite after the policy has been applied.
enum Gate {
    Usable(StageResource),
    Pending(StageResource),
}

pub struct StageAdvancer {
    registry: Arc<dyn ForecastRegistry>,
    locator: ResourceLocator,
    deriver: IdentityDeriver,
    config: Arc<PipelineConfig>,
    locks: RunLocks,
}

impl StageAdvancer {
    pub fn new(registry: Arc<dyn ForecastRegistry>, config: Arc<PipelineConfig>) -> Self {
        Self {
            locator: ResourceLocator::new(registry.clone()),
            deriver: IdentityDeriver::from_config(&config),
            registry,
            config,
            locks: RunLocks::new(),
        }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Reports or advances `stage` for `run`.
    pub async fn advance(
        &self,
        run: &RunIdentity,
        stage: StageKind,
    ) -> Result<Advance, ForecastError> {
        let (Some(gate), Some(source)) = (stage.prerequisite(), stage.creation_source()) else {
            return Err(not_pollable(stage));
        };
        if !stage.is_pollable() {
            return Err(not_pollable(stage));
        }

        let name = self.deriver.resource_name(run)?;
        let _guard = self.locks.acquire(run).await;

        if let Some(existing) = self.locator.locate(stage, &name).await? {
            tracing::debug!(%stage, %name, status = %existing.status, "stage already requested");
            return Ok(Advance::Observed(existing));
        }

        let gate_resource = match self.require(stage, gate, &name).await? {
            Gate::Usable(resource) => resource,
            Gate::Pending(resource) => return Ok(waiting(gate, resource)),
        };
        let source_resource = if source == gate {
            gate_resource
        } else {
            match self.require(stage, source, &name).await? {
                Gate::Usable(resource) => resource,
                Gate::Pending(resource) => return Ok(waiting(source, resource)),
            }
        };
        let source_id = source_resource
            .usable_id()
            .ok_or(ForecastError::PrerequisiteMissing {
                stage,
                prerequisite: source,
            })?;

        let request = self.config.creation_request(stage, &name, source_id);
        let id = self.registry.create(request).await.map_err(|e| {
            tracing::warn!(%stage, %name, error = %e, "create call failed");
            ForecastError::Remote(e)
        })?;

        tracing::info!(%stage, %name, %id, "stage started");
        Ok(Advance::Started { id })
    }

    /// Looks up the resource `stage` depends on and applies the configured
    /// prerequisite policy to it. A failed prerequisite is an error under
    /// either policy.
    async fn require(
        &self,
        stage: StageKind,
        prerequisite: StageKind,
        name: &str,
    ) -> Result<Gate, ForecastError> {
        let resource = self
            .locator
            .locate(prerequisite, name)
            .await?
            .filter(|r| r.usable_id().is_some())
            .ok_or_else(|| {
                tracing::info!(%stage, %prerequisite, %name, "prerequisite missing");
                ForecastError::PrerequisiteMissing { stage, prerequisite }
            })?;

        if resource.status.is_failed() {
            tracing::warn!(%stage, %prerequisite, status = %resource.status, "prerequisite failed");
            return Err(ForecastError::PrerequisiteFailed {
                stage,
                prerequisite,
                status: resource.status.to_string(),
            });
        }
        if self.config.prerequisite_policy == PrerequisitePolicy::Ready
            && !resource.status.is_ready()
        {
            tracing::info!(%stage, %prerequisite, status = %resource.status, "prerequisite not ready");
            return Ok(Gate::Pending(resource));
        }
        Ok(Gate::Usable(resource))
    }
}

fn waiting(prerequisite: StageKind, resource: StageResource) -> Advance {
    Advance::Waiting {
        prerequisite,
        status: resource.status,
    }
}

fn not_pollable(stage: StageKind) -> ForecastError {
    ForecastError::InvalidRequest(format!(
        "{stage} is created at ingestion and cannot be advanced by polling"
    ))
}
