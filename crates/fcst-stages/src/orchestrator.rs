//! Orchestrator: one action per external invocation
use crate::advancer::{Advance, StageAdvancer};
use crate::extractor::ResultExtractor;
use crate::identity::IdentityDeriver;
use crate::ingest::Ingestor;
use crate::stager::DataStager;
use fcst_core::{
    ExecutionContext, ForecastError, ForecastRegistry, ObjectStore, PipelineConfig, RunIdentity,
    StageKind, StageResource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Series as sent by callers: a JSON array, or a string holding one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesPayload {
    Values(Vec<f64>),
    Encoded(String),
}

impl SeriesPayload {
    pub fn into_values(self) -> Result<Vec<f64>, ForecastError> {
        match self {
            Self::Values(values) => Ok(values),
            Self::Encoded(raw) => serde_json::from_str(&raw).map_err(|e| {
                ForecastError::InvalidRequest(format!("data is not a JSON array of numbers: {e}"))
            }),
        }
    }
}

/// A decoded request. Each variant carries only what its action needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    SendData { data: SeriesPayload },
    CheckImport { id: RunIdentity },
    CheckPredictor { id: RunIdentity },
    CheckForecast { id: RunIdentity },
    CheckExport { id: RunIdentity },
    GetResult { id: RunIdentity },
    Status { id: RunIdentity },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendData { .. } => "senddata",
            Self::CheckImport { .. } => "checkimport",
            Self::CheckPredictor { .. } => "checkpredictor",
            Self::CheckForecast { .. } => "checkforecast",
            Self::CheckExport { .. } => "checkexport",
            Self::GetResult { .. } => "getresult",
            Self::Status { .. } => "status",
        }
    }

    pub fn run(&self) -> Option<&RunIdentity> {
        match self {
            Self::SendData { .. } => None,
            Self::CheckImport { id }
            | Self::CheckPredictor { id }
            | Self::CheckForecast { id }
            | Self::CheckExport { id }
            | Self::GetResult { id }
            | Self::Status { id } => Some(id),
        }
    }
}

/// Where one stage of a run currently stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub stage: StageKind,
    pub resource: Option<StageResource>,
}

/// Read-only view of all six stages of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub run: RunIdentity,
    pub stages: Vec<StageSnapshot>,
}

impl RunProgress {
    /// Latest stage whose resource exists.
    pub fn reached(&self) -> Option<StageKind> {
        self.stages
            .iter()
            .rev()
            .find(|s| s.resource.is_some())
            .map(|s| s.stage)
    }

    /// One line per stage: `dataset group=ACTIVE`, `forecast=-`.
    pub fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|s| {
                let status = s
                    .resource
                    .as_ref()
                    .map(|r| r.status.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!("{}={}", s.stage, status)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Wires the components together around injected remote handles.
pub struct Orchestrator {
    deriver: IdentityDeriver,
    advancer: Arc<StageAdvancer>,
    ingestor: Ingestor,
    extractor: ResultExtractor,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn ForecastRegistry>,
        store: Arc<dyn ObjectStore>,
        config: PipelineConfig,
    ) -> Self {
        let config = Arc::new(config);
        let deriver = IdentityDeriver::from_config(&config);
        let advancer = Arc::new(StageAdvancer::new(registry.clone(), config.clone()));
        let stager = DataStager::new(store.clone(), config.clone());
        let ingestor = Ingestor::new(registry, stager, deriver.clone(), config.clone());
        let extractor = ResultExtractor::new(store, config);

        Self {
            deriver,
            advancer,
            ingestor,
            extractor,
        }
    }

    /// Runs one action and returns the caller-facing message.
    pub async fn dispatch(&self, action: Action) -> Result<String, ForecastError> {
        let mut ctx = ExecutionContext::new(action.name());
        if let Some(run) = action.run() {
            ctx = ctx.with_run(run.clone());
        }
        let span = tracing::info_span!(
            "action",
            action = ctx.action,
            trace_id = %ctx.trace_id,
            run = ctx.run.as_ref().map(|r| r.as_str()).unwrap_or("-"),
        );

        let result = self.execute(action).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(message) => {
                tracing::info!(elapsed_ms = ctx.elapsed_ms(), %message, "action completed")
            }
            Err(e) => tracing::warn!(
                elapsed_ms = ctx.elapsed_ms(),
                retryable = e.is_retryable(),
                error = %e,
                "action failed"
            ),
        });
        result
    }

    async fn execute(&self, action: Action) -> Result<String, ForecastError> {
        match action {
            Action::SendData { data } => {
                let values = data.into_values()?;
                self.ingestor.ingest(&values).await.map(|run| run.to_string())
            }
            Action::CheckImport { id } => self.check(&id, StageKind::Import).await,
            Action::CheckPredictor { id } => self.check(&id, StageKind::Predictor).await,
            Action::CheckForecast { id } => self.check(&id, StageKind::Forecast).await,
            Action::CheckExport { id } => self.check(&id, StageKind::Export).await,
            Action::GetResult { id } => self.result(&id).await,
            Action::Status { id } => self.progress(&id).await.map(|p| p.summary()),
        }
    }

    pub async fn check(&self, run: &RunIdentity, stage: StageKind) -> Result<String, ForecastError> {
        self.advancer.advance(run, stage).await.map(|a: Advance| a.message())
    }

    pub async fn result(&self, run: &RunIdentity) -> Result<String, ForecastError> {
        self.extractor.fetch(&self.deriver.resource_name(run)?).await
    }

    /// Looks up every stage of `run` without creating anything.
    pub async fn progress(&self, run: &RunIdentity) -> Result<RunProgress, ForecastError> {
        let name = self.deriver.resource_name(run)?;
        let mut stages = Vec::with_capacity(StageKind::ALL.len());
        for stage in StageKind::ALL {
            let resource = self.advancer.locator().locate(stage, &name).await?;
            stages.push(StageSnapshot { stage, resource });
        }
        Ok(RunProgress {
            run: run.clone(),
            stages,
        })
    }
}
