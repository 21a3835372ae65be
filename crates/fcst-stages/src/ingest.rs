//! Ingestion: the one-shot entry transition of a run
//!
//! stage series → create dataset group → create dataset → associate.
//!
//! There is no rollback. If a later step fails, whatever was already
//! created stays behind and has to be removed by an operator; the error
//! names the step so the orphaned resources can be found.
use crate::identity::IdentityDeriver;
use crate::stager::DataStager;
use chrono::{DateTime, Utc};
use fcst_core::{ForecastError, ForecastRegistry, PipelineConfig, RunIdentity, StageKind};
use std::sync::Arc;

pub struct Ingestor {
    registry: Arc<dyn ForecastRegistry>,
    stager: DataStager,
    deriver: IdentityDeriver,
    config: Arc<PipelineConfig>,
}

impl Ingestor {
    pub fn new(
        registry: Arc<dyn ForecastRegistry>,
        stager: DataStager,
        deriver: IdentityDeriver,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            registry,
            stager,
            deriver,
            config,
        }
    }

    /// Starts a run for `values` and returns its identity.
    pub async fn ingest(&self, values: &[f64]) -> Result<RunIdentity, ForecastError> {
        self.ingest_at(values, Utc::now()).await
    }

    pub async fn ingest_at(
        &self,
        values: &[f64],
        at: DateTime<Utc>,
    ) -> Result<RunIdentity, ForecastError> {
        self.stager.validate(values)?;
        let run = self.deriver.generate_at(at);
        let name = self.deriver.resource_name(&run)?;

        self.stager.stage(&name, values).await?;

        let group_id = self.create(StageKind::DatasetGroup, &name).await?;
        let dataset_id = self.create(StageKind::Dataset, &name).await?;

        self.registry
            .update_dataset_group(&group_id, std::slice::from_ref(&dataset_id))
            .await
            .map_err(|e| {
                tracing::warn!(
                    %name,
                    %group_id,
                    %dataset_id,
                    error = %e,
                    "dataset association failed, dataset group and dataset left orphaned"
                );
                ForecastError::Remote(e)
            })?;

        tracing::info!(%run, %name, points = values.len(), "run ingested");
        Ok(run)
    }

    async fn create(&self, stage: StageKind, name: &str) -> Result<String, ForecastError> {
        let request = self.config.creation_request(stage, name, "");
        let id = self.registry.create(request).await.map_err(|e| {
            tracing::warn!(%stage, %name, error = %e, "ingestion create failed");
            ForecastError::Remote(e)
        })?;
        tracing::info!(%stage, %name, %id, "created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fcst_core::{InMemoryObjectStore, SimulatedRegistry};

    struct Harness {
        registry: Arc<SimulatedRegistry>,
        store: Arc<InMemoryObjectStore>,
        ingestor: Ingestor,
    }

    fn harness() -> Harness {
        let registry = Arc::new(SimulatedRegistry::new("local"));
        let store = Arc::new(InMemoryObjectStore::new());
        let config = Arc::new(PipelineConfig::default());
        let ingestor = Ingestor::new(
            registry.clone(),
            DataStager::new(store.clone(), config.clone()),
            IdentityDeriver::from_config(&config),
            config,
        );
        Harness {
            registry,
            store,
            ingestor,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_creates_associated_pair() {
        let h = harness();
        let values: Vec<f64> = (0..30).map(f64::from).collect();

        let run = h.ingestor.ingest_at(&values, at()).await.unwrap();
        assert_eq!(run.as_str(), "20210601120000000");

        let name = "id20210601120000000";
        assert!(h.store.object("your-bucket", &format!("csv/{name}.csv")).is_some());
        assert_eq!(h.registry.create_count(StageKind::DatasetGroup), 1);
        assert_eq!(h.registry.create_count(StageKind::Dataset), 1);
        assert_eq!(h.registry.dataset_group_members(name).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_size_touches_nothing() {
        let h = harness();
        let err = h.ingestor.ingest_at(&[1.0; 12], at()).await.unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInputSize { len: 12, .. }));
        assert_eq!(h.store.put_count(), 0);
        assert_eq!(h.registry.total_creates(), 0);
    }

    #[tokio::test]
    async fn test_failed_dataset_creation_leaves_group() {
        let h = harness();
        h.registry.fail_creation(StageKind::Dataset, true);

        let err = h.ingestor.ingest_at(&[2.5; 30], at()).await.unwrap_err();
        assert!(matches!(err, ForecastError::Remote(_)));
        assert_eq!(h.registry.create_count(StageKind::DatasetGroup), 1);
        assert_eq!(h.registry.create_count(StageKind::Dataset), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_stops_before_registry() {
        let h = harness();
        h.store.fail_puts(true);
        let err = h.ingestor.ingest_at(&[2.5; 30], at()).await.unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert_eq!(h.registry.total_creates(), 0);
    }
}
