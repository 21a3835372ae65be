//! Simulated forecast registry
//!
//! Behaves like the hosted registry closely enough to drive a whole run in
//! process: resources are created `CREATE_PENDING` and move one lifecycle
//! step each time their kind is listed, names are unique per kind, and an
//! export job that turns `ACTIVE` writes a result partition to the attached
//! object store.
use crate::data_model::{
    CreateRequest, ResourceStatus, ResultRow, SeriesPoint, StageResource, StoragePath,
};
use crate::error::RemoteError;
use crate::config::PipelineConfig;
use crate::remote::{ForecastRegistry, ObjectStore};
use crate::stage::StageKind;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Standard normal z-score of the 90th percentile. p10 and p90 sit this
/// many deviations below and above p50.
const Z_P90: f64 = 1.2816;

#[derive(Debug, Clone)]
struct Entry {
    resource: StageResource,
    request: CreateRequest,
    dataset_ids: Vec<String>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<StageKind, Vec<Entry>>,
    creates: HashMap<StageKind, usize>,
    failing_lists: HashSet<StageKind>,
    failing_creates: HashSet<StageKind>,
    doomed: HashSet<StageKind>,
    frozen: bool,
}

pub struct SimulatedRegistry {
    region: String,
    inner: Mutex<Inner>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl SimulatedRegistry {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            inner: Mutex::new(Inner::default()),
            store: None,
        }
    }

    /// Attaches the object store export jobs write their partitions to.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Number of create calls accepted for `kind`.
    pub fn create_count(&self, kind: StageKind) -> usize {
        self.lock()
            .map(|inner| inner.creates.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_creates(&self) -> usize {
        self.lock()
            .map(|inner| inner.creates.values().sum())
            .unwrap_or(0)
    }

    /// Makes listings of `kind` fail until reset.
    pub fn fail_listing(&self, kind: StageKind, fail: bool) {
        if let Ok(mut inner) = self.lock() {
            toggle(&mut inner.failing_lists, kind, fail);
        }
    }

    /// Makes create calls for `kind` fail until reset.
    pub fn fail_creation(&self, kind: StageKind, fail: bool) {
        if let Ok(mut inner) = self.lock() {
            toggle(&mut inner.failing_creates, kind, fail);
        }
    }

    /// Resources of `kind` created from now on end in `CREATE_FAILED`.
    pub fn doom(&self, kind: StageKind) {
        if let Ok(mut inner) = self.lock() {
            inner.doomed.insert(kind);
        }
    }

    /// Stops lifecycle progression on listing.
    pub fn freeze(&self, frozen: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.frozen = frozen;
        }
    }

    /// Inserts a resource directly, as if created out of band.
    pub fn seed(&self, kind: StageKind, name: &str, status: ResourceStatus) -> String {
        let id = self.arn(kind, name);
        self.seed_with_id(kind, name, &id, status);
        id
    }

    /// Like [`seed`](Self::seed) with a caller chosen identifier, which may
    /// be blank the way a registry reports a resource it has not yet
    /// assigned an ARN to.
    pub fn seed_with_id(&self, kind: StageKind, name: &str, id: &str, status: ResourceStatus) {
        let request = PipelineConfig::default().creation_request(kind, name, "");
        if let Ok(mut inner) = self.lock() {
            inner.entries.entry(kind).or_default().push(Entry {
                resource: StageResource {
                    kind,
                    id: id.to_string(),
                    name: name.to_string(),
                    status,
                    created_at: Some(Utc::now()),
                },
                request,
                dataset_ids: Vec::new(),
            });
        }
    }

    /// Overrides the status of an existing resource.
    pub fn set_status(&self, kind: StageKind, name: &str, status: ResourceStatus) -> bool {
        let Ok(mut inner) = self.lock() else {
            return false;
        };
        match inner
            .entries
            .get_mut(&kind)
            .and_then(|list| list.iter_mut().find(|e| e.resource.name == name))
        {
            Some(entry) => {
                entry.resource.status = status;
                true
            }
            None => false,
        }
    }

    /// Datasets currently associated with a dataset group.
    pub fn dataset_group_members(&self, name: &str) -> Vec<String> {
        self.lock()
            .ok()
            .and_then(|inner| {
                inner
                    .entries
                    .get(&StageKind::DatasetGroup)
                    .and_then(|list| list.iter().find(|e| e.resource.name == name))
                    .map(|e| e.dataset_ids.clone())
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RemoteError> {
        self.inner
            .lock()
            .map_err(|_| RemoteError::registry("Lock", "registry state poisoned"))
    }

    fn arn(&self, kind: StageKind, name: &str) -> String {
        let path = match kind {
            StageKind::DatasetGroup => "dataset-group",
            StageKind::Dataset => "dataset",
            StageKind::Import => "dataset-import-job",
            StageKind::Predictor => "predictor",
            StageKind::Forecast => "forecast",
            StageKind::Export => "forecast-export-job",
        };
        format!("arn:aws:forecast:{}:000000000000:{}/{}", self.region, path, name)
    }

    /// Writes the result partition for a freshly activated export job.
    async fn publish_export(&self, export: CreateRequest, source: Option<StoragePath>, horizon: u32) {
        let (Some(store), CreateRequest::Export { name, destination, .. }) = (&self.store, export)
        else {
            return;
        };
        let Some(source) = source else {
            tracing::warn!(%name, "simulated export has no import source, skipping partition");
            return;
        };

        let staged = match store.get(&source.bucket, &source.key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%name, error = %e, "simulated export could not read staged input");
                return;
            }
        };
        let body = match render_partition(&staged, horizon) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%name, error = %e, "simulated export could not render partition");
                return;
            }
        };

        let key = format!(
            "{}/{}_{}_part0.csv",
            destination.key.trim_end_matches('/'),
            name,
            Utc::now().format("%Y-%m-%dT%H-%M-%SZ")
        );
        let object = crate::data_model::PutObject {
            path: StoragePath::new(destination.bucket, key),
            body,
            content_type: "text/csv".to_string(),
            acl: crate::data_model::ObjectAcl::Private,
        };
        if let Err(e) = store.put(object).await {
            tracing::warn!(%name, error = %e, "simulated export could not write partition");
        }
    }
}

fn toggle(set: &mut HashSet<StageKind>, kind: StageKind, on: bool) {
    if on {
        set.insert(kind);
    } else {
        set.remove(&kind);
    }
}

/// Mean of the last week as p50, spread by the sample deviation of the
/// whole series.
fn render_partition(staged: &[u8], horizon: u32) -> Result<Vec<u8>, String> {
    let mut reader = csv::Reader::from_reader(staged);
    let mut points = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let point = SeriesPoint::parse(
            record.get(1).unwrap_or_default(),
            record.get(2).unwrap_or_default(),
        )
        .ok_or_else(|| format!("unreadable staged row {:?}", record))?;
        points.push(point);
    }
    let Some(last) = points.last().copied() else {
        return Err("staged input is empty".to_string());
    };

    let window = &points[points.len().saturating_sub(7)..];
    let p50 = window.iter().map(|p| p.value).sum::<f64>() / window.len() as f64;
    let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
    let variance = points.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>()
        / points.len().max(2).saturating_sub(1) as f64;
    let spread = Z_P90 * variance.sqrt();

    let mut writer = csv::Writer::from_writer(Vec::new());
    for step in 1..=i64::from(horizon) {
        let date = last.date + Duration::days(step);
        writer
            .serialize(ResultRow {
                item_id: crate::data_model::SERIES_ITEM_ID.to_string(),
                date: format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
                p10: p50 - spread,
                p50,
                p90: p50 + spread,
            })
            .map_err(|e| e.to_string())?;
    }
    writer.into_inner().map_err(|e| e.to_string())
}

fn next_status(current: &ResourceStatus, doomed: bool) -> ResourceStatus {
    match current {
        ResourceStatus::CreatePending => ResourceStatus::CreateInProgress,
        ResourceStatus::CreateInProgress if doomed => ResourceStatus::CreateFailed,
        ResourceStatus::CreateInProgress => ResourceStatus::Active,
        ResourceStatus::UpdatePending => ResourceStatus::UpdateInProgress,
        ResourceStatus::UpdateInProgress => ResourceStatus::Active,
        other => other.clone(),
    }
}

fn referenced_id(request: &CreateRequest) -> Option<(StageKind, &str)> {
    match request {
        CreateRequest::DatasetGroup { .. } | CreateRequest::Dataset { .. } => None,
        CreateRequest::Import { dataset_id, .. } => Some((StageKind::Dataset, dataset_id)),
        CreateRequest::Predictor { dataset_group_id, .. } => {
            Some((StageKind::DatasetGroup, dataset_group_id))
        }
        CreateRequest::Forecast { predictor_id, .. } => Some((StageKind::Predictor, predictor_id)),
        CreateRequest::Export { forecast_id, .. } => Some((StageKind::Forecast, forecast_id)),
    }
}

#[async_trait]
impl ForecastRegistry for SimulatedRegistry {
    async fn list(&self, kind: StageKind) -> Result<Vec<StageResource>, RemoteError> {
        let operation = format!("List{}s", kind.resource_type());
        let mut published = Vec::new();
        let listing = {
            let mut inner = self.lock()?;
            if inner.failing_lists.contains(&kind) {
                return Err(RemoteError::registry(operation, "ServiceUnavailable: injected failure"));
            }
            let doomed = inner.doomed.contains(&kind);
            let frozen = inner.frozen;
            let predictors: HashMap<String, u32> = inner
                .entries
                .get(&StageKind::Predictor)
                .into_iter()
                .flatten()
                .filter_map(|e| match &e.request {
                    CreateRequest::Predictor { horizon, .. } => Some((e.resource.name.clone(), *horizon)),
                    _ => None,
                })
                .collect();
            let sources: HashMap<String, StoragePath> = inner
                .entries
                .get(&StageKind::Import)
                .into_iter()
                .flatten()
                .filter_map(|e| match &e.request {
                    CreateRequest::Import { source, .. } => Some((e.resource.name.clone(), source.clone())),
                    _ => None,
                })
                .collect();

            let entries = inner.entries.entry(kind).or_default();
            if !frozen {
                for entry in entries.iter_mut() {
                    let next = next_status(&entry.resource.status, doomed);
                    if kind == StageKind::Export
                        && next.is_ready()
                        && !entry.resource.status.is_ready()
                    {
                        let name = &entry.resource.name;
                        published.push((
                            entry.request.clone(),
                            sources.get(name).cloned(),
                            predictors.get(name).copied().unwrap_or(10),
                        ));
                    }
                    entry.resource.status = next;
                }
            }
            entries.iter().map(|e| e.resource.clone()).collect::<Vec<_>>()
        };

        for (request, source, horizon) in published {
            self.publish_export(request, source, horizon).await;
        }
        Ok(listing)
    }

    async fn create(&self, request: CreateRequest) -> Result<String, RemoteError> {
        let kind = request.kind();
        let operation = format!("Create{}", kind.resource_type());
        let name = request.name().to_string();
        let id = self.arn(kind, &name);

        let mut inner = self.lock()?;
        if inner.failing_creates.contains(&kind) {
            return Err(RemoteError::registry(operation, "ServiceUnavailable: injected failure"));
        }
        if let Some((ref_kind, ref_id)) = referenced_id(&request) {
            let known = inner
                .entries
                .get(&ref_kind)
                .is_some_and(|list| list.iter().any(|e| e.resource.id == ref_id));
            if !known {
                return Err(RemoteError::registry(
                    operation,
                    format!("ResourceNotFoundException: {ref_id:?}"),
                ));
            }
        }
        let entries = inner.entries.entry(kind).or_default();
        if entries.iter().any(|e| e.resource.name == name) {
            return Err(RemoteError::registry(
                operation,
                format!("ResourceAlreadyExistsException: {name}"),
            ));
        }
        entries.push(Entry {
            resource: StageResource {
                kind,
                id: id.clone(),
                name,
                status: ResourceStatus::CreatePending,
                created_at: Some(Utc::now()),
            },
            request,
            dataset_ids: Vec::new(),
        });
        *inner.creates.entry(kind).or_default() += 1;
        Ok(id)
    }

    async fn update_dataset_group(
        &self,
        dataset_group_id: &str,
        dataset_ids: &[String],
    ) -> Result<(), RemoteError> {
        let operation = "UpdateDatasetGroup";
        let mut inner = self.lock()?;
        for dataset_id in dataset_ids {
            let known = inner
                .entries
                .get(&StageKind::Dataset)
                .is_some_and(|list| list.iter().any(|e| &e.resource.id == dataset_id));
            if !known {
                return Err(RemoteError::registry(
                    operation,
                    format!("ResourceNotFoundException: {dataset_id:?}"),
                ));
            }
        }
        let group = inner
            .entries
            .get_mut(&StageKind::DatasetGroup)
            .and_then(|list| list.iter_mut().find(|e| e.resource.id == dataset_group_id))
            .ok_or_else(|| {
                RemoteError::registry(
                    operation,
                    format!("ResourceNotFoundException: {dataset_group_id:?}"),
                )
            })?;
        group.dataset_ids = dataset_ids.to_vec();
        group.resource.status = ResourceStatus::UpdatePending;
        Ok(())
    }
}
