//! Pipeline configuration
//!
//! Values default to the constants the service was first deployed with and
//! can be overridden through `FCST_*` environment variables.
use crate::data_model::{
    target_series_schema, CreateRequest, StoragePath, GENERATED_IDENTITY_LEN,
    MAX_RESOURCE_NAME_LEN,
};
use crate::error::ForecastError;
use crate::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How strictly the advancer checks the stage before the one it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrerequisitePolicy {
    /// The preceding resource only has to exist.
    Exists,
    /// The preceding resource has to exist and report ACTIVE.
    Ready,
}

impl FromStr for PrerequisitePolicy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exists" => Ok(Self::Exists),
            "ready" => Ok(Self::Ready),
            other => Err(ForecastError::Config(format!(
                "FCST_PREREQUISITE_POLICY: unknown policy {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub region: String,
    /// Role the registry assumes to read and write object storage
    pub role_arn: String,
    pub bucket: String,
    /// Key prefix for staged input series
    pub data_path: String,
    /// Key prefix for export output
    pub result_path: String,
    /// Literal tag prepended to a run identity to form resource names
    pub name_prefix: String,
    pub min_points: usize,
    pub max_points: usize,
    pub forecast_horizon: u32,
    pub frequency: String,
    pub prerequisite_policy: PrerequisitePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region: "ap-northeast-1".to_string(),
            role_arn: "arn:aws:iam::0:role/your-role".to_string(),
            bucket: "your-bucket".to_string(),
            data_path: "csv".to_string(),
            result_path: "result".to_string(),
            name_prefix: "id".to_string(),
            min_points: 30,
            max_points: 100,
            forecast_horizon: 10,
            frequency: "D".to_string(),
            prerequisite_policy: PrerequisitePolicy::Ready,
        }
    }
}

impl PipelineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ForecastError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ForecastError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };

        set(&mut config.region, "FCST_REGION");
        set(&mut config.role_arn, "FCST_ROLE_ARN");
        set(&mut config.bucket, "FCST_BUCKET");
        set(&mut config.data_path, "FCST_DATA_PATH");
        set(&mut config.result_path, "FCST_RESULT_PATH");
        set(&mut config.name_prefix, "FCST_NAME_PREFIX");

        if let Some(raw) = lookup("FCST_PREREQUISITE_POLICY") {
            config.prerequisite_policy = raw.parse()?;
        }

        config.data_path = config.data_path.trim_matches('/').to_string();
        config.result_path = config.result_path.trim_matches('/').to_string();
        config.validate_prefix()?;
        Ok(config)
    }

    /// The prefix has to start a valid resource name and leave room for a
    /// generated identity.
    fn validate_prefix(&self) -> Result<(), ForecastError> {
        let prefix = &self.name_prefix;
        let starts_with_letter = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_with_letter || !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ForecastError::Config(format!(
                "FCST_NAME_PREFIX: {prefix:?} must be alphanumeric and start with a letter"
            )));
        }
        if prefix.len() + GENERATED_IDENTITY_LEN > MAX_RESOURCE_NAME_LEN {
            return Err(ForecastError::Config(format!(
                "FCST_NAME_PREFIX: {prefix:?} leaves no room for a run identity within {MAX_RESOURCE_NAME_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Longest run identity whose prefixed name still fits the registry.
    pub fn max_run_identity_len(&self) -> usize {
        MAX_RESOURCE_NAME_LEN.saturating_sub(self.name_prefix.len())
    }

    /// `<bucket>/<data-path>/<name>.csv`, the staged input of one run.
    pub fn series_path(&self, resource_name: &str) -> StoragePath {
        StoragePath::new(
            &self.bucket,
            format!("{}/{}.csv", self.data_path, resource_name),
        )
    }

    /// `<bucket>/<result-path>/<name>`, where the export job writes.
    pub fn export_path(&self, resource_name: &str) -> StoragePath {
        StoragePath::new(
            &self.bucket,
            format!("{}/{}", self.result_path, resource_name),
        )
    }

    /// Create call for `stage` under `name`. `source_id` is the identifier
    /// of the stage's creation source and is ignored by the two stages
    /// created at ingestion.
    pub fn creation_request(&self, stage: StageKind, name: &str, source_id: &str) -> CreateRequest {
        let name = name.to_string();
        let source_id = source_id.to_string();
        match stage {
            StageKind::DatasetGroup => CreateRequest::DatasetGroup {
                name,
                domain: "CUSTOM".to_string(),
            },
            StageKind::Dataset => CreateRequest::Dataset {
                name,
                domain: "CUSTOM".to_string(),
                dataset_type: "TARGET_TIME_SERIES".to_string(),
                frequency: self.frequency.clone(),
                schema: target_series_schema(),
            },
            StageKind::Import => CreateRequest::Import {
                source: self.series_path(&name),
                name,
                dataset_id: source_id,
                role: self.role_arn.clone(),
            },
            StageKind::Predictor => CreateRequest::Predictor {
                name,
                dataset_group_id: source_id,
                auto_ml: true,
                horizon: self.forecast_horizon,
                frequency: self.frequency.clone(),
            },
            StageKind::Forecast => CreateRequest::Forecast {
                name,
                predictor_id: source_id,
            },
            StageKind::Export => CreateRequest::Export {
                destination: self.export_path(&name),
                name,
                forecast_id: source_id,
                role: self.role_arn.clone(),
            },
        }
    }
}
