//! Data Model: RunIdentity, StageResource, SeriesPoint, ResultRow and the
//! request shapes exchanged with the remote collaborators.
use crate::error::ForecastError;
use crate::stage::StageKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registry limit on resource names. A run identity is checked against
/// what remains of it once the name prefix is applied.
pub const MAX_RESOURCE_NAME_LEN: usize = 63;

/// Length of every identity produced by [`RunIdentity::from_timestamp`].
pub const GENERATED_IDENTITY_LEN: usize = 17;

/// Opaque token correlating every remote resource of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunIdentity(String);

impl RunIdentity {
    /// Builds the identity for a run started at `at`: the timestamp at
    /// millisecond precision with the decimal separator removed.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d%H%M%S%3f").to_string())
    }

    /// Validates a caller supplied identity. The prefixed length is
    /// checked where the resource name is derived.
    pub fn parse(raw: &str) -> Result<Self, ForecastError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_RESOURCE_NAME_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ForecastError::InvalidRunIdentity(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunIdentity {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RunIdentity> for String {
    fn from(id: RunIdentity) -> Self {
        id.0
    }
}

/// Lifecycle state reported by the remote registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    Active,
    CreatePending,
    CreateInProgress,
    CreateFailed,
    UpdatePending,
    UpdateInProgress,
    UpdateFailed,
    DeletePending,
    DeleteInProgress,
    DeleteFailed,
    /// Anything the registry reports that is not listed above
    Other(String),
}

impl ResourceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdatePending => "UPDATE_PENDING",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::DeletePending => "DELETE_PENDING",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::Other(raw) => raw,
        }
    }

    /// Only an active resource may feed the next stage.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::CreateFailed | Self::UpdateFailed | Self::DeleteFailed)
    }
}

impl FromStr for ResourceStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ACTIVE" => Self::Active,
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_FAILED" => Self::CreateFailed,
            "UPDATE_PENDING" => Self::UpdatePending,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "DELETE_PENDING" => Self::DeletePending,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_FAILED" => Self::DeleteFailed,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Other(raw)))
    }
}

/// A remote entity owned by the forecast registry. The pipeline only ever
/// reads these; creation goes through [`CreateRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResource {
    pub kind: StageKind,
    /// Registry assigned identifier (ARN)
    pub id: String,
    /// Derived name of the owning run
    pub name: String,
    pub status: ResourceStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl StageResource {
    /// Identifier usable in a create call, if the registry has assigned one.
    pub fn usable_id(&self) -> Option<&str> {
        let id = self.id.trim();
        (!id.is_empty()).then_some(id)
    }
}

/// Item identifier written on every staged row.
pub const SERIES_ITEM_ID: &str = "v";

/// Column header of the staged input CSV.
pub const SERIES_HEADER: [&str; 3] = ["item_id", "timestamp", "target_value"];

/// Staged points are pinned to midnight.
pub const SERIES_TIMESTAMP_FORMAT: &str = "%Y-%m-%d 00:00:00";

/// One staged observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn timestamp(&self) -> String {
        self.date.format(SERIES_TIMESTAMP_FORMAT).to_string()
    }

    /// Reads a point back from the `timestamp` and `target_value` columns.
    pub fn parse(timestamp: &str, value: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(timestamp.trim(), SERIES_TIMESTAMP_FORMAT).ok()?;
        let value = value.trim().parse::<f64>().ok()?;
        Some(Self { date, value })
    }
}

/// Shortest decimal text that parses back to exactly `value`, never in
/// exponent form.
pub fn format_number(value: f64) -> String {
    value.to_string()
}

/// One row of an exported forecast partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub item_id: String,
    pub date: String,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Location of an object in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath {
    pub bucket: String,
    pub key: String,
}

impl StoragePath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    pub name: String,
    pub attribute_type: String,
}

impl SchemaAttribute {
    fn new(name: &str, attribute_type: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute_type: attribute_type.to_string(),
        }
    }
}

/// Target time series schema matching the staged CSV columns.
pub fn target_series_schema() -> Vec<SchemaAttribute> {
    vec![
        SchemaAttribute::new("item_id", "string"),
        SchemaAttribute::new("timestamp", "timestamp"),
        SchemaAttribute::new("target_value", "float"),
    ]
}

/// Everything the registry needs to create one stage's resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateRequest {
    DatasetGroup {
        name: String,
        domain: String,
    },
    Dataset {
        name: String,
        domain: String,
        dataset_type: String,
        frequency: String,
        schema: Vec<SchemaAttribute>,
    },
    Import {
        name: String,
        dataset_id: String,
        source: StoragePath,
        role: String,
    },
    Predictor {
        name: String,
        dataset_group_id: String,
        auto_ml: bool,
        horizon: u32,
        frequency: String,
    },
    Forecast {
        name: String,
        predictor_id: String,
    },
    Export {
        name: String,
        forecast_id: String,
        destination: StoragePath,
        role: String,
    },
}

impl CreateRequest {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::DatasetGroup { .. } => StageKind::DatasetGroup,
            Self::Dataset { .. } => StageKind::Dataset,
            Self::Import { .. } => StageKind::Import,
            Self::Predictor { .. } => StageKind::Predictor,
            Self::Forecast { .. } => StageKind::Forecast,
            Self::Export { .. } => StageKind::Export,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::DatasetGroup { name, .. }
            | Self::Dataset { name, .. }
            | Self::Import { name, .. }
            | Self::Predictor { name, .. }
            | Self::Forecast { name, .. }
            | Self::Export { name, .. } => name,
        }
    }
}

/// Canned access control applied on upload. Staged series are never
/// readable outside the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    Private,
}

/// A write to object storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PutObject {
    pub path: StoragePath,
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: ObjectAcl,
}

/// One entry of an object storage listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_from_timestamp_drops_separator() {
        let at = Utc.with_ymd_and_hms(2020, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::milliseconds(89);
        let id = RunIdentity::from_timestamp(at);
        assert_eq!(id.as_str(), "20200304050607089");
        assert_eq!(id.as_str().len(), GENERATED_IDENTITY_LEN);
    }

    #[test]
    fn test_identity_parse_rejects_bad_tokens() {
        assert!(RunIdentity::parse("20200304050607089").is_ok());
        assert!(RunIdentity::parse("").is_err());
        assert!(RunIdentity::parse("../etc").is_err());
        assert!(RunIdentity::parse(&"9".repeat(MAX_RESOURCE_NAME_LEN)).is_ok());
        assert!(RunIdentity::parse(&"9".repeat(MAX_RESOURCE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_format_number_is_shortest_decimal() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-12.25), "-12.25");
        assert_eq!(format_number(1e21), "1000000000000000000000");
        for v in [0.1 + 0.2, 1.0 / 3.0, 123456.789e-3] {
            assert_eq!(format_number(v).parse::<f64>().unwrap(), v);
        }
    }

    #[test]
    fn test_series_point_timestamp_is_midnight() {
        let point = SeriesPoint {
            date: NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            value: 4.5,
        };
        assert_eq!(point.timestamp(), "2021-01-31 00:00:00");
        assert_eq!(SeriesPoint::parse("2021-01-31 00:00:00", "4.5"), Some(point));
        assert_eq!(SeriesPoint::parse("2021-01-31", "4.5"), None);
    }

    #[test]
    fn test_status_roundtrips_verbatim() {
        let status: ResourceStatus = "CREATE_IN_PROGRESS".parse().unwrap();
        assert_eq!(status, ResourceStatus::CreateInProgress);
        assert_eq!(status.to_string(), "CREATE_IN_PROGRESS");

        let odd: ResourceStatus = "SOMETHING_NEW".parse().unwrap();
        assert_eq!(odd.to_string(), "SOMETHING_NEW");
        assert!(!odd.is_ready());
    }

    #[test]
    fn test_status_classification() {
        assert!(ResourceStatus::Active.is_ready());
        assert!(ResourceStatus::CreateFailed.is_failed());
        assert!(ResourceStatus::UpdateFailed.is_failed());
        assert!(!ResourceStatus::CreatePending.is_ready());
        assert!(!ResourceStatus::CreatePending.is_failed());
    }

    #[test]
    fn test_storage_path_display() {
        let path = StoragePath::new("bucket", "csv/id1.csv");
        assert_eq!(path.to_string(), "s3://bucket/csv/id1.csv");
    }

    #[test]
    fn test_usable_id() {
        let mut resource = StageResource {
            kind: StageKind::Dataset,
            id: "  ".into(),
            name: "id1".into(),
            status: ResourceStatus::Active,
            created_at: None,
        };
        assert_eq!(resource.usable_id(), None);
        resource.id = "arn:aws:forecast:dataset/id1".into();
        assert_eq!(resource.usable_id(), Some("arn:aws:forecast:dataset/id1"));
    }
}
