//! Data Stager: validates a numeric series and writes it to object storage
//! as the dated CSV the import job reads.
use chrono::{Duration, NaiveDate, Utc};
use fcst_core::data_model::{format_number, SERIES_HEADER, SERIES_ITEM_ID};
use fcst_core::{
    ForecastError, ObjectAcl, ObjectStore, PipelineConfig, PutObject, SeriesPoint, StoragePath,
};
use std::sync::Arc;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Clone)]
pub struct DataStager {
    store: Arc<dyn ObjectStore>,
    config: Arc<PipelineConfig>,
}

impl DataStager {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    /// Where the series of the run named `resource_name` lives.
    pub fn object_path(&self, resource_name: &str) -> StoragePath {
        self.config.series_path(resource_name)
    }

    /// Rejects series outside the configured length bounds or holding
    /// non-finite values.
    pub fn validate(&self, values: &[f64]) -> Result<(), ForecastError> {
        let (min, max) = (self.config.min_points, self.config.max_points);
        if values.len() < min || values.len() > max {
            return Err(ForecastError::InvalidInputSize {
                len: values.len(),
                min,
                max,
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteValue { index });
        }
        Ok(())
    }

    /// Validates, renders and uploads the series. Nothing is written when
    /// validation fails.
    pub async fn stage(
        &self,
        resource_name: &str,
        values: &[f64],
    ) -> Result<StoragePath, ForecastError> {
        self.validate(values)?;
        let points = date_points(values, Utc::now().date_naive());
        let body = render_csv(&points)?;
        let path = self.object_path(resource_name);

        self.store
            .put(PutObject {
                path: path.clone(),
                body,
                content_type: CSV_CONTENT_TYPE.to_string(),
                acl: ObjectAcl::Private,
            })
            .await
            .map_err(|e| {
                tracing::warn!(%path, error = %e, "staging upload failed");
                ForecastError::Remote(e)
            })?;

        tracing::info!(%path, points = points.len(), "series staged");
        Ok(path)
    }
}

/// Assigns one day per value, oldest first, so the last value falls on `today`.
pub fn date_points(values: &[f64], today: NaiveDate) -> Vec<SeriesPoint> {
    let n = values.len() as i64;
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| SeriesPoint {
            date: today - Duration::days(n - 1 - i as i64),
            value,
        })
        .collect()
}

pub fn render_csv(points: &[SeriesPoint]) -> Result<Vec<u8>, ForecastError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(SERIES_HEADER)
        .map_err(|e| ForecastError::Serialize(e.to_string()))?;
    for point in points {
        writer
            .write_record([
                SERIES_ITEM_ID.to_string(),
                point.timestamp(),
                format_number(point.value),
            ])
            .map_err(|e| ForecastError::Serialize(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| ForecastError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcst_core::InMemoryObjectStore;

    fn stager(store: Arc<InMemoryObjectStore>) -> DataStager {
        DataStager::new(store, Arc::new(PipelineConfig::default()))
    }

    fn series(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 1.5).collect()
    }

    #[test]
    fn test_dates_step_back_one_day() {
        let today = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let points = date_points(&[1.0, 2.0, 3.0], today);
        let dates: Vec<String> = points.iter().map(|p| p.timestamp()).collect();
        assert_eq!(
            dates,
            vec!["2021-02-27 00:00:00", "2021-02-28 00:00:00", "2021-03-01 00:00:00"]
        );
    }

    #[test]
    fn test_render_csv_layout() {
        let today = NaiveDate::from_ymd_opt(2021, 1, 2).unwrap();
        let body = render_csv(&date_points(&[1.0, 0.25], today)).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "item_id,timestamp,target_value\nv,2021-01-01 00:00:00,1\nv,2021-01-02 00:00:00,0.25\n"
        );
    }

    #[test]
    fn test_validate_bounds() {
        let s = stager(Arc::new(InMemoryObjectStore::new()));
        assert!(s.validate(&series(30)).is_ok());
        assert!(s.validate(&series(100)).is_ok());
        assert!(matches!(
            s.validate(&series(29)),
            Err(ForecastError::InvalidInputSize { len: 29, min: 30, max: 100 })
        ));
        assert!(matches!(
            s.validate(&series(101)),
            Err(ForecastError::InvalidInputSize { len: 101, .. })
        ));

        let mut bad = series(40);
        bad[7] = f64::NAN;
        assert!(matches!(s.validate(&bad), Err(ForecastError::NonFiniteValue { index: 7 })));
    }

    #[tokio::test]
    async fn test_stage_writes_private_csv() {
        let store = Arc::new(InMemoryObjectStore::new());
        let path = stager(store.clone()).stage("id1", &series(30)).await.unwrap();
        assert_eq!(path.to_string(), "s3://your-bucket/csv/id1.csv");

        let object = store.object("your-bucket", "csv/id1.csv").unwrap();
        assert_eq!(object.content_type, "text/csv");
        assert_eq!(object.acl, ObjectAcl::Private);
        assert_eq!(String::from_utf8(object.body).unwrap().lines().count(), 31);
    }

    #[tokio::test]
    async fn test_invalid_series_writes_nothing() {
        let store = Arc::new(InMemoryObjectStore::new());
        let err = stager(store.clone()).stage("id1", &series(5)).await.unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInputSize { .. }));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_verbatim() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_puts(true);
        let err = stager(store).stage("id1", &series(30)).await.unwrap_err();
        assert!(err.to_string().contains("ServiceUnavailable: injected failure"));
    }
}
