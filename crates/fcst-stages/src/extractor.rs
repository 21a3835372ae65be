//! Result Extractor: pulls the p50 column out of an export partition
use fcst_core::data_model::format_number;
use fcst_core::{ForecastError, ObjectStore, PipelineConfig, ResultRow};
use std::sync::Arc;

/// File name suffix of the partition the export job writes.
pub const PARTITION_SUFFIX: &str = "part0.csv";

#[derive(Clone)]
pub struct ResultExtractor {
    store: Arc<dyn ObjectStore>,
    config: Arc<PipelineConfig>,
}

impl ResultExtractor {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    /// Key of the first exported partition for the run named `resource_name`.
    pub async fn locate_partition(&self, resource_name: &str) -> Result<String, ForecastError> {
        let export = self.config.export_path(resource_name);
        let prefix = format!("{}/", export.key);
        let objects = self.store.list(&export.bucket, &prefix).await?;

        objects
            .into_iter()
            .map(|o| o.key)
            .find(|key| key.ends_with(PARTITION_SUFFIX))
            .ok_or_else(|| ForecastError::NoResultObject {
                name: resource_name.to_string(),
            })
    }

    /// p50 values of the run's partition, in file order.
    pub async fn extract(&self, resource_name: &str) -> Result<Vec<f64>, ForecastError> {
        let key = self.locate_partition(resource_name).await?;
        let body = self.store.get(&self.config.bucket, &key).await?;
        let rows = parse_rows(&body)?;
        if rows.is_empty() {
            return Err(ForecastError::EmptyResult { key });
        }
        tracing::info!(%key, rows = rows.len(), "result extracted");
        Ok(rows.into_iter().map(|r| r.p50).collect())
    }

    /// The extracted values rendered as `[a,b,c]`.
    pub async fn fetch(&self, resource_name: &str) -> Result<String, ForecastError> {
        self.extract(resource_name).await.map(|values| render_values(&values))
    }
}

pub fn parse_rows(body: &[u8]) -> Result<Vec<ResultRow>, ForecastError> {
    csv::Reader::from_reader(body)
        .deserialize::<ResultRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ForecastError::ResultParse(e.to_string()))
}

pub fn render_values(values: &[f64]) -> String {
    let joined = values
        .iter()
        .map(|v| format_number(*v))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcst_core::InMemoryObjectStore;

    const PARTITION: &str = "item_id,date,p10,p50,p90\n\
        v,2021-01-10T00:00:00Z,1.5,2.5,3.5\n\
        v,2021-01-11T00:00:00Z,0.5,1,4\n\
        v,2021-01-12T00:00:00Z,2,3.25,4\n";

    fn extractor(store: Arc<InMemoryObjectStore>) -> ResultExtractor {
        ResultExtractor::new(store, Arc::new(PipelineConfig::default()))
    }

    #[test]
    fn test_render_values() {
        assert_eq!(render_values(&[2.5, 1.0, 3.25]), "[2.5,1,3.25]");
        assert_eq!(render_values(&[]), "[]");
    }

    #[test]
    fn test_parse_rows_ignores_extra_columns() {
        let rows = parse_rows(b"item_id,date,p10,p50,p90,mean\nv,d,1,2,3,9\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].p50, 2.0);
    }

    #[test]
    fn test_parse_rows_rejects_garbage() {
        let err = parse_rows(b"item_id,date,p10,p50,p90\nv,d,x,y,z\n").unwrap_err();
        assert!(matches!(err, ForecastError::ResultParse(_)));
    }

    #[tokio::test]
    async fn test_fetch_keeps_file_order() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert("your-bucket", "result/id1/id1_2021-01-09T00-00-00Z_part0.csv", PARTITION);
        store.insert("your-bucket", "result/id1/_SUCCESS", "");

        let message = extractor(store).fetch("id1").await.unwrap();
        assert_eq!(message, "[2.5,1,3.25]");
    }

    #[tokio::test]
    async fn test_missing_partition() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert("your-bucket", "result/id10/x_part0.csv", PARTITION);
        store.insert("your-bucket", "result/id1/x_part1.csv", PARTITION);

        let err = extractor(store).fetch("id1").await.unwrap_err();
        assert!(matches!(err, ForecastError::NoResultObject { ref name } if name == "id1"));
    }

    #[tokio::test]
    async fn test_header_only_partition_is_empty_result() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert("your-bucket", "result/id1/x_part0.csv", "item_id,date,p10,p50,p90\n");

        let err = extractor(store).fetch("id1").await.unwrap_err();
        assert!(matches!(err, ForecastError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_reads(true);
        let err = extractor(store).fetch("id1").await.unwrap_err();
        assert!(matches!(err, ForecastError::Remote(_)));
    }
}
