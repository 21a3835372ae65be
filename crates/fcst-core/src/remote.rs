//! Remote collaborator contracts
//!
//! The forecast registry and object storage are owned by someone else.
//! Components receive them as `Arc<dyn …>` handles at construction time.
use crate::data_model::{CreateRequest, ObjectSummary, PutObject, StageResource};
use crate::error::RemoteError;
use crate::stage::StageKind;
use async_trait::async_trait;

/// Name-addressed registry of forecast resources.
#[async_trait]
pub trait ForecastRegistry: Send + Sync {
    /// Full listing of one resource kind.
    async fn list(&self, kind: StageKind) -> Result<Vec<StageResource>, RemoteError>;

    /// Requests creation and returns the assigned identifier.
    async fn create(&self, request: CreateRequest) -> Result<String, RemoteError>;

    /// Replaces the datasets associated with a dataset group.
    async fn update_dataset_group(
        &self,
        dataset_group_id: &str,
        dataset_ids: &[String],
    ) -> Result<(), RemoteError>;
}

/// Bucket/key object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, object: PutObject) -> Result<(), RemoteError>;

    /// Keys in `bucket` starting with `prefix`, in lexical order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, RemoteError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, RemoteError>;
}
