//! Object storage implementations usable without the hosted service:
//! an in-memory store for tests and a directory-backed store for local runs.
use crate::data_model::{ObjectAcl, ObjectSummary, PutObject};
use crate::error::RemoteError;
use crate::remote::ObjectStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: ObjectAcl,
}

/// Keeps objects in a process-local map keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent list and get fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Seeds an object directly, bypassing failure injection.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.lock() {
            objects.insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    body: body.into(),
                    content_type: "text/csv".to_string(),
                    acl: ObjectAcl::Private,
                },
            );
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<(String, String), StoredObject>>, RemoteError> {
        self.objects
            .lock()
            .map_err(|_| RemoteError::storage("Lock", "object map poisoned"))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, object: PutObject) -> Result<(), RemoteError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RemoteError::storage("PutObject", "ServiceUnavailable: injected failure"));
        }
        self.lock()?.insert(
            (object.path.bucket, object.path.key),
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                acl: object.acl,
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, RemoteError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::storage("ListObjects", "ServiceUnavailable: injected failure"));
        }
        Ok(self
            .lock()?
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, key), obj)| ObjectSummary {
                key: key.clone(),
                size: obj.body.len() as u64,
            })
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, RemoteError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::storage("GetObject", "ServiceUnavailable: injected failure"));
        }
        self.lock()?
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| obj.body.clone())
            .ok_or_else(|| RemoteError::storage("GetObject", format!("NoSuchKey: {bucket}/{key}")))
    }
}

// ============================================================================
// LOCAL DIRECTORY
// ============================================================================

/// Stores each bucket as a directory under `root`, keys as relative paths.
/// Content type and ACL are accepted but not persisted.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, operation: &str, bucket: &str, key: &str) -> Result<PathBuf, RemoteError> {
        let mut path = self.root.join(checked_segment(operation, bucket)?);
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => path.push(part),
                _ => {
                    return Err(RemoteError::storage(
                        operation,
                        format!("InvalidKey: {key:?}"),
                    ))
                }
            }
        }
        Ok(path)
    }
}

fn checked_segment<'a>(operation: &str, segment: &'a str) -> Result<&'a str, RemoteError> {
    let ok = !segment.is_empty() && !segment.contains(|c: char| c == '/' || c == '\\') && segment != "..";
    if ok {
        Ok(segment)
    } else {
        Err(RemoteError::storage(operation, format!("InvalidBucketName: {segment:?}")))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, object: PutObject) -> Result<(), RemoteError> {
        let path = self.resolve("PutObject", &object.path.bucket, &object.path.key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::storage("PutObject", e.to_string()))?;
        }
        tokio::fs::write(&path, &object.body)
            .await
            .map_err(|e| RemoteError::storage("PutObject", e.to_string()))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>, RemoteError> {
        let bucket_root = self.root.join(checked_segment("ListObjects", bucket)?);
        if !tokio::fs::try_exists(&bucket_root).await.unwrap_or(false) {
            return Err(RemoteError::storage("ListObjects", format!("NoSuchBucket: {bucket}")));
        }

        let mut found = Vec::new();
        let mut pending = vec![bucket_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| RemoteError::storage("ListObjects", e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| RemoteError::storage("ListObjects", e.to_string()))?
            {
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| RemoteError::storage("ListObjects", e.to_string()))?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    found.push(ObjectSummary { key, size: meta.len() });
                }
            }
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.resolve("GetObject", bucket, key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RemoteError::storage("GetObject", format!("NoSuchKey: {bucket}/{key}"))
            } else {
                RemoteError::storage("GetObject", e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::StoragePath;

    fn csv_object(bucket: &str, key: &str, body: &str) -> PutObject {
        PutObject {
            path: StoragePath::new(bucket, key),
            body: body.as_bytes().to_vec(),
            content_type: "text/csv".to_string(),
            acl: ObjectAcl::Private,
        }
    }

    #[tokio::test]
    async fn test_memory_store_lists_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.put(csv_object("b", "result/id1/a_part0.csv", "x")).await.unwrap();
        store.put(csv_object("b", "result/id2/a_part0.csv", "y")).await.unwrap();
        store.put(csv_object("other", "result/id1/z.csv", "z")).await.unwrap();

        let listed = store.list("b", "result/id1/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "result/id1/a_part0.csv");
        assert_eq!(store.put_count(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = InMemoryObjectStore::new();
        store.fail_puts(true);
        let err = store.put(csv_object("b", "k", "v")).await.unwrap_err();
        assert!(err.message.contains("injected"));
        assert_eq!(store.put_count(), 0);
        assert!(store.object("b", "k").is_none());
    }

    #[tokio::test]
    async fn test_local_store_roundtrip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.put(csv_object("b", "csv/id1.csv", "a,b\n")).await.unwrap();
        store.put(csv_object("b", "result/id1/x_part0.csv", "p50\n1\n")).await.unwrap();

        assert_eq!(store.get("b", "csv/id1.csv").await.unwrap(), b"a,b\n");

        let keys: Vec<String> = store
            .list("b", "result/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["result/id1/x_part0.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_local_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let err = store.put(csv_object("b", "../outside.csv", "x")).await.unwrap_err();
        assert!(err.message.starts_with("InvalidKey"));

        let missing = store.get("b", "nope.csv").await.unwrap_err();
        assert!(missing.message.starts_with("NoSuchKey"));
    }
}
