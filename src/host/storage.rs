//! Key-value storage backends for the profile collection.
//!
//! The collection is always written as a whole: `set` replaces the value
//! under a key, and the file backend rewrites the complete file.

use crate::base::context::HostResultExt;
use crate::base::overrideerror::OverrideError;
use crate::host::{HostFuture, ProfileStorage};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Volatile storage, used by tests and the simulated browser.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ProfileStorage for MemoryStorage {
    fn get(&self, key: String) -> HostFuture<'_, Option<Value>> {
        Box::pin(async move { Ok(self.values.lock().await.get(&key).cloned()) })
    }

    fn set(&self, key: String, value: Value) -> HostFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(OverrideError::storage(key, "quota exceeded"));
            }
            self.values.lock().await.insert(key, value);
            Ok(())
        })
    }
}

/// Storage persisted as one JSON object in a file.
///
/// # Example
/// ```ignore
/// let storage = Arc::new(JsonFileStorage::new("/path/to/profiles.json"));
/// let controller = LifecycleController::load(host, storage, EngineConfig::default()).await?;
/// ```
pub struct JsonFileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_object(&self, key: &str) -> Result<Map<String, Value>, OverrideError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Map::new()),
            Ok(text) => match serde_json::from_str::<Value>(&text).format_context(key)? {
                Value::Object(map) => Ok(map),
                _ => Err(OverrideError::StorageFormat {
                    key: key.to_string(),
                    message: "storage file is not a JSON object".to_string(),
                }),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e).storage_context(key),
        }
    }
}

impl ProfileStorage for JsonFileStorage {
    fn get(&self, key: String) -> HostFuture<'_, Option<Value>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut object = self.read_object(&key).await?;
            Ok(object.remove(&key))
        })
    }

    fn set(&self, key: String, value: Value) -> HostFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut object = self.read_object(&key).await?;
            object.insert(key.clone(), value);

            let json = serde_json::to_string_pretty(&Value::Object(object)).format_context(&key)?;
            tokio::fs::write(&self.path, json).await.storage_context(&key)?;
            tracing::debug!(path = %self.path.display(), key = %key, "storage written");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_roundtrip_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, r#"{"theme":"dark"}"#).await.unwrap();

        let storage = JsonFileStorage::new(&path);
        storage
            .set("overrideProfiles".into(), json!([{"name": "demo", "overrides": []}]))
            .await
            .unwrap();

        let reopened = JsonFileStorage::new(&path);
        let value = reopened.get("overrideProfiles".into()).await.unwrap().unwrap();
        assert_eq!(value[0]["name"], "demo");
        assert_eq!(reopened.get("theme".into()).await.unwrap(), Some(json!("dark")));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.get("overrideProfiles".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, "[1, 2").await.unwrap();

        let err = JsonFileStorage::new(&path)
            .get("overrideProfiles".into())
            .await
            .unwrap_err();
        assert!(matches!(err, OverrideError::StorageFormat { .. }));
    }

    #[tokio::test]
    async fn test_memory_write_failure() {
        let storage = MemoryStorage::new();
        storage.fail_writes(true);
        let err = storage.set("k".into(), json!(1)).await.unwrap_err();
        assert!(err.is_host_failure());
        assert_eq!(storage.get("k".into()).await.unwrap(), None);
    }
}
