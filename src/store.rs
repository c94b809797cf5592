use crate::settings::Settings;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One persisted record: an `id` plus an arbitrary JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreRecord {
    pub id: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StoreRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Namespaced key-value persistence used by the dashboard.
///
/// `put` replaces any record with the same id in the namespace.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn get(&self, namespace: &str) -> anyhow::Result<Vec<StoreRecord>>;

    async fn put(&self, namespace: &str, record: StoreRecord) -> anyhow::Result<()>;
}

fn upsert(records: &mut Vec<StoreRecord>, record: StoreRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

/// Volatile store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, Vec<StoreRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `records` under `namespace`.
    pub fn seeded(namespace: &str, records: Vec<StoreRecord>) -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert(namespace.to_string(), records);
        Self {
            namespaces: Mutex::new(namespaces),
        }
    }
}

#[async_trait]
impl DashboardStore for MemoryStore {
    async fn get(&self, namespace: &str) -> anyhow::Result<Vec<StoreRecord>> {
        let guard = self
            .namespaces
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(namespace).cloned().unwrap_or_default())
    }

    async fn put(&self, namespace: &str, record: StoreRecord) -> anyhow::Result<()> {
        let mut guard = self
            .namespaces
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        upsert(guard.entry(namespace.to_string()).or_default(), record);
        Ok(())
    }
}

/// Stores each namespace as a JSON array in `<dir>/<namespace>.json`.
///
/// Writes go to a temporary file that is then renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Store rooted at the configured data directory.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.store_dir)
    }

    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    async fn read(&self, namespace: &str) -> anyhow::Result<Vec<StoreRecord>> {
        let path = self.path_for(namespace);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

#[async_trait]
impl DashboardStore for JsonFileStore {
    async fn get(&self, namespace: &str) -> anyhow::Result<Vec<StoreRecord>> {
        self.read(namespace).await
    }

    async fn put(&self, namespace: &str, record: StoreRecord) -> anyhow::Result<()> {
        let mut records = self.read(namespace).await?;
        upsert(&mut records, record);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(namespace);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        tracing::debug!(namespace, path = %path.display(), "dashboard store written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_flattened_next_to_id() {
        let record = StoreRecord::new("activeTemplate").with("data", json!({ "name": "Default" }));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({ "id": "activeTemplate", "data": { "name": "Default" } })
        );
        let back: StoreRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn memory_store_replaces_records_by_id() {
        let store = MemoryStore::new();
        store
            .put("dashboard", StoreRecord::new("config").with("v", json!(1)))
            .await
            .unwrap();
        store
            .put("dashboard", StoreRecord::new("config").with("v", json!(2)))
            .await
            .unwrap();
        let records = store.get("dashboard").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("v"), Some(&json!(2)));
        assert!(store.get("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert!(store.get("dashboard").await.unwrap().is_empty());
        store
            .put("dashboard", StoreRecord::new("config").with("v", json!(1)))
            .await
            .unwrap();
        store
            .put("dashboard", StoreRecord::new("templates").with("data", json!([])))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(dir.path().join("nested"));
        let records = reopened.get("dashboard").await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["config", "templates"]);
        assert!(!reopened.path_for("dashboard").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.path_for("dashboard"), b"not json").unwrap();
        assert!(store.get("dashboard").await.is_err());
    }

    #[test]
    fn settings_choose_the_store_directory() {
        let settings = Settings {
            store_dir: "/tmp/journal".into(),
            ..Settings::default()
        };
        let store = JsonFileStore::from_settings(&settings);
        assert_eq!(
            store.path_for("dashboard"),
            Path::new("/tmp/journal/dashboard.json")
        );
    }
}
