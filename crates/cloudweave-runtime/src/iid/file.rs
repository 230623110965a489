//! JSON file backend
//!
//! Keeps the whole key space in one `iids.json` document. Each mutation
//! rewrites the document after copying the previous one to
//! `iids.json.backup`.

use super::store::{IidStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const STORE_VERSION: u32 = 1;
const STORE_FILE: &str = "iids.json";
const STORE_BACKUP: &str = "iids.json.backup";
const STORE_TEMP: &str = "iids.json.tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    entries: BTreeMap<String, String>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            updated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// File backed identity store
pub struct JsonFileStore {
    dir: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Opens the store in `dir`, starting empty when no file exists yet
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let document = Self::load(&dir.join(STORE_FILE)).await?;
        Ok(Self {
            dir,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    async fn load(path: &Path) -> Result<StoreDocument, StoreError> {
        if !path.exists() {
            tracing::debug!("Identity store not found, starting empty");
            return Ok(StoreDocument::default());
        }

        let content = fs::read_to_string(path).await?;
        let document: StoreDocument = serde_json::from_str(&content)?;

        if document.version > STORE_VERSION {
            return Err(StoreError::Version {
                found: document.version,
                supported: STORE_VERSION,
            });
        }

        tracing::debug!("Loaded identity store with {} records", document.entries.len());
        Ok(document)
    }

    async fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            tracing::debug!("Created store directory: {}", self.dir.display());
        }

        let path = self.dir.join(STORE_FILE);
        if path.exists() {
            fs::copy(&path, self.dir.join(STORE_BACKUP)).await?;
        }

        let temp = self.dir.join(STORE_TEMP);
        fs::write(&temp, serde_json::to_string_pretty(document)?).await?;
        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved identity store with {} records", document.entries.len());
        Ok(())
    }
}

#[async_trait]
impl IidStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.document.lock().await.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        next.entries.insert(key.to_string(), value);
        next.updated_at = Utc::now();
        self.save(&next).await?;
        *document = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut document = self.document.lock().await;
        if !document.entries.contains_key(key) {
            return Ok(None);
        }
        let mut next = document.clone();
        let previous = next.entries.remove(key);
        next.updated_at = Utc::now();
        self.save(&next).await?;
        *document = next;
        Ok(previous)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .document
            .lock()
            .await
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let temp_dir = tempdir().unwrap();

        let store = JsonFileStore::open(temp_dir.path()).await.unwrap();
        store
            .put("/global/c/vpc/v1", "v1-abc:vpc-0001".into())
            .await
            .unwrap();
        store
            .put("/global/c/vpc/v2", "v2-def:vpc-0002".into())
            .await
            .unwrap();
        store.delete("/global/c/vpc/v2").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("/global/c/vpc/v1").await.unwrap(),
            Some("v1-abc:vpc-0001".to_string())
        );
        assert_eq!(reopened.get("/global/c/vpc/v2").await.unwrap(), None);
        assert!(temp_dir.path().join(STORE_BACKUP).exists());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("nested")).await.unwrap();
        assert!(store.list_prefix("/").await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let document = serde_json::json!({
            "version": STORE_VERSION + 1,
            "updated_at": Utc::now(),
            "entries": {}
        });
        std::fs::write(temp_dir.path().join(STORE_FILE), document.to_string()).unwrap();

        assert!(matches!(
            JsonFileStore::open(temp_dir.path()).await,
            Err(StoreError::Version { .. })
        ));
    }
}
