use super::store::{IidStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl IidStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.write().remove(key))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_listing_is_bounded() {
        let store = MemoryStore::new();
        store.put("/global/c/vm/a", "1:x".into()).await.unwrap();
        store.put("/global/c/vm/b", "2:y".into()).await.unwrap();
        store.put("/global/c/vpc/a", "3:z".into()).await.unwrap();
        store.put("/global/c2/vm/a", "4:w".into()).await.unwrap();

        let listed = store.list_prefix("/global/c/vm/").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["/global/c/vm/a", "/global/c/vm/b"]);
    }

    #[tokio::test]
    async fn test_delete_returns_previous() {
        let store = MemoryStore::new();
        store.put("k", "v".into()).await.unwrap();
        assert_eq!(store.delete("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.delete("k").await.unwrap(), None);
        assert!(store.is_empty());
    }
}
