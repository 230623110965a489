use super::{IidGroup, Namespace};
use async_trait::async_trait;
use thiserror::Error;

/// Identity store backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store version {found} is newer than supported version {supported}")]
    Version { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-scoped storage with prefix listing
///
/// Implementations must give read-your-writes within one process. They are
/// not expected to serialize concurrent writers of one key.
#[async_trait]
pub trait IidStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes a key, returning the previous value
    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Every entry whose key starts with `prefix`, in key order
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

fn escape(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

pub(crate) fn unescape(segment: &str) -> String {
    segment.replace("%2F", "/").replace("%25", "%")
}

/// `/{group}/`
pub(crate) fn group_root(group: IidGroup) -> String {
    format!("/{}/", group.as_str())
}

/// `/{group}/{connection}/`
pub(crate) fn group_prefix(group: IidGroup, connection: &str) -> String {
    format!("{}{}/", group_root(group), escape(connection))
}

/// `/{group}/{connection}/{parent}/`
pub(crate) fn namespace_prefix(ns: &Namespace) -> String {
    format!(
        "{}{}/",
        group_prefix(ns.group, &ns.connection),
        escape(&ns.parent)
    )
}

pub(crate) fn record_key(ns: &Namespace, name: &str) -> String {
    format!("{}{}", namespace_prefix(ns), escape(name))
}
