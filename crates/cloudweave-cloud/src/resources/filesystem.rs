use super::tag::KeyValue;
use crate::iid::Iid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSystemStatus {
    #[default]
    Creating,
    Available,
    Deleting,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemReqInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub access_subnets: Vec<Iid>,
    #[serde(default)]
    pub nfs_version: String,
    /// Requested capacity in GB, zero lets the provider decide
    #[serde(default)]
    pub capacity_gb: u64,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub access_subnets: Vec<Iid>,
    pub nfs_version: String,
    pub capacity_gb: u64,
    pub used_size_gb: u64,
    pub status: FileSystemStatus,
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}
