use super::tag::KeyValue;
use crate::iid::Iid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskStatus {
    #[default]
    Creating,
    Available,
    Attached,
    Deleting,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskReqInfo {
    pub iid: Iid,
    #[serde(default)]
    pub zone: String,
    pub disk_type: String,
    /// Size in GB
    pub disk_size: u64,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub iid: Iid,
    pub zone: String,
    pub disk_type: String,
    pub disk_size: u64,
    pub status: DiskStatus,
    /// VM the disk is attached to
    pub owner_vm: Option<Iid>,
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}
