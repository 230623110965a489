use super::tag::KeyValue;
use crate::iid::Iid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MyImageStatus {
    #[default]
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyImageReqInfo {
    pub iid: Iid,
    pub source_vm: Iid,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyImageInfo {
    pub iid: Iid,
    pub source_vm: Iid,
    pub status: MyImageStatus,
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}
