use super::tag::KeyValue;
use crate::iid::Iid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub region: String,
    pub zone: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Public,
    My,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Linux,
    Windows,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmReqInfo {
    pub iid: Iid,
    pub image_type: ImageType,
    pub image_iid: Iid,
    pub vpc_iid: Iid,
    pub subnet_iid: Iid,
    pub security_group_iids: Vec<Iid>,
    pub vm_spec_name: String,
    pub key_pair_iid: Iid,
    #[serde(default)]
    pub root_disk_type: String,
    #[serde(default)]
    pub root_disk_size: String,
    #[serde(default)]
    pub data_disk_iids: Vec<Iid>,
    #[serde(default)]
    pub vm_user_id: String,
    #[serde(default, skip_serializing)]
    pub vm_user_passwd: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    pub iid: Iid,
    pub start_time: Option<DateTime<Utc>>,
    pub region: RegionInfo,
    pub image_type: ImageType,
    pub image_iid: Iid,
    pub vm_spec_name: String,
    pub vpc_iid: Iid,
    pub subnet_iid: Iid,
    pub security_group_iids: Vec<Iid>,
    pub key_pair_iid: Iid,
    pub root_disk_type: String,
    pub root_disk_size: String,
    pub data_disk_iids: Vec<Iid>,
    pub vm_user_id: String,
    pub platform: Platform,
    pub public_ip: String,
    pub private_ip: String,
    /// `ip:port` used for the readiness probe and for SSH access
    pub ssh_access_point: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

/// Lifecycle status of a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmStatus {
    Creating,
    Running,
    Suspending,
    Suspended,
    Resuming,
    Rebooting,
    Terminating,
    Terminated,
    NotExist,
    Failed,
}

impl VmStatus {
    /// The VM is gone or going away for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, VmStatus::Terminated | VmStatus::NotExist)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VmStatus::Creating => "Creating",
            VmStatus::Running => "Running",
            VmStatus::Suspending => "Suspending",
            VmStatus::Suspended => "Suspended",
            VmStatus::Resuming => "Resuming",
            VmStatus::Rebooting => "Rebooting",
            VmStatus::Terminating => "Terminating",
            VmStatus::Terminated => "Terminated",
            VmStatus::NotExist => "NotExist",
            VmStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatusInfo {
    pub iid: Iid,
    pub status: VmStatus,
}

/// Power control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmControl {
    Suspend,
    Resume,
    Reboot,
}
