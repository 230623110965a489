use super::tag::KeyValue;
use crate::iid::Iid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub protocol: String,
    pub port: String,
    /// Assigned by the provider
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub dns_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmGroupInfo {
    pub protocol: String,
    pub port: String,
    pub vms: Vec<Iid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckerInfo {
    pub protocol: String,
    pub port: String,
    pub interval: u32,
    pub timeout: u32,
    pub threshold: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlbReqInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub listener: ListenerInfo,
    pub vm_group: VmGroupInfo,
    pub health_checker: HealthCheckerInfo,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlbInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub listener: ListenerInfo,
    pub vm_group: VmGroupInfo,
    pub health_checker: HealthCheckerInfo,
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

/// Health of the VMs behind an NLB
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthInfo {
    pub all_vms: Vec<Iid>,
    pub healthy_vms: Vec<Iid>,
    pub unhealthy_vms: Vec<Iid>,
}
