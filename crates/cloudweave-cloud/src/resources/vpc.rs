use super::tag::KeyValue;
use crate::iid::Iid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub iid: Iid,
    #[serde(default)]
    pub zone: String,
    pub ipv4_cidr: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

impl SubnetInfo {
    pub fn new(iid: Iid, ipv4_cidr: impl Into<String>) -> Self {
        Self {
            iid,
            ipv4_cidr: ipv4_cidr.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcReqInfo {
    pub iid: Iid,
    pub ipv4_cidr: String,
    pub subnets: Vec<SubnetInfo>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcInfo {
    pub iid: Iid,
    pub ipv4_cidr: String,
    pub subnets: Vec<SubnetInfo>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    /// Provider-specific attributes
    #[serde(default)]
    pub key_values: Vec<KeyValue>,
}
