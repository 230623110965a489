use super::tag::KeyValue;
use crate::iid::Iid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub direction: RuleDirection,
    /// `tcp`, `udp`, `icmp` or `all`
    pub ip_protocol: String,
    pub from_port: String,
    pub to_port: String,
    pub cidr: String,
}

impl SecurityRule {
    pub fn inbound_tcp(port: u16, cidr: impl Into<String>) -> Self {
        Self {
            direction: RuleDirection::Inbound,
            ip_protocol: "tcp".to_string(),
            from_port: port.to_string(),
            to_port: port.to_string(),
            cidr: cidr.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReqInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub rules: Vec<SecurityRule>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub iid: Iid,
    pub vpc_iid: Iid,
    pub rules: Vec<SecurityRule>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}
