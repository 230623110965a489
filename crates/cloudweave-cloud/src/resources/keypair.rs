use super::tag::KeyValue;
use crate::iid::Iid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairReqInfo {
    pub iid: Iid,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairInfo {
    pub iid: Iid,
    pub fingerprint: String,
    pub public_key: String,
    /// Only present in the response of a create call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub vm_user_id: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}
