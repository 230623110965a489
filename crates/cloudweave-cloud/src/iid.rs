//! Identifier pair shared by the runtime and every driver

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier pair of a resource
///
/// The same shape is used in two directions. Toward callers `name_id` holds
/// the user name; toward drivers it holds the generated id. Drivers fill
/// `system_id` with the provider-native id and leave `name_id` empty when
/// they report resources they did not create through the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Iid {
    #[serde(rename = "NameId")]
    pub name_id: String,

    #[serde(rename = "SystemId")]
    pub system_id: String,
}

impl Iid {
    pub fn new(name_id: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            name_id: name_id.into(),
            system_id: system_id.into(),
        }
    }

    /// IID addressed by name only
    pub fn named(name_id: impl Into<String>) -> Self {
        Self::new(name_id, "")
    }

    /// IID addressed by provider id only
    pub fn system(system_id: impl Into<String>) -> Self {
        Self::new("", system_id)
    }

    pub fn is_empty(&self) -> bool {
        self.name_id.is_empty() && self.system_id.is_empty()
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.name_id, self.system_id)
    }
}
