//! Three-way diff between tracked and live resources

use crate::iid::IidRecord;
use cloudweave_cloud::Iid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tracked resources split by whether the provider still has them
///
/// All three lists are always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllResourceList {
    /// Tracked and live, as user IIDs
    #[serde(rename = "MappedList")]
    pub mapped: Vec<Iid>,

    /// Tracked but gone from the provider, as user IIDs
    #[serde(rename = "OnlySpiderList")]
    pub only_tracked: Vec<Iid>,

    /// Live but never registered, as provider IIDs
    #[serde(rename = "OnlyCSPList")]
    pub only_provider: Vec<Iid>,
}

impl AllResourceList {
    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty() && self.only_tracked.is_empty() && self.only_provider.is_empty()
    }
}

/// Classifies `tracked` against `live` by provider id
///
/// Each tracked record lands in exactly one of `mapped` and `only_tracked`.
/// A live id is reported at most once.
pub fn classify(tracked: &[IidRecord], live: &[Iid]) -> AllResourceList {
    let live_ids: HashSet<&str> = live.iter().map(|iid| iid.system_id.as_str()).collect();

    let mut result = AllResourceList::default();
    let mut mapped_ids = HashSet::new();
    for record in tracked {
        if live_ids.contains(record.system_id.as_str()) {
            mapped_ids.insert(record.system_id.as_str());
            result.mapped.push(record.user_iid());
        } else {
            result.only_tracked.push(record.user_iid());
        }
    }

    let mut seen = HashSet::new();
    for iid in live {
        let id = iid.system_id.as_str();
        if !mapped_ids.contains(id) && seen.insert(id) {
            result.only_provider.push(iid.clone());
        }
    }
    result
}
