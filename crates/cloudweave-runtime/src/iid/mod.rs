//! Identity store
//!
//! Durable mapping `(group, connection, parent) × user name → {generated id,
//! provider id}`. The store itself does no locking; callers serialize writes
//! to one name through the named lock registry.

mod file;
mod generator;
mod manager;
mod memory;
mod record;
mod store;

pub use file::JsonFileStore;
pub use generator::IdGenerator;
pub use manager::IidManager;
pub use memory::MemoryStore;
pub use record::IidRecord;
pub use store::{IidStore, StoreError};

use cloudweave_cloud::ResourceKind;
use std::fmt;

/// Top-level namespace of identity records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IidGroup {
    /// Flat resources, keyed by kind
    Global,
    /// Subnets, keyed by the owning VPC name
    Subnet,
    /// Security groups, keyed by the owning VPC name
    SecurityGroup,
    /// Network load balancers, keyed by the owning VPC name
    Nlb,
}

impl IidGroup {
    pub fn of(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Subnet => IidGroup::Subnet,
            ResourceKind::SecurityGroup => IidGroup::SecurityGroup,
            ResourceKind::Nlb => IidGroup::Nlb,
            _ => IidGroup::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IidGroup::Global => "global",
            IidGroup::Subnet => "subnet",
            IidGroup::SecurityGroup => "sg",
            IidGroup::Nlb => "nlb",
        }
    }

    /// Records of this group live under a parent VPC name
    pub fn is_hierarchical(&self) -> bool {
        !matches!(self, IidGroup::Global)
    }
}

impl fmt::Display for IidGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of one set of identity records
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub group: IidGroup,
    pub connection: String,
    pub parent: String,
}

impl Namespace {
    /// Namespace of a flat resource kind
    pub fn global(connection: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            group: IidGroup::Global,
            connection: connection.into(),
            parent: kind.as_str().to_string(),
        }
    }

    /// Namespace of children of one VPC
    pub fn child(group: IidGroup, connection: impl Into<String>, vpc: impl Into<String>) -> Self {
        Self {
            group,
            connection: connection.into(),
            parent: vpc.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.connection, self.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_of_kind() {
        assert_eq!(IidGroup::of(ResourceKind::Vpc), IidGroup::Global);
        assert_eq!(IidGroup::of(ResourceKind::Vm), IidGroup::Global);
        assert_eq!(IidGroup::of(ResourceKind::Subnet), IidGroup::Subnet);
        assert_eq!(IidGroup::of(ResourceKind::SecurityGroup), IidGroup::SecurityGroup);
        assert_eq!(IidGroup::of(ResourceKind::Nlb), IidGroup::Nlb);
        assert!(!IidGroup::Global.is_hierarchical());
        assert!(IidGroup::Nlb.is_hierarchical());
    }

    #[test]
    fn test_global_namespace_uses_kind_as_parent() {
        let ns = Namespace::global("aws-seoul", ResourceKind::KeyPair);
        assert_eq!(ns.to_string(), "global/aws-seoul/keypair");
    }
}
