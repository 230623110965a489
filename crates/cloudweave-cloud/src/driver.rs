//! Driver contract
//!
//! A driver exposes one handler per resource kind. Every handler receives
//! driver IIDs (generated id plus provider id) and answers with info
//! structures whose IIDs carry the provider id only.

use crate::error::{DriverError, Result};
use crate::iid::Iid;
use crate::kind::ResourceKind;
use crate::resources::*;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait VpcHandler: Send + Sync {
    async fn create_vpc(&self, req: VpcReqInfo) -> Result<VpcInfo>;
    async fn list_vpc(&self) -> Result<Vec<VpcInfo>>;
    async fn get_vpc(&self, iid: &Iid) -> Result<VpcInfo>;
    async fn delete_vpc(&self, iid: &Iid) -> Result<bool>;
    async fn add_subnet(&self, vpc: &Iid, subnet: SubnetInfo) -> Result<VpcInfo>;
    async fn remove_subnet(&self, vpc: &Iid, subnet: &Iid) -> Result<bool>;

    /// IIDs of every VPC visible to the connection
    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_vpc().await?.into_iter().map(|v| v.iid).collect())
    }
}

#[async_trait]
pub trait SecurityHandler: Send + Sync {
    async fn create_security(&self, req: SecurityReqInfo) -> Result<SecurityInfo>;
    async fn list_security(&self) -> Result<Vec<SecurityInfo>>;
    async fn get_security(&self, iid: &Iid) -> Result<SecurityInfo>;
    async fn delete_security(&self, iid: &Iid) -> Result<bool>;
    async fn add_rules(&self, sg: &Iid, rules: Vec<SecurityRule>) -> Result<SecurityInfo>;
    async fn remove_rules(&self, sg: &Iid, rules: &[SecurityRule]) -> Result<bool>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_security().await?.into_iter().map(|s| s.iid).collect())
    }
}

#[async_trait]
pub trait KeyPairHandler: Send + Sync {
    async fn create_key(&self, req: KeyPairReqInfo) -> Result<KeyPairInfo>;
    async fn list_key(&self) -> Result<Vec<KeyPairInfo>>;
    async fn get_key(&self, iid: &Iid) -> Result<KeyPairInfo>;
    async fn delete_key(&self, iid: &Iid) -> Result<bool>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_key().await?.into_iter().map(|k| k.iid).collect())
    }
}

#[async_trait]
pub trait VmHandler: Send + Sync {
    async fn start_vm(&self, req: VmReqInfo) -> Result<VmInfo>;
    async fn suspend_vm(&self, iid: &Iid) -> Result<VmStatus>;
    async fn resume_vm(&self, iid: &Iid) -> Result<VmStatus>;
    async fn reboot_vm(&self, iid: &Iid) -> Result<VmStatus>;
    async fn terminate_vm(&self, iid: &Iid) -> Result<VmStatus>;
    async fn list_vm_status(&self) -> Result<Vec<VmStatusInfo>>;
    async fn get_vm_status(&self, iid: &Iid) -> Result<VmStatus>;
    async fn list_vm(&self) -> Result<Vec<VmInfo>>;
    async fn get_vm(&self, iid: &Iid) -> Result<VmInfo>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_vm().await?.into_iter().map(|v| v.iid).collect())
    }
}

#[async_trait]
pub trait DiskHandler: Send + Sync {
    async fn create_disk(&self, req: DiskReqInfo) -> Result<DiskInfo>;
    async fn list_disk(&self) -> Result<Vec<DiskInfo>>;
    async fn get_disk(&self, iid: &Iid) -> Result<DiskInfo>;
    async fn change_disk_size(&self, iid: &Iid, size_gb: u64) -> Result<bool>;
    async fn delete_disk(&self, iid: &Iid) -> Result<bool>;
    async fn attach_disk(&self, disk: &Iid, vm: &Iid) -> Result<DiskInfo>;
    async fn detach_disk(&self, disk: &Iid, vm: &Iid) -> Result<bool>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_disk().await?.into_iter().map(|d| d.iid).collect())
    }
}

#[async_trait]
pub trait MyImageHandler: Send + Sync {
    async fn snapshot_vm(&self, req: MyImageReqInfo) -> Result<MyImageInfo>;
    async fn list_my_image(&self) -> Result<Vec<MyImageInfo>>;
    async fn get_my_image(&self, iid: &Iid) -> Result<MyImageInfo>;
    async fn delete_my_image(&self, iid: &Iid) -> Result<bool>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_my_image().await?.into_iter().map(|i| i.iid).collect())
    }
}

#[async_trait]
pub trait NlbHandler: Send + Sync {
    async fn create_nlb(&self, req: NlbReqInfo) -> Result<NlbInfo>;
    async fn list_nlb(&self) -> Result<Vec<NlbInfo>>;
    async fn get_nlb(&self, iid: &Iid) -> Result<NlbInfo>;
    async fn delete_nlb(&self, iid: &Iid) -> Result<bool>;
    async fn add_vms(&self, nlb: &Iid, vms: &[Iid]) -> Result<NlbInfo>;
    async fn remove_vms(&self, nlb: &Iid, vms: &[Iid]) -> Result<bool>;
    async fn get_vm_group_health(&self, nlb: &Iid) -> Result<HealthInfo>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self.list_nlb().await?.into_iter().map(|n| n.iid).collect())
    }
}

#[async_trait]
pub trait TagHandler: Send + Sync {
    async fn add_tag(&self, kind: ResourceKind, iid: &Iid, tag: KeyValue) -> Result<KeyValue>;
    async fn list_tag(&self, kind: ResourceKind, iid: &Iid) -> Result<Vec<KeyValue>>;
    async fn get_tag(&self, kind: ResourceKind, iid: &Iid, key: &str) -> Result<KeyValue>;
    async fn remove_tag(&self, kind: ResourceKind, iid: &Iid, key: &str) -> Result<bool>;

    /// Resources of `kind` with a tag key or value containing `keyword`
    async fn find_tag(&self, kind: ResourceKind, keyword: &str) -> Result<Vec<TagInfo>>;
}

#[async_trait]
pub trait FileSystemHandler: Send + Sync {
    async fn create_file_system(&self, req: FileSystemReqInfo) -> Result<FileSystemInfo>;
    async fn list_file_system(&self) -> Result<Vec<FileSystemInfo>>;
    async fn get_file_system(&self, iid: &Iid) -> Result<FileSystemInfo>;
    async fn delete_file_system(&self, iid: &Iid) -> Result<bool>;
    async fn add_access_subnet(&self, fs: &Iid, subnet: &Iid) -> Result<FileSystemInfo>;
    async fn remove_access_subnet(&self, fs: &Iid, subnet: &Iid) -> Result<bool>;
    async fn list_access_subnet(&self, fs: &Iid) -> Result<Vec<Iid>>;

    async fn list_iid(&self) -> Result<Vec<Iid>> {
        Ok(self
            .list_file_system()
            .await?
            .into_iter()
            .map(|f| f.iid)
            .collect())
    }
}

/// Static facts about a driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverCapability {
    /// The provider allows only one VPC per connection
    pub single_vpc: bool,
}

/// A live driver bound to one connection
///
/// Handlers a driver does not provide fall back to [`DriverError::Unsupported`].
pub trait CloudDriver: Send + Sync {
    /// Returns the provider name (e.g., "AWS", "MOCK")
    fn provider_name(&self) -> &str;

    fn capability(&self) -> DriverCapability {
        DriverCapability::default()
    }

    fn vpc_handler(&self) -> Result<Arc<dyn VpcHandler>> {
        Err(DriverError::Unsupported("vpc handler".into()))
    }

    fn security_handler(&self) -> Result<Arc<dyn SecurityHandler>> {
        Err(DriverError::Unsupported("security handler".into()))
    }

    fn keypair_handler(&self) -> Result<Arc<dyn KeyPairHandler>> {
        Err(DriverError::Unsupported("keypair handler".into()))
    }

    fn vm_handler(&self) -> Result<Arc<dyn VmHandler>> {
        Err(DriverError::Unsupported("vm handler".into()))
    }

    fn disk_handler(&self) -> Result<Arc<dyn DiskHandler>> {
        Err(DriverError::Unsupported("disk handler".into()))
    }

    fn myimage_handler(&self) -> Result<Arc<dyn MyImageHandler>> {
        Err(DriverError::Unsupported("myimage handler".into()))
    }

    fn nlb_handler(&self) -> Result<Arc<dyn NlbHandler>> {
        Err(DriverError::Unsupported("nlb handler".into()))
    }

    fn tag_handler(&self) -> Result<Arc<dyn TagHandler>> {
        Err(DriverError::Unsupported("tag handler".into()))
    }

    fn filesystem_handler(&self) -> Result<Arc<dyn FileSystemHandler>> {
        Err(DriverError::Unsupported("filesystem handler".into()))
    }
}

/// Builds drivers for one provider
pub trait DriverFactory: Send + Sync {
    /// Provider name this factory serves (e.g., "AWS", "MOCK")
    fn provider_name(&self) -> &str;

    /// Connects to the provider for `connection` in `region`
    fn connect(&self, connection: &str, region: &RegionInfo) -> Result<Arc<dyn CloudDriver>>;
}

/// Resolves connection names to drivers
#[async_trait]
pub trait DriverGateway: Send + Sync {
    /// Returns a driver bound to `connection`
    async fn resolve(&self, connection: &str) -> Result<Arc<dyn CloudDriver>>;

    /// Provider name configured for `connection`
    fn provider_name(&self, connection: &str) -> Result<String>;

    /// Region and zone configured for `connection`
    fn region(&self, connection: &str) -> Result<RegionInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyDriver;

    impl CloudDriver for EmptyDriver {
        fn provider_name(&self) -> &str {
            "EMPTY"
        }
    }

    #[test]
    fn test_default_handlers_are_unsupported() {
        let driver = EmptyDriver;
        assert!(matches!(driver.vpc_handler(), Err(DriverError::Unsupported(_))));
        assert!(matches!(driver.tag_handler(), Err(DriverError::Unsupported(_))));
        assert!(!driver.capability().single_vpc);
    }
}
