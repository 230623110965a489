//! NLB, file system and tag handlers

use crate::cloud::MockOp;
use crate::driver::MockHandler;
use crate::error::MockError;
use async_trait::async_trait;
use chrono::Utc;
use cloudweave_cloud::{
    FileSystemHandler, FileSystemInfo, FileSystemReqInfo, FileSystemStatus, HealthInfo, Iid,
    KeyValue, NlbHandler, NlbInfo, NlbReqInfo, ResourceKind, Result, TagHandler, TagInfo,
    VmStatus,
};

#[async_trait]
impl NlbHandler for MockHandler {
    async fn create_nlb(&self, req: NlbReqInfo) -> Result<NlbInfo> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Create)?;
        let mut state = self.cloud.state.lock();
        if !state.vpcs.contains_key(&req.vpc_iid.system_id) {
            return Err(MockError::unknown(ResourceKind::Vpc, &req.vpc_iid.system_id).into());
        }
        for vm in &req.vm_group.vms {
            if !state.vms.contains_key(&vm.system_id) {
                return Err(MockError::unknown(ResourceKind::Vm, &vm.system_id).into());
            }
        }

        let id = self.cloud.next_id("nlb");
        let mut listener = req.listener;
        listener.ip = format!("198.51.100.{}", state.nlbs.len() % 250 + 1);
        listener.dns_name = format!("{}.nlb.mock.local", id);
        let mut vm_group = req.vm_group;
        vm_group.vms = vm_group
            .vms
            .into_iter()
            .map(|vm| Iid::system(vm.system_id))
            .collect();

        let info = NlbInfo {
            iid: Iid::system(id.clone()),
            vpc_iid: Iid::system(req.vpc_iid.system_id),
            listener,
            vm_group,
            health_checker: req.health_checker,
            created_time: Some(Utc::now()),
            tags: req.tags,
        };
        state.nlbs.insert(id, info.clone());
        Ok(info)
    }

    async fn list_nlb(&self) -> Result<Vec<NlbInfo>> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::List)?;
        Ok(self.cloud.state.lock().nlbs.values().cloned().collect())
    }

    async fn get_nlb(&self, iid: &Iid) -> Result<NlbInfo> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Get)?;
        self.cloud
            .state
            .lock()
            .nlbs
            .get(&iid.system_id)
            .cloned()
            .ok_or_else(|| MockError::unknown(ResourceKind::Nlb, &iid.system_id).into())
    }

    async fn delete_nlb(&self, iid: &Iid) -> Result<bool> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Delete)?;
        self.cloud
            .state
            .lock()
            .nlbs
            .remove(&iid.system_id)
            .map(|_| true)
            .ok_or_else(|| MockError::unknown(ResourceKind::Nlb, &iid.system_id).into())
    }

    async fn add_vms(&self, nlb: &Iid, vms: &[Iid]) -> Result<NlbInfo> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        for vm in vms {
            if !state.vms.contains_key(&vm.system_id) {
                return Err(MockError::unknown(ResourceKind::Vm, &vm.system_id).into());
            }
        }
        let info = state
            .nlbs
            .get_mut(&nlb.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Nlb, &nlb.system_id))?;
        for vm in vms {
            if !info.vm_group.vms.iter().any(|v| v.system_id == vm.system_id) {
                info.vm_group.vms.push(Iid::system(vm.system_id.clone()));
            }
        }
        Ok(info.clone())
    }

    async fn remove_vms(&self, nlb: &Iid, vms: &[Iid]) -> Result<bool> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        let info = state
            .nlbs
            .get_mut(&nlb.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Nlb, &nlb.system_id))?;
        info.vm_group
            .vms
            .retain(|v| !vms.iter().any(|r| r.system_id == v.system_id));
        Ok(true)
    }

    async fn get_vm_group_health(&self, nlb: &Iid) -> Result<HealthInfo> {
        self.cloud.check_fault(ResourceKind::Nlb, MockOp::Get)?;
        let state = self.cloud.state.lock();
        let info = state
            .nlbs
            .get(&nlb.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Nlb, &nlb.system_id))?;

        let mut health = HealthInfo::default();
        for vm in &info.vm_group.vms {
            let running = state
                .vms
                .get(&vm.system_id)
                .is_some_and(|v| v.status == VmStatus::Running);
            health.all_vms.push(vm.clone());
            if running {
                health.healthy_vms.push(vm.clone());
            } else {
                health.unhealthy_vms.push(vm.clone());
            }
        }
        Ok(health)
    }
}

#[async_trait]
impl FileSystemHandler for MockHandler {
    async fn create_file_system(&self, req: FileSystemReqInfo) -> Result<FileSystemInfo> {
        self.cloud
            .check_fault(ResourceKind::FileSystem, MockOp::Create)?;
        let mut state = self.cloud.state.lock();
        let vpc = state
            .vpcs
            .get(&req.vpc_iid.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Vpc, &req.vpc_iid.system_id))?;
        for subnet in &req.access_subnets {
            if !vpc.subnets.iter().any(|s| s.iid.system_id == subnet.system_id) {
                return Err(MockError::unknown(ResourceKind::Subnet, &subnet.system_id).into());
            }
        }

        let info = FileSystemInfo {
            iid: Iid::system(self.cloud.next_id("fs")),
            vpc_iid: Iid::system(req.vpc_iid.system_id),
            access_subnets: req
                .access_subnets
                .into_iter()
                .map(|s| Iid::system(s.system_id))
                .collect(),
            nfs_version: if req.nfs_version.is_empty() {
                "4.1".to_string()
            } else {
                req.nfs_version
            },
            capacity_gb: req.capacity_gb,
            used_size_gb: 0,
            status: FileSystemStatus::Available,
            created_time: Some(Utc::now()),
            tags: req.tags,
        };
        state
            .file_systems
            .insert(info.iid.system_id.clone(), info.clone());
        Ok(info)
    }

    async fn list_file_system(&self) -> Result<Vec<FileSystemInfo>> {
        self.cloud
            .check_fault(ResourceKind::FileSystem, MockOp::List)?;
        Ok(self
            .cloud
            .state
            .lock()
            .file_systems
            .values()
            .cloned()
            .collect())
    }

    async fn get_file_system(&self, iid: &Iid) -> Result<FileSystemInfo> {
        self.cloud.check_fault(ResourceKind::FileSystem, MockOp::Get)?;
        self.cloud
            .state
            .lock()
            .file_systems
            .get(&iid.system_id)
            .cloned()
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &iid.system_id).into())
    }

    async fn delete_file_system(&self, iid: &Iid) -> Result<bool> {
        self.cloud
            .check_fault(ResourceKind::FileSystem, MockOp::Delete)?;
        self.cloud
            .state
            .lock()
            .file_systems
            .remove(&iid.system_id)
            .map(|_| true)
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &iid.system_id).into())
    }

    async fn add_access_subnet(&self, fs: &Iid, subnet: &Iid) -> Result<FileSystemInfo> {
        self.cloud
            .check_fault(ResourceKind::FileSystem, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        let vpc_id = state
            .file_systems
            .get(&fs.system_id)
            .map(|f| f.vpc_iid.system_id.clone())
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &fs.system_id))?;
        let known = state
            .vpcs
            .get(&vpc_id)
            .is_some_and(|v| v.subnets.iter().any(|s| s.iid.system_id == subnet.system_id));
        if !known {
            return Err(MockError::unknown(ResourceKind::Subnet, &subnet.system_id).into());
        }
        let info = state
            .file_systems
            .get_mut(&fs.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &fs.system_id))?;
        if !info
            .access_subnets
            .iter()
            .any(|s| s.system_id == subnet.system_id)
        {
            info.access_subnets.push(Iid::system(subnet.system_id.clone()));
        }
        Ok(info.clone())
    }

    async fn remove_access_subnet(&self, fs: &Iid, subnet: &Iid) -> Result<bool> {
        self.cloud
            .check_fault(ResourceKind::FileSystem, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        let info = state
            .file_systems
            .get_mut(&fs.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &fs.system_id))?;
        let before = info.access_subnets.len();
        info.access_subnets
            .retain(|s| s.system_id != subnet.system_id);
        if before == info.access_subnets.len() {
            return Err(MockError::unknown(ResourceKind::Subnet, &subnet.system_id).into());
        }
        Ok(true)
    }

    async fn list_access_subnet(&self, fs: &Iid) -> Result<Vec<Iid>> {
        self.cloud.check_fault(ResourceKind::FileSystem, MockOp::Get)?;
        self.cloud
            .state
            .lock()
            .file_systems
            .get(&fs.system_id)
            .map(|f| f.access_subnets.clone())
            .ok_or_else(|| MockError::unknown(ResourceKind::FileSystem, &fs.system_id).into())
    }
}

#[async_trait]
impl TagHandler for MockHandler {
    async fn add_tag(&self, kind: ResourceKind, iid: &Iid, tag: KeyValue) -> Result<KeyValue> {
        let mut state = self.cloud.state.lock();
        if !state.exists(kind, &iid.system_id) {
            return Err(MockError::unknown(kind, &iid.system_id).into());
        }
        let tags = state
            .tags
            .entry((kind, iid.system_id.clone()))
            .or_default();
        tags.retain(|t| t.key != tag.key);
        tags.push(tag.clone());
        Ok(tag)
    }

    async fn list_tag(&self, kind: ResourceKind, iid: &Iid) -> Result<Vec<KeyValue>> {
        let state = self.cloud.state.lock();
        if !state.exists(kind, &iid.system_id) {
            return Err(MockError::unknown(kind, &iid.system_id).into());
        }
        Ok(state
            .tags
            .get(&(kind, iid.system_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_tag(&self, kind: ResourceKind, iid: &Iid, key: &str) -> Result<KeyValue> {
        let state = self.cloud.state.lock();
        state
            .tags
            .get(&(kind, iid.system_id.clone()))
            .and_then(|tags| tags.iter().find(|t| t.key == key))
            .cloned()
            .ok_or_else(|| {
                MockError::unknown(kind, format!("{} tag {}", iid.system_id, key)).into()
            })
    }

    async fn remove_tag(&self, kind: ResourceKind, iid: &Iid, key: &str) -> Result<bool> {
        let mut state = self.cloud.state.lock();
        let tags = state
            .tags
            .get_mut(&(kind, iid.system_id.clone()))
            .ok_or_else(|| MockError::unknown(kind, &iid.system_id))?;
        let before = tags.len();
        tags.retain(|t| t.key != key);
        Ok(before != tags.len())
    }

    async fn find_tag(&self, kind: ResourceKind, keyword: &str) -> Result<Vec<TagInfo>> {
        let state = self.cloud.state.lock();
        let mut found: Vec<TagInfo> = state
            .tags
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .filter(|(_, tags)| {
                keyword.is_empty()
                    || tags
                        .iter()
                        .any(|t| t.key.contains(keyword) || t.value.contains(keyword))
            })
            .map(|((k, id), tags)| TagInfo {
                resource_kind: *k,
                resource_iid: Iid::system(id.clone()),
                tags: tags.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.resource_iid.system_id.cmp(&b.resource_iid.system_id));
        Ok(found)
    }
}
