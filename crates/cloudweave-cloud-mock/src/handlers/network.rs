//! VPC, subnet and security group handlers

use crate::cloud::MockOp;
use crate::driver::MockHandler;
use crate::error::MockError;
use async_trait::async_trait;
use cloudweave_cloud::{
    Iid, ResourceKind, Result, SecurityHandler, SecurityInfo, SecurityReqInfo, SecurityRule,
    SubnetInfo, VpcHandler, VpcInfo, VpcReqInfo,
};

#[async_trait]
impl VpcHandler for MockHandler {
    async fn create_vpc(&self, req: VpcReqInfo) -> Result<VpcInfo> {
        self.cloud.check_fault(ResourceKind::Vpc, MockOp::Create)?;
        if req.ipv4_cidr.trim().is_empty() {
            return Err(MockError::InvalidRequest("VPC CIDR is empty".into()).into());
        }

        let mut state = self.cloud.state.lock();
        if self.cloud.options().single_vpc && !state.vpcs.is_empty() {
            return Err(MockError::InvalidRequest("only one VPC is allowed".into()).into());
        }

        let zone = self.cloud.region().zone.clone();
        let subnets = req
            .subnets
            .into_iter()
            .map(|s| SubnetInfo {
                iid: Iid::system(self.cloud.next_id("subnet")),
                zone: if s.zone.is_empty() { zone.clone() } else { s.zone },
                ipv4_cidr: s.ipv4_cidr,
                tags: s.tags,
            })
            .collect();

        let info = VpcInfo {
            iid: Iid::system(self.cloud.next_id("vpc")),
            ipv4_cidr: req.ipv4_cidr,
            subnets,
            tags: req.tags,
            key_values: Vec::new(),
        };
        tracing::info!("Creating vpc: {} -> {}", req.iid.name_id, info.iid.system_id);
        state.vpcs.insert(info.iid.system_id.clone(), info.clone());
        Ok(info)
    }

    async fn list_vpc(&self) -> Result<Vec<VpcInfo>> {
        self.cloud.check_fault(ResourceKind::Vpc, MockOp::List)?;
        Ok(self.cloud.state.lock().vpcs.values().cloned().collect())
    }

    async fn get_vpc(&self, iid: &Iid) -> Result<VpcInfo> {
        self.cloud.check_fault(ResourceKind::Vpc, MockOp::Get)?;
        self.cloud
            .state
            .lock()
            .vpcs
            .get(&iid.system_id)
            .cloned()
            .ok_or_else(|| MockError::unknown(ResourceKind::Vpc, &iid.system_id).into())
    }

    async fn delete_vpc(&self, iid: &Iid) -> Result<bool> {
        self.cloud.check_fault(ResourceKind::Vpc, MockOp::Delete)?;
        let mut state = self.cloud.state.lock();
        if !state.vpcs.contains_key(&iid.system_id) {
            return Err(MockError::unknown(ResourceKind::Vpc, &iid.system_id).into());
        }
        let used_by_sg = state
            .security_groups
            .values()
            .any(|sg| sg.vpc_iid.system_id == iid.system_id);
        let used_by_vm = state
            .vms
            .values()
            .any(|vm| vm.info.vpc_iid.system_id == iid.system_id);
        if used_by_sg || used_by_vm {
            return Err(MockError::InUse {
                kind: ResourceKind::Vpc,
                id: iid.system_id.clone(),
                reason: "dependent resources exist".into(),
            }
            .into());
        }
        tracing::info!("Deleting vpc: {}", iid.system_id);
        state.vpcs.remove(&iid.system_id);
        Ok(true)
    }

    async fn add_subnet(&self, vpc: &Iid, subnet: SubnetInfo) -> Result<VpcInfo> {
        self.cloud.check_fault(ResourceKind::Subnet, MockOp::Create)?;
        let zone = self.cloud.region().zone.clone();
        let mut state = self.cloud.state.lock();
        let info = state
            .vpcs
            .get_mut(&vpc.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Vpc, &vpc.system_id))?;
        info.subnets.push(SubnetInfo {
            iid: Iid::system(self.cloud.next_id("subnet")),
            zone: if subnet.zone.is_empty() { zone } else { subnet.zone },
            ipv4_cidr: subnet.ipv4_cidr,
            tags: subnet.tags,
        });
        Ok(info.clone())
    }

    async fn remove_subnet(&self, vpc: &Iid, subnet: &Iid) -> Result<bool> {
        self.cloud.check_fault(ResourceKind::Subnet, MockOp::Delete)?;
        let mut state = self.cloud.state.lock();
        let info = state
            .vpcs
            .get_mut(&vpc.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::Vpc, &vpc.system_id))?;
        let before = info.subnets.len();
        info.subnets.retain(|s| s.iid.system_id != subnet.system_id);
        if before == info.subnets.len() {
            return Err(MockError::unknown(ResourceKind::Subnet, &subnet.system_id).into());
        }
        Ok(true)
    }
}

#[async_trait]
impl SecurityHandler for MockHandler {
    async fn create_security(&self, req: SecurityReqInfo) -> Result<SecurityInfo> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::Create)?;
        let mut state = self.cloud.state.lock();
        if !state.vpcs.contains_key(&req.vpc_iid.system_id) {
            return Err(MockError::unknown(ResourceKind::Vpc, &req.vpc_iid.system_id).into());
        }
        let info = SecurityInfo {
            iid: Iid::system(self.cloud.next_id("sg")),
            vpc_iid: Iid::system(req.vpc_iid.system_id),
            rules: req.rules,
            tags: req.tags,
        };
        tracing::info!(
            "Creating security group: {} -> {}",
            req.iid.name_id,
            info.iid.system_id
        );
        state
            .security_groups
            .insert(info.iid.system_id.clone(), info.clone());
        Ok(info)
    }

    async fn list_security(&self) -> Result<Vec<SecurityInfo>> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::List)?;
        Ok(self
            .cloud
            .state
            .lock()
            .security_groups
            .values()
            .cloned()
            .collect())
    }

    async fn get_security(&self, iid: &Iid) -> Result<SecurityInfo> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::Get)?;
        self.cloud
            .state
            .lock()
            .security_groups
            .get(&iid.system_id)
            .cloned()
            .ok_or_else(|| MockError::unknown(ResourceKind::SecurityGroup, &iid.system_id).into())
    }

    async fn delete_security(&self, iid: &Iid) -> Result<bool> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::Delete)?;
        let mut state = self.cloud.state.lock();
        let in_use = state.vms.values().any(|vm| {
            vm.info
                .security_group_iids
                .iter()
                .any(|sg| sg.system_id == iid.system_id)
        });
        if in_use {
            return Err(MockError::InUse {
                kind: ResourceKind::SecurityGroup,
                id: iid.system_id.clone(),
                reason: "attached to a VM".into(),
            }
            .into());
        }
        state
            .security_groups
            .remove(&iid.system_id)
            .map(|_| true)
            .ok_or_else(|| MockError::unknown(ResourceKind::SecurityGroup, &iid.system_id).into())
    }

    async fn add_rules(&self, sg: &Iid, rules: Vec<SecurityRule>) -> Result<SecurityInfo> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        let info = state
            .security_groups
            .get_mut(&sg.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::SecurityGroup, &sg.system_id))?;
        for rule in rules {
            if !info.rules.contains(&rule) {
                info.rules.push(rule);
            }
        }
        Ok(info.clone())
    }

    async fn remove_rules(&self, sg: &Iid, rules: &[SecurityRule]) -> Result<bool> {
        self.cloud
            .check_fault(ResourceKind::SecurityGroup, MockOp::Update)?;
        let mut state = self.cloud.state.lock();
        let info = state
            .security_groups
            .get_mut(&sg.system_id)
            .ok_or_else(|| MockError::unknown(ResourceKind::SecurityGroup, &sg.system_id))?;
        info.rules.retain(|r| !rules.contains(r));
        Ok(true)
    }
}
