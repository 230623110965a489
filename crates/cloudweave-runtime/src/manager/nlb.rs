//! Network load balancer operations
//!
//! Records live in the NLB group under the owning VPC's user name. Member
//! VMs are referenced by user name and resolved to driver ids per call.

use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{HealthInfo, Iid, NlbHandler, NlbInfo, NlbReqInfo, ResourceKind};
use std::sync::Arc;

const KIND: ResourceKind = ResourceKind::Nlb;

fn check_vm_names(vms: &[Iid]) -> Result<Vec<String>> {
    vms.iter()
        .map(|vm| check_input("vm name", &vm.name_id))
        .collect()
}

impl CloudRuntime {
    pub async fn create_nlb(&self, connection: &str, req: NlbReqInfo) -> Result<NlbInfo> {
        let name = check_input("nlb name", &req.iid.name_id)?;
        let vpc_name = check_input("vpc name", &req.vpc_iid.name_id)?;
        let vm_names = check_vm_names(&req.vm_group.vms)?;
        tracing::info!("Creating NLB {} in VPC {} on {}", name, vpc_name, connection);

        let provider = self.connect(connection).await?;
        let _vpc_lock = self.locks.vpc.rlock(connection, &vpc_name).await;
        let _lock = self.locks.nlb.lock(connection, &name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = self.iids.get(&vpc_ns, &vpc_name).await?;
        self.ensure_absent_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        let vms = self.resolve_vms(connection, &vm_names).await?;

        let nlb_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.nlb()?;
        let mut vm_group = req.vm_group;
        vm_group.vms = vms;
        let driver_req = NlbReqInfo {
            iid: Iid::named(&nlb_id),
            vpc_iid: vpc_record.driver_iid(),
            listener: req.listener,
            vm_group,
            health_checker: req.health_checker,
            tags: req.tags,
        };
        let info = provider
            .call(KIND, &name, "create_nlb", handler.create_nlb(driver_req))
            .await?;
        let nlb_iid = Iid::new(&nlb_id, &info.iid.system_id);

        let nlb_ns = Namespace::child(IidGroup::Nlb, connection, &vpc_name);
        let record = self
            .persist_or_rollback(
                &nlb_ns,
                IidRecord::new(&name, &nlb_id, &info.iid.system_id),
                delete_provider_nlb(&provider, &handler, &name, &nlb_iid),
            )
            .await?;

        self.translate_nlb(connection, &record, &vpc_record, info)
            .await
    }

    /// Driver IIDs of tracked VMs, in the given order
    async fn resolve_vms(&self, connection: &str, names: &[String]) -> Result<Vec<Iid>> {
        let vm_ns = Namespace::global(connection, ResourceKind::Vm);
        let mut vms = Vec::with_capacity(names.len());
        for name in names {
            vms.push(self.iids.get(&vm_ns, name).await?.driver_iid());
        }
        Ok(vms)
    }

    async fn translate_nlb(
        &self,
        connection: &str,
        record: &IidRecord,
        vpc_record: &IidRecord,
        mut info: NlbInfo,
    ) -> Result<NlbInfo> {
        info.iid = record.user_iid();
        info.vpc_iid = vpc_record.user_iid();
        let vm_ns = Namespace::global(connection, ResourceKind::Vm);
        info.vm_group.vms = self.to_user_iids(&vm_ns, &info.vm_group.vms).await?;
        Ok(info)
    }

    async fn fetch_nlb(
        &self,
        provider: &Provider,
        connection: &str,
        ns: Namespace,
        record: IidRecord,
    ) -> Result<NlbInfo> {
        let handler = provider.nlb()?;
        let info = provider
            .call(KIND, &record.name, "get_nlb", handler.get_nlb(&record.driver_iid()))
            .await?;
        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = match self.iids.get(&vpc_ns, &ns.parent).await {
            Ok(vpc_record) => vpc_record,
            Err(err) if err.is_not_found() => {
                let vpc = self.to_user_iid(&vpc_ns, &info.vpc_iid).await?;
                IidRecord::new(&vpc.name_id, "", &vpc.system_id)
            }
            Err(err) => return Err(err),
        };
        self.translate_nlb(connection, &record, &vpc_record, info)
            .await
    }

    pub async fn list_nlb(&self, connection: &str) -> Result<Vec<NlbInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list_group(IidGroup::Nlb, connection).await?;
        fan_out(records, |(ns, record)| {
            self.fetch_nlb(&provider, connection, ns, record)
        })
        .await
    }

    pub async fn get_nlb(&self, connection: &str, name: &str) -> Result<NlbInfo> {
        let name = check_input("nlb name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.nlb.rlock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        self.fetch_nlb(&provider, connection, ns, record).await
    }

    pub async fn delete_nlb(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("nlb name", name)?;
        tracing::info!("Deleting NLB {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.nlb.lock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        let result = match provider.nlb() {
            Ok(handler) => {
                delete_provider_nlb(&provider, &handler, &name, &record.driver_iid()).await
            }
            Err(err) => Err(err),
        };

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }

    /// Adds tracked VMs to the NLB's VM group
    pub async fn add_vms(&self, connection: &str, name: &str, vms: &[Iid]) -> Result<NlbInfo> {
        let name = check_input("nlb name", name)?;
        let vm_names = check_vm_names(vms)?;
        if vm_names.is_empty() {
            return Err(RuntimeError::InvalidInput("no VMs given".to_string()));
        }
        tracing::info!("Adding {} VMs to NLB {} on {}", vm_names.len(), name, connection);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.nlb.lock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        let members = self.resolve_vms(connection, &vm_names).await?;
        let handler = provider.nlb()?;
        provider
            .call(KIND, &name, "add_vms", handler.add_vms(&record.driver_iid(), &members))
            .await?;
        self.fetch_nlb(&provider, connection, ns, record).await
    }

    pub async fn remove_vms(&self, connection: &str, name: &str, vms: &[Iid]) -> Result<bool> {
        let name = check_input("nlb name", name)?;
        let vm_names = check_vm_names(vms)?;
        if vm_names.is_empty() {
            return Err(RuntimeError::InvalidInput("no VMs given".to_string()));
        }
        tracing::info!("Removing {} VMs from NLB {} on {}", vm_names.len(), name, connection);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.nlb.lock(connection, &name).await;

        let (_, record) = self
            .iids
            .find_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        let members = self.resolve_vms(connection, &vm_names).await?;
        let handler = provider.nlb()?;
        provider
            .call(
                KIND,
                &name,
                "remove_vms",
                handler.remove_vms(&record.driver_iid(), &members),
            )
            .await
    }

    /// Member health with VM user names; untracked members keep an empty name
    pub async fn get_vm_group_health(&self, connection: &str, name: &str) -> Result<HealthInfo> {
        let name = check_input("nlb name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.nlb.rlock(connection, &name).await;

        let (_, record) = self
            .iids
            .find_in_group(IidGroup::Nlb, connection, &name)
            .await?;
        let handler = provider.nlb()?;
        let health = provider
            .call(
                KIND,
                &name,
                "get_vm_group_health",
                handler.get_vm_group_health(&record.driver_iid()),
            )
            .await?;

        let vm_ns = Namespace::global(connection, ResourceKind::Vm);
        Ok(HealthInfo {
            all_vms: self.to_user_iids(&vm_ns, &health.all_vms).await?,
            healthy_vms: self.to_user_iids(&vm_ns, &health.healthy_vms).await?,
            unhealthy_vms: self.to_user_iids(&vm_ns, &health.unhealthy_vms).await?,
        })
    }
}

async fn delete_provider_nlb(
    provider: &Provider,
    handler: &Arc<dyn NlbHandler>,
    name: &str,
    iid: &Iid,
) -> Result<()> {
    let deleted = provider
        .call(KIND, name, "delete_nlb", handler.delete_nlb(iid))
        .await?;
    confirmed(deleted, "nlb delete")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_vm_names() {
        let names = check_vm_names(&[Iid::named(" web-1 "), Iid::named("web-2")]).unwrap();
        assert_eq!(names, vec!["web-1", "web-2"]);
        assert!(matches!(
            check_vm_names(&[Iid::named("web-1"), Iid::system("i-123")]),
            Err(RuntimeError::InvalidInput(_))
        ));
    }
}
