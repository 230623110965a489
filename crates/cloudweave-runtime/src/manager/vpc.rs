//! VPC and subnet operations
//!
//! Subnets live in the subnet group under their VPC's user name and are
//! always changed while holding the VPC's exclusive lock.

use super::orchestrate::{Provider, check_input, compensate, confirmed, fan_out};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{DriverError, Iid, ResourceKind, SubnetInfo, VpcInfo, VpcReqInfo};
use std::collections::HashSet;

/// Key in the VPC registry that one-VPC providers serialize VPC creates and
/// deletes on; VPC names are never empty
const CONNECTION_SLOT: &str = "";

/// Validated `(name, cidr)` of each requested subnet
fn check_subnets(subnets: &[SubnetInfo]) -> Result<Vec<(String, String)>> {
    let mut names = HashSet::new();
    let mut cidrs = HashSet::new();
    let mut checked = Vec::with_capacity(subnets.len());
    for subnet in subnets {
        let name = check_input("subnet name", &subnet.iid.name_id)?;
        let cidr = check_input("subnet cidr", &subnet.ipv4_cidr)?;
        if !names.insert(name.clone()) {
            return Err(RuntimeError::InvalidInput(format!("duplicate subnet name {}", name)));
        }
        if !cidrs.insert(cidr.clone()) {
            return Err(RuntimeError::InvalidInput(format!("duplicate subnet cidr {}", cidr)));
        }
        checked.push((name, cidr));
    }
    Ok(checked)
}

/// Provider id of the subnet created for `cidr`
///
/// Drivers answer with provider ids only, so subnets are matched by CIDR and
/// then by the generated id some drivers echo back.
fn created_subnet_id(info: &VpcInfo, cidr: &str, generated_id: &str) -> Result<String> {
    info.subnets
        .iter()
        .find(|s| s.ipv4_cidr == cidr)
        .or_else(|| info.subnets.iter().find(|s| s.iid.name_id == generated_id))
        .map(|s| s.iid.system_id.clone())
        .ok_or_else(|| {
            DriverError::fatal(format!("provider did not report subnet {}", cidr)).into()
        })
}

impl CloudRuntime {
    pub async fn create_vpc(&self, connection: &str, req: VpcReqInfo) -> Result<VpcInfo> {
        let name = check_input("vpc name", &req.iid.name_id)?;
        let cidr = check_input("vpc cidr", &req.ipv4_cidr)?;
        let subnets = check_subnets(&req.subnets)?;
        tracing::info!("Creating VPC {} on {}", name, connection);

        let provider = self.connect(connection).await?;
        let single_vpc = provider.capability().single_vpc;
        let _slot = if single_vpc {
            Some(self.locks.vpc.lock(connection, CONNECTION_SLOT).await)
        } else {
            None
        };
        let _lock = self.locks.vpc.lock(connection, &name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        self.ensure_absent(&vpc_ns, &name).await?;
        if single_vpc && !self.iids.list(&vpc_ns).await?.is_empty() {
            return Err(RuntimeError::InvalidInput(format!(
                "{} allows only one VPC per connection",
                provider.name()
            )));
        }

        let vpc_id = self.iids.new_id(connection, ResourceKind::Vpc, &name);
        let mut subnet_ids = Vec::with_capacity(subnets.len());
        let mut driver_subnets = Vec::with_capacity(subnets.len());
        for (requested, (subnet_name, subnet_cidr)) in req.subnets.iter().zip(&subnets) {
            let id = self.iids.new_id(connection, ResourceKind::Subnet, subnet_name);
            driver_subnets.push(SubnetInfo {
                iid: Iid::named(&id),
                zone: requested.zone.clone(),
                ipv4_cidr: subnet_cidr.clone(),
                tags: requested.tags.clone(),
            });
            subnet_ids.push(id);
        }

        let handler = provider.vpc()?;
        let driver_req = VpcReqInfo {
            iid: Iid::named(&vpc_id),
            ipv4_cidr: cidr,
            subnets: driver_subnets,
            tags: req.tags,
        };
        let info = provider
            .call(ResourceKind::Vpc, &name, "create_vpc", handler.create_vpc(driver_req))
            .await?;
        let vpc_iid = Iid::new(&vpc_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &vpc_ns,
                IidRecord::new(&name, &vpc_id, &info.iid.system_id),
                self.undo_create_vpc(&provider, connection, &name, &vpc_iid),
            )
            .await?;

        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &name);
        for ((subnet_name, subnet_cidr), subnet_id) in subnets.iter().zip(&subnet_ids) {
            let system_id = match created_subnet_id(&info, subnet_cidr, subnet_id) {
                Ok(id) => id,
                Err(err) => {
                    let undo = self.undo_create_vpc(&provider, connection, &name, &vpc_iid);
                    return Err(compensate(err, &name, undo).await);
                }
            };
            self.persist_or_rollback(
                &subnet_ns,
                IidRecord::new(subnet_name, subnet_id, system_id),
                self.undo_create_vpc(&provider, connection, &name, &vpc_iid),
            )
            .await?;
        }

        self.translate_vpc(connection, &record, info).await
    }

    /// Deletes a just-created VPC with every record written for it
    async fn undo_create_vpc(
        &self,
        provider: &Provider,
        connection: &str,
        name: &str,
        vpc: &Iid,
    ) -> Result<()> {
        let handler = provider.vpc()?;
        let deleted = provider
            .call(ResourceKind::Vpc, name, "delete_vpc", handler.delete_vpc(vpc))
            .await?;
        confirmed(deleted, "VPC rollback")?;

        self.forget_subnets(connection, name).await?;
        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        if self.iids.is_exist(&vpc_ns, name).await? {
            self.iids.delete(&vpc_ns, name).await?;
        }
        Ok(())
    }

    /// Drops every subnet record of a VPC
    pub(crate) async fn forget_subnets(&self, connection: &str, vpc_name: &str) -> Result<()> {
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, vpc_name);
        for record in self.iids.list(&subnet_ns).await? {
            self.iids.delete(&subnet_ns, &record.name).await?;
        }
        Ok(())
    }

    pub(crate) async fn translate_vpc(
        &self,
        connection: &str,
        record: &IidRecord,
        mut info: VpcInfo,
    ) -> Result<VpcInfo> {
        info.iid = record.user_iid();
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &record.name);
        for subnet in info.subnets.iter_mut() {
            subnet.iid = self.to_user_iid(&subnet_ns, &subnet.iid).await?;
        }
        Ok(info)
    }

    async fn fetch_vpc(
        &self,
        provider: &Provider,
        connection: &str,
        record: IidRecord,
    ) -> Result<VpcInfo> {
        let handler = provider.vpc()?;
        let info = provider
            .call(
                ResourceKind::Vpc,
                &record.name,
                "get_vpc",
                handler.get_vpc(&record.driver_iid()),
            )
            .await?;
        self.translate_vpc(connection, &record, info).await
    }

    pub async fn list_vpc(&self, connection: &str) -> Result<Vec<VpcInfo>> {
        let provider = self.connect(connection).await?;
        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let records = self.iids.list(&vpc_ns).await?;
        fan_out(records, |record| self.fetch_vpc(&provider, connection, record)).await
    }

    pub async fn get_vpc(&self, connection: &str, name: &str) -> Result<VpcInfo> {
        let name = check_input("vpc name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.vpc.rlock(connection, &name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let record = self.iids.get(&vpc_ns, &name).await?;
        self.fetch_vpc(&provider, connection, record).await
    }

    pub async fn delete_vpc(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("vpc name", name)?;
        tracing::info!("Deleting VPC {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let single_vpc = provider.capability().single_vpc;
        let _slot = if single_vpc {
            Some(self.locks.vpc.lock(connection, CONNECTION_SLOT).await)
        } else {
            None
        };
        let _lock = self.locks.vpc.lock(connection, &name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let record = self.iids.get(&vpc_ns, &name).await?;
        let result = async {
            let handler = provider.vpc()?;
            let deleted = provider
                .call(
                    ResourceKind::Vpc,
                    &name,
                    "delete_vpc",
                    handler.delete_vpc(&record.driver_iid()),
                )
                .await?;
            confirmed(deleted, "VPC delete")
        }
        .await;

        self.finish_delete(&vpc_ns, &name, result, force).await?;
        self.forget_subnets(connection, &name).await?;
        Ok(true)
    }

    pub async fn add_subnet(
        &self,
        connection: &str,
        vpc_name: &str,
        subnet: SubnetInfo,
    ) -> Result<VpcInfo> {
        let vpc_name = check_input("vpc name", vpc_name)?;
        let name = check_input("subnet name", &subnet.iid.name_id)?;
        let cidr = check_input("subnet cidr", &subnet.ipv4_cidr)?;
        tracing::info!("Adding subnet {} to VPC {} on {}", name, vpc_name, connection);

        let provider = self.connect(connection).await?;
        let _lock = self.locks.vpc.lock(connection, &vpc_name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = self.iids.get(&vpc_ns, &vpc_name).await?;
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
        self.ensure_absent(&subnet_ns, &name).await?;

        let subnet_id = self.iids.new_id(connection, ResourceKind::Subnet, &name);
        let handler = provider.vpc()?;
        let vpc_iid = vpc_record.driver_iid();
        let driver_subnet = SubnetInfo {
            iid: Iid::named(&subnet_id),
            zone: subnet.zone,
            ipv4_cidr: cidr.clone(),
            tags: subnet.tags,
        };
        let info = provider
            .call(
                ResourceKind::Subnet,
                &name,
                "add_subnet",
                handler.add_subnet(&vpc_iid, driver_subnet),
            )
            .await?;
        let system_id = created_subnet_id(&info, &cidr, &subnet_id)?;
        let subnet_iid = Iid::new(&subnet_id, &system_id);

        self.persist_or_rollback(
            &subnet_ns,
            IidRecord::new(&name, &subnet_id, &system_id),
            async {
                let removed = provider
                    .call(
                        ResourceKind::Subnet,
                        &name,
                        "remove_subnet",
                        handler.remove_subnet(&vpc_iid, &subnet_iid),
                    )
                    .await?;
                confirmed(removed, "subnet rollback")
            },
        )
        .await?;

        self.translate_vpc(connection, &vpc_record, info).await
    }

    pub async fn remove_subnet(
        &self,
        connection: &str,
        vpc_name: &str,
        subnet_name: &str,
        force: bool,
    ) -> Result<bool> {
        let vpc_name = check_input("vpc name", vpc_name)?;
        let name = check_input("subnet name", subnet_name)?;
        tracing::info!("Removing subnet {} from VPC {} on {}", name, vpc_name, connection);

        let provider = self.connect(connection).await?;
        let _lock = self.locks.vpc.lock(connection, &vpc_name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = self.iids.get(&vpc_ns, &vpc_name).await?;
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
        let record = self.iids.get(&subnet_ns, &name).await?;

        let result = async {
            let handler = provider.vpc()?;
            let removed = provider
                .call(
                    ResourceKind::Subnet,
                    &name,
                    "remove_subnet",
                    handler.remove_subnet(&vpc_record.driver_iid(), &record.driver_iid()),
                )
                .await?;
            confirmed(removed, "subnet removal")
        }
        .await;

        self.finish_delete(&subnet_ns, &name, result, force).await?;
        Ok(true)
    }

    /// Removes a provider subnet that has no identity record
    pub async fn remove_csp_subnet(
        &self,
        connection: &str,
        vpc_name: &str,
        system_id: &str,
    ) -> Result<bool> {
        let vpc_name = check_input("vpc name", vpc_name)?;
        let system_id = check_input("subnet system id", system_id)?;
        tracing::info!(
            "Removing provider subnet {} from VPC {} on {}",
            system_id,
            vpc_name,
            connection
        );

        let provider = self.connect(connection).await?;
        let _lock = self.locks.vpc.lock(connection, &vpc_name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = self.iids.get(&vpc_ns, &vpc_name).await?;
        let handler = provider.vpc()?;
        provider
            .call(
                ResourceKind::Subnet,
                &system_id,
                "remove_subnet",
                handler.remove_subnet(&vpc_record.driver_iid(), &Iid::system(&system_id)),
            )
            .await
    }
}
