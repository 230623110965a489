//! Security group operations
//!
//! Records live in the SG group under the owning VPC's user name. Names are
//! unique per connection, not only per VPC, so lookups never need the VPC.

use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{Iid, ResourceKind, SecurityInfo, SecurityReqInfo, SecurityRule};

const KIND: ResourceKind = ResourceKind::SecurityGroup;

impl CloudRuntime {
    pub async fn create_security(
        &self,
        connection: &str,
        req: SecurityReqInfo,
    ) -> Result<SecurityInfo> {
        let name = check_input("security group name", &req.iid.name_id)?;
        let vpc_name = check_input("vpc name", &req.vpc_iid.name_id)?;
        tracing::info!("Creating security group {} in VPC {} on {}", name, vpc_name, connection);

        let provider = self.connect(connection).await?;
        let _vpc_lock = self.locks.vpc.rlock(connection, &vpc_name).await;
        let _lock = self.locks.security_group.lock(connection, &name).await;

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let vpc_record = self.iids.get(&vpc_ns, &vpc_name).await?;
        self.ensure_absent_in_group(IidGroup::SecurityGroup, connection, &name)
            .await?;

        let sg_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.security()?;
        let driver_req = SecurityReqInfo {
            iid: Iid::named(&sg_id),
            vpc_iid: vpc_record.driver_iid(),
            rules: req.rules,
            tags: req.tags,
        };
        let info = provider
            .call(KIND, &name, "create_security", handler.create_security(driver_req))
            .await?;
        let sg_iid = Iid::new(&sg_id, &info.iid.system_id);

        let sg_ns = Namespace::child(IidGroup::SecurityGroup, connection, &vpc_name);
        let record = self
            .persist_or_rollback(
                &sg_ns,
                IidRecord::new(&name, &sg_id, &info.iid.system_id),
                async {
                    let deleted = provider
                        .call(KIND, &name, "delete_security", handler.delete_security(&sg_iid))
                        .await?;
                    confirmed(deleted, "security group rollback")
                },
            )
            .await?;

        Ok(translate_security(&record, &vpc_record, info))
    }

    async fn fetch_security(
        &self,
        provider: &Provider,
        connection: &str,
        ns: Namespace,
        record: IidRecord,
    ) -> Result<SecurityInfo> {
        let handler = provider.security()?;
        let info = provider
            .call(
                KIND,
                &record.name,
                "get_security",
                handler.get_security(&record.driver_iid()),
            )
            .await?;
        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        let mut info = info;
        info.iid = record.user_iid();
        info.vpc_iid = match self.iids.get(&vpc_ns, &ns.parent).await {
            Ok(vpc_record) => vpc_record.user_iid(),
            Err(err) if err.is_not_found() => self.to_user_iid(&vpc_ns, &info.vpc_iid).await?,
            Err(err) => return Err(err),
        };
        Ok(info)
    }

    pub async fn list_security(&self, connection: &str) -> Result<Vec<SecurityInfo>> {
        let provider = self.connect(connection).await?;
        let records = self
            .iids
            .list_group(IidGroup::SecurityGroup, connection)
            .await?;
        fan_out(records, |(ns, record)| {
            self.fetch_security(&provider, connection, ns, record)
        })
        .await
    }

    pub async fn get_security(&self, connection: &str, name: &str) -> Result<SecurityInfo> {
        let name = check_input("security group name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.security_group.rlock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::SecurityGroup, connection, &name)
            .await?;
        self.fetch_security(&provider, connection, ns, record).await
    }

    pub async fn delete_security(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("security group name", name)?;
        tracing::info!("Deleting security group {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.security_group.lock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::SecurityGroup, connection, &name)
            .await?;
        let result = async {
            let handler = provider.security()?;
            let deleted = provider
                .call(
                    KIND,
                    &name,
                    "delete_security",
                    handler.delete_security(&record.driver_iid()),
                )
                .await?;
            confirmed(deleted, "security group delete")
        }
        .await;

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }

    pub async fn add_rules(
        &self,
        connection: &str,
        name: &str,
        rules: Vec<SecurityRule>,
    ) -> Result<SecurityInfo> {
        let name = check_input("security group name", name)?;
        if rules.is_empty() {
            return Err(RuntimeError::InvalidInput("no rules given".to_string()));
        }
        let provider = self.connect(connection).await?;
        let _lock = self.locks.security_group.lock(connection, &name).await;

        let (ns, record) = self
            .iids
            .find_in_group(IidGroup::SecurityGroup, connection, &name)
            .await?;
        let handler = provider.security()?;
        provider
            .call(KIND, &name, "add_rules", handler.add_rules(&record.driver_iid(), rules))
            .await?;
        self.fetch_security(&provider, connection, ns, record).await
    }

    pub async fn remove_rules(
        &self,
        connection: &str,
        name: &str,
        rules: Vec<SecurityRule>,
    ) -> Result<bool> {
        let name = check_input("security group name", name)?;
        if rules.is_empty() {
            return Err(RuntimeError::InvalidInput("no rules given".to_string()));
        }
        let provider = self.connect(connection).await?;
        let _lock = self.locks.security_group.lock(connection, &name).await;

        let (_, record) = self
            .iids
            .find_in_group(IidGroup::SecurityGroup, connection, &name)
            .await?;
        let handler = provider.security()?;
        provider
            .call(
                KIND,
                &name,
                "remove_rules",
                handler.remove_rules(&record.driver_iid(), &rules),
            )
            .await
    }
}

fn translate_security(
    record: &IidRecord,
    vpc_record: &IidRecord,
    mut info: SecurityInfo,
) -> SecurityInfo {
    info.iid = record.user_iid();
    info.vpc_iid = vpc_record.user_iid();
    info
}
