//! Operations that work on any resource kind
//!
//! Importing and forgetting provider resources, the tracked/live diff and
//! the connection-wide teardown.

use super::orchestrate::{Provider, check_input, confirmed};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::lock::LockMode;
use crate::reconcile::{AllResourceList, classify};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{
    DiskInfo, FileSystemInfo, Iid, KeyPairInfo, MyImageInfo, NlbInfo, ResourceKind, SecurityInfo,
    VmInfo, VpcInfo,
};
use futures_util::future::join_all;
use serde::Serialize;

/// Dependency order of a teardown; each wave only starts once the previous one is done
const DESTROY_WAVES: &[&[ResourceKind]] = &[
    &[ResourceKind::MyImage, ResourceKind::Nlb],
    &[ResourceKind::Vm],
    &[ResourceKind::Disk],
    &[
        ResourceKind::KeyPair,
        ResourceKind::SecurityGroup,
        ResourceKind::FileSystem,
    ],
    &[ResourceKind::Vpc],
];

/// A resource whose provider delete never succeeded during a destroy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyFailure {
    pub kind: ResourceKind,
    pub name: String,
    pub error: String,
}

/// Outcome of [`CloudRuntime::destroy`]
///
/// Every identity record of the connection is gone afterwards; `failures`
/// lists the resources that may still exist at the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestroyReport {
    pub failures: Vec<DestroyFailure>,
}

impl DestroyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// User name given to the `index`th subnet of an imported VPC
fn imported_subnet_name(vpc_name: &str, index: usize) -> String {
    format!("{}-subnet-{}", vpc_name, index)
}

impl CloudRuntime {
    /// Starts tracking an existing provider resource under `name`
    ///
    /// Subnets, security groups and NLBs need the user name of their VPC.
    /// Importing a VPC also imports its subnets as `<vpc>-subnet-<n>`.
    pub async fn register_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
        vpc_name: Option<&str>,
        name: &str,
        system_id: &str,
    ) -> Result<Iid> {
        let name = check_input("resource name", name)?;
        let system_id = check_input("provider id", system_id)?;
        let group = IidGroup::of(kind);
        let vpc_name = if group.is_hierarchical() {
            Some(check_input("vpc name", vpc_name.unwrap_or_default())?)
        } else {
            None
        };
        tracing::info!("Registering {} {} as {} on {}", kind, system_id, name, connection);

        let provider = self.connect(connection).await?;
        let _vpc_lock = match (&vpc_name, kind) {
            (Some(vpc), ResourceKind::Subnet) => Some(self.locks.vpc.lock(connection, vpc).await),
            (Some(vpc), _) => Some(self.locks.vpc.rlock(connection, vpc).await),
            (None, _) => None,
        };
        let _lock = match self.locks.of(kind) {
            Some(locks) => Some(locks.lock(connection, &name).await),
            None => None,
        };

        let ns = match &vpc_name {
            Some(vpc) => Namespace::child(group, connection, vpc),
            None => Namespace::global(connection, kind),
        };
        match kind {
            ResourceKind::SecurityGroup | ResourceKind::Nlb => {
                self.ensure_absent_in_group(group, connection, &name).await?
            }
            _ => self.ensure_absent(&ns, &name).await?,
        }
        if let Some((owner_ns, owner)) = self
            .tracked(connection, kind)
            .await?
            .into_iter()
            .find(|(_, record)| record.system_id == system_id)
        {
            return Err(RuntimeError::AlreadyExists(format!(
                "{} {} is already tracked as {} in {}",
                kind, system_id, owner.name, owner_ns
            )));
        }
        let vpc_record = match &vpc_name {
            Some(vpc) => Some(
                self.iids
                    .get(&Namespace::global(connection, ResourceKind::Vpc), vpc)
                    .await?,
            ),
            None => None,
        };

        let confirmed_id = self
            .confirm_live(&provider, kind, vpc_record.as_ref(), &name, &system_id)
            .await?;
        let record = IidRecord::new(
            &name,
            self.iids.new_id(connection, kind, &name),
            &confirmed_id.system_id,
        );
        let record = self.iids.create(&ns, record).await?;

        if let Some(vpc) = confirmed_id.vpc {
            self.register_subnets(connection, &name, &vpc).await?;
        }
        Ok(record.user_iid())
    }

    /// Confirms a provider resource exists, returning what the provider reported
    async fn confirm_live(
        &self,
        provider: &Provider,
        kind: ResourceKind,
        vpc: Option<&IidRecord>,
        name: &str,
        system_id: &str,
    ) -> Result<Confirmed> {
        if kind != ResourceKind::Subnet {
            let info = fetch_csp(provider, kind, name, system_id).await?;
            let system_id = info.iid().system_id.clone();
            let vpc = match info {
                CspResourceInfo::Vpc(vpc) => Some(vpc),
                _ => None,
            };
            return Ok(Confirmed { system_id, vpc });
        }

        let vpc = vpc.ok_or_else(|| {
            RuntimeError::InvalidInput("subnet import needs a vpc".to_string())
        })?;
        let handler = provider.vpc()?;
        let info = provider
            .call(kind, name, "get_vpc", handler.get_vpc(&vpc.driver_iid()))
            .await?;
        info.subnets
            .iter()
            .find(|subnet| subnet.iid.system_id == system_id)
            .map(|subnet| Confirmed {
                system_id: subnet.iid.system_id.clone(),
                vpc: None,
            })
            .ok_or_else(|| {
                RuntimeError::NotFound(format!("subnet {} in VPC {}", system_id, vpc.name))
            })
    }

    /// Records the subnets of an imported VPC, dropping the VPC record if that fails
    async fn register_subnets(&self, connection: &str, vpc_name: &str, vpc: &VpcInfo) -> Result<()> {
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, vpc_name);
        for (index, subnet) in vpc.subnets.iter().enumerate() {
            let subnet_name = imported_subnet_name(vpc_name, index);
            let record = IidRecord::new(
                &subnet_name,
                self.iids.new_id(connection, ResourceKind::Subnet, &subnet_name),
                &subnet.iid.system_id,
            );
            if let Err(err) = self.iids.create(&subnet_ns, record).await {
                tracing::error!("Failed to register subnets of {}: {}", vpc_name, err);
                let cleanup = async {
                    self.forget_subnets(connection, vpc_name).await?;
                    self.iids
                        .delete(&Namespace::global(connection, ResourceKind::Vpc), vpc_name)
                        .await
                        .map(|_| ())
                }
                .await;
                return Err(match cleanup {
                    Ok(()) => err,
                    Err(compensation) => RuntimeError::partial(err, compensation),
                });
            }
        }
        Ok(())
    }

    /// Stops tracking a resource; the provider side is left alone
    pub async fn unregister_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<bool> {
        let name = check_input("resource name", name)?;
        tracing::info!("Unregistering {} {} on {}", kind, name, connection);
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Exclusive)
            .await?;
        self.forget(connection, kind, &name).await?;
        Ok(true)
    }

    /// Drops the identity record of `name`, and a VPC's subnet records with it
    async fn forget(&self, connection: &str, kind: ResourceKind, name: &str) -> Result<()> {
        let (ns, _) = self.lookup(connection, kind, name).await?;
        self.iids.delete(&ns, name).await?;
        if kind == ResourceKind::Vpc {
            self.forget_subnets(connection, name).await?;
        }
        Ok(())
    }

    /// User names of every tracked resource of `kind`
    pub async fn list_resource_name(
        &self,
        connection: &str,
        kind: ResourceKind,
    ) -> Result<Vec<String>> {
        Ok(self
            .tracked(connection, kind)
            .await?
            .into_iter()
            .map(|(_, record)| record.name)
            .collect())
    }

    /// Provider id behind a user name
    pub async fn get_csp_resource_name(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<String> {
        let name = check_input("resource name", name)?;
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Shared)
            .await?;
        let (_, record) = self.lookup(connection, kind, &name).await?;
        Ok(record.system_id)
    }

    /// Deletes a provider resource that has no identity record
    ///
    /// Tracked resources are refused; delete those by name. Subnets go through
    /// [`CloudRuntime::remove_csp_subnet`].
    pub async fn delete_csp_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
        system_id: &str,
    ) -> Result<bool> {
        let system_id = check_input("provider id", system_id)?;
        if kind == ResourceKind::Subnet {
            return Err(RuntimeError::InvalidInput(
                "provider subnets are removed through their VPC".to_string(),
            ));
        }
        tracing::info!("Deleting provider {} {} on {}", kind, system_id, connection);
        let provider = self.connect(connection).await?;
        let _lock = self
            .lock_resource(connection, kind, &system_id, LockMode::Exclusive)
            .await?;

        if let Some((ns, record)) = self
            .tracked(connection, kind)
            .await?
            .into_iter()
            .find(|(_, record)| record.system_id == system_id)
        {
            return Err(RuntimeError::InvalidInput(format!(
                "{} {} is tracked as {} in {}",
                kind, system_id, record.name, ns
            )));
        }

        let iid = Iid::system(&system_id);
        let name = system_id.as_str();
        let deleted = match kind {
            ResourceKind::Vm => {
                self.terminate_and_wait(&provider, name, &iid).await?;
                true
            }
            ResourceKind::Vpc => {
                let handler = provider.vpc()?;
                provider.call(kind, name, "delete_vpc", handler.delete_vpc(&iid)).await?
            }
            ResourceKind::SecurityGroup => {
                let handler = provider.security()?;
                provider
                    .call(kind, name, "delete_security", handler.delete_security(&iid))
                    .await?
            }
            ResourceKind::KeyPair => {
                let handler = provider.keypair()?;
                provider.call(kind, name, "delete_key", handler.delete_key(&iid)).await?
            }
            ResourceKind::Disk => {
                let handler = provider.disk()?;
                provider.call(kind, name, "delete_disk", handler.delete_disk(&iid)).await?
            }
            ResourceKind::MyImage => {
                let handler = provider.myimage()?;
                provider
                    .call(kind, name, "delete_my_image", handler.delete_my_image(&iid))
                    .await?
            }
            ResourceKind::Nlb => {
                let handler = provider.nlb()?;
                provider.call(kind, name, "delete_nlb", handler.delete_nlb(&iid)).await?
            }
            ResourceKind::FileSystem => {
                let handler = provider.filesystem()?;
                provider
                    .call(kind, name, "delete_file_system", handler.delete_file_system(&iid))
                    .await?
            }
            ResourceKind::Subnet => false,
        };
        confirmed(deleted, "provider resource delete")?;
        Ok(true)
    }

    /// What the provider reports for `system_id`, whether tracked or not
    pub async fn get_csp_resource_info(
        &self,
        connection: &str,
        kind: ResourceKind,
        system_id: &str,
    ) -> Result<CspResourceInfo> {
        let system_id = check_input("provider id", system_id)?;
        let provider = self.connect(connection).await?;
        fetch_csp(&provider, kind, &system_id, &system_id).await
    }

    /// Provider view of a VM by provider id, without user names
    pub async fn get_csp_vm(&self, connection: &str, system_id: &str) -> Result<VmInfo> {
        let system_id = check_input("provider id", system_id)?;
        let provider = self.connect(connection).await?;
        let handler = provider.vm()?;
        provider
            .call(
                ResourceKind::Vm,
                &system_id,
                "get_vm",
                handler.get_vm(&Iid::system(&system_id)),
            )
            .await
    }

    /// Tracked resources of `kind` in one connection
    pub async fn count_resources(&self, connection: &str, kind: ResourceKind) -> Result<usize> {
        let connection = check_input("connection name", connection)?;
        self.iids.count(kind, Some(&connection)).await
    }

    /// Tracked resources of `kind` across every connection
    pub async fn count_all_resources(&self, kind: ResourceKind) -> Result<usize> {
        self.iids.count(kind, None).await
    }

    /// Tracked resources of `kind` split against what the provider has
    pub async fn list_all_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
    ) -> Result<AllResourceList> {
        let provider = self.connect(connection).await?;
        let tracked: Vec<IidRecord> = self
            .tracked(connection, kind)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        let live = provider.list_live(kind).await?;
        let all = classify(&tracked, &live);
        tracing::debug!(
            "{} on {}: {} mapped, {} tracked only, {} provider only",
            kind,
            connection,
            all.mapped.len(),
            all.only_tracked.len(),
            all.only_provider.len()
        );
        Ok(all)
    }

    /// Deletes a tracked resource of any kind by user name
    pub async fn delete_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
        force: bool,
    ) -> Result<bool> {
        match kind {
            ResourceKind::Vpc => self.delete_vpc(connection, name, force).await,
            ResourceKind::Subnet => {
                let name = check_input("subnet name", name)?;
                let (ns, _) = self.lookup(connection, kind, &name).await?;
                self.remove_subnet(connection, &ns.parent, &name, force)
                    .await
            }
            ResourceKind::SecurityGroup => self.delete_security(connection, name, force).await,
            ResourceKind::KeyPair => self.delete_key(connection, name, force).await,
            ResourceKind::Vm => self
                .terminate_vm(connection, name, force)
                .await
                .map(|_| true),
            ResourceKind::Disk => self.delete_disk(connection, name, force).await,
            ResourceKind::MyImage => self.delete_my_image(connection, name, force).await,
            ResourceKind::Nlb => self.delete_nlb(connection, name, force).await,
            ResourceKind::FileSystem => self.delete_file_system(connection, name, force).await,
        }
    }

    /// Deletes every tracked resource of a connection, dependents first
    ///
    /// Each wave gets `destroy_retries` attempts. Resources still failing on
    /// the last attempt lose their records anyway and land in the report.
    pub async fn destroy(&self, connection: &str) -> Result<DestroyReport> {
        tracing::info!("Destroying every tracked resource on {}", connection);
        self.connect(connection).await?;
        let attempts = self.settings.destroy_retries.max(1);
        let mut report = DestroyReport::default();

        for wave in DESTROY_WAVES {
            for attempt in 1..=attempts {
                let mut pending = Vec::new();
                for kind in wave.iter().copied() {
                    for (_, record) in self.tracked(connection, kind).await? {
                        pending.push((kind, record.name));
                    }
                }
                if pending.is_empty() {
                    break;
                }
                tracing::debug!(
                    "Destroy wave {:?} attempt {}/{}: {} resources",
                    wave,
                    attempt,
                    attempts,
                    pending.len()
                );

                let results = join_all(pending.iter().map(|(kind, name)| {
                    self.delete_resource(connection, *kind, name, false)
                }))
                .await;
                let last = attempt == attempts;
                for ((kind, name), result) in pending.into_iter().zip(results) {
                    let Err(err) = result else { continue };
                    if !last {
                        tracing::warn!("Destroy of {} {} failed, retrying: {}", kind, name, err);
                        continue;
                    }
                    if !err.is_not_found() {
                        tracing::error!("Giving up on {} {}: {}", kind, name, err);
                        report.failures.push(DestroyFailure {
                            kind,
                            name: name.clone(),
                            error: err.to_string(),
                        });
                    }
                    match self.forget(connection, kind, &name).await {
                        Ok(()) => {}
                        Err(err) if err.is_not_found() => {}
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        if report.is_clean() {
            tracing::info!("Destroyed every tracked resource on {}", connection);
        } else {
            tracing::warn!(
                "Destroy of {} left {} provider resources behind",
                connection,
                report.failures.len()
            );
        }
        Ok(report)
    }
}

/// What the provider reported for a resource being imported
struct Confirmed {
    system_id: String,
    vpc: Option<VpcInfo>,
}

/// Provider-side info of one resource, keyed by kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CspResourceInfo {
    Vpc(VpcInfo),
    SecurityGroup(SecurityInfo),
    KeyPair(KeyPairInfo),
    Vm(VmInfo),
    Disk(DiskInfo),
    MyImage(MyImageInfo),
    Nlb(NlbInfo),
    FileSystem(FileSystemInfo),
}

impl CspResourceInfo {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CspResourceInfo::Vpc(_) => ResourceKind::Vpc,
            CspResourceInfo::SecurityGroup(_) => ResourceKind::SecurityGroup,
            CspResourceInfo::KeyPair(_) => ResourceKind::KeyPair,
            CspResourceInfo::Vm(_) => ResourceKind::Vm,
            CspResourceInfo::Disk(_) => ResourceKind::Disk,
            CspResourceInfo::MyImage(_) => ResourceKind::MyImage,
            CspResourceInfo::Nlb(_) => ResourceKind::Nlb,
            CspResourceInfo::FileSystem(_) => ResourceKind::FileSystem,
        }
    }

    /// IID as the provider reported it
    pub fn iid(&self) -> &Iid {
        match self {
            CspResourceInfo::Vpc(info) => &info.iid,
            CspResourceInfo::SecurityGroup(info) => &info.iid,
            CspResourceInfo::KeyPair(info) => &info.iid,
            CspResourceInfo::Vm(info) => &info.iid,
            CspResourceInfo::Disk(info) => &info.iid,
            CspResourceInfo::MyImage(info) => &info.iid,
            CspResourceInfo::Nlb(info) => &info.iid,
            CspResourceInfo::FileSystem(info) => &info.iid,
        }
    }
}

/// Fetches a provider resource by its provider id
///
/// Subnets are not addressable on their own; read them through their VPC.
async fn fetch_csp(
    provider: &Provider,
    kind: ResourceKind,
    name: &str,
    system_id: &str,
) -> Result<CspResourceInfo> {
    let iid = Iid::system(system_id);
    let info = match kind {
        ResourceKind::Vpc => {
            let handler = provider.vpc()?;
            CspResourceInfo::Vpc(provider.call(kind, name, "get_vpc", handler.get_vpc(&iid)).await?)
        }
        ResourceKind::SecurityGroup => {
            let handler = provider.security()?;
            CspResourceInfo::SecurityGroup(
                provider
                    .call(kind, name, "get_security", handler.get_security(&iid))
                    .await?,
            )
        }
        ResourceKind::KeyPair => {
            let handler = provider.keypair()?;
            CspResourceInfo::KeyPair(provider.call(kind, name, "get_key", handler.get_key(&iid)).await?)
        }
        ResourceKind::Vm => {
            let handler = provider.vm()?;
            CspResourceInfo::Vm(provider.call(kind, name, "get_vm", handler.get_vm(&iid)).await?)
        }
        ResourceKind::Disk => {
            let handler = provider.disk()?;
            CspResourceInfo::Disk(provider.call(kind, name, "get_disk", handler.get_disk(&iid)).await?)
        }
        ResourceKind::MyImage => {
            let handler = provider.myimage()?;
            CspResourceInfo::MyImage(
                provider
                    .call(kind, name, "get_my_image", handler.get_my_image(&iid))
                    .await?,
            )
        }
        ResourceKind::Nlb => {
            let handler = provider.nlb()?;
            CspResourceInfo::Nlb(provider.call(kind, name, "get_nlb", handler.get_nlb(&iid)).await?)
        }
        ResourceKind::FileSystem => {
            let handler = provider.filesystem()?;
            CspResourceInfo::FileSystem(
                provider
                    .call(kind, name, "get_file_system", handler.get_file_system(&iid))
                    .await?,
            )
        }
        ResourceKind::Subnet => {
            return Err(RuntimeError::InvalidInput(
                "provider subnets are read through their VPC".to_string(),
            ));
        }
    };
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imported_subnet_name() {
        assert_eq!(imported_subnet_name("vpc-a", 0), "vpc-a-subnet-0");
        assert_eq!(imported_subnet_name("vpc-a", 3), "vpc-a-subnet-3");
    }

    #[test]
    fn test_waves_cover_every_tracked_kind() {
        for kind in ResourceKind::ALL {
            let waves = DESTROY_WAVES
                .iter()
                .filter(|wave| wave.contains(&kind))
                .count();
            let expected = usize::from(kind != ResourceKind::Subnet);
            assert_eq!(waves, expected, "{}", kind);
        }
    }

    #[test]
    fn test_report_serializes_kind_names() {
        let report = DestroyReport {
            failures: vec![DestroyFailure {
                kind: ResourceKind::SecurityGroup,
                name: "sg-web".into(),
                error: "in use".into(),
            }],
        };
        assert!(!report.is_clean());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["kind"], "sg");
        assert!(DestroyReport::default().is_clean());
    }
}
