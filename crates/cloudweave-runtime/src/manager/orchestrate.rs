//! Steps shared by every resource manager

use crate::calllog::CallLog;
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::lock::{LockMode, NamedLockGuard};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{
    CloudDriver, DiskHandler, DriverCapability, DriverError, FileSystemHandler, Iid,
    KeyPairHandler, MyImageHandler, NlbHandler, ResourceKind, SecurityHandler, TagHandler,
    VmHandler, VpcHandler,
};
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;

/// Trimmed value of a required field
pub(crate) fn check_input(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RuntimeError::InvalidInput(format!("{} is empty", field)));
    }
    Ok(value.to_string())
}

/// Turns a driver's `false` answer into an error
pub(crate) fn confirmed(done: bool, what: &str) -> Result<()> {
    if done {
        Ok(())
    } else {
        Err(DriverError::fatal(format!("{} was not confirmed by the provider", what)).into())
    }
}

/// A resolved driver plus the call log of its connection
pub(crate) struct Provider {
    driver: Arc<dyn CloudDriver>,
    log: CallLog,
}

impl Provider {
    pub fn name(&self) -> &str {
        &self.log.provider
    }

    pub fn capability(&self) -> DriverCapability {
        self.driver.capability()
    }

    pub fn vpc(&self) -> Result<Arc<dyn VpcHandler>> {
        Ok(self.driver.vpc_handler()?)
    }

    pub fn security(&self) -> Result<Arc<dyn SecurityHandler>> {
        Ok(self.driver.security_handler()?)
    }

    pub fn keypair(&self) -> Result<Arc<dyn KeyPairHandler>> {
        Ok(self.driver.keypair_handler()?)
    }

    pub fn vm(&self) -> Result<Arc<dyn VmHandler>> {
        Ok(self.driver.vm_handler()?)
    }

    pub fn disk(&self) -> Result<Arc<dyn DiskHandler>> {
        Ok(self.driver.disk_handler()?)
    }

    pub fn myimage(&self) -> Result<Arc<dyn MyImageHandler>> {
        Ok(self.driver.myimage_handler()?)
    }

    pub fn nlb(&self) -> Result<Arc<dyn NlbHandler>> {
        Ok(self.driver.nlb_handler()?)
    }

    pub fn tag(&self) -> Result<Arc<dyn TagHandler>> {
        Ok(self.driver.tag_handler()?)
    }

    pub fn filesystem(&self) -> Result<Arc<dyn FileSystemHandler>> {
        Ok(self.driver.filesystem_handler()?)
    }

    /// Runs one driver call through the call log
    pub async fn call<T, F>(
        &self,
        kind: ResourceKind,
        name: &str,
        api: &'static str,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = cloudweave_cloud::Result<T>>,
    {
        self.log.call(kind, name, api, fut).await.map_err(|err| {
            if err.is_not_found() {
                tracing::debug!("{} {} {}: {}", api, kind, name, err);
            } else {
                tracing::error!("{} {} {} failed: {}", api, kind, name, err);
            }
            RuntimeError::Provider(err)
        })
    }

    /// Provider ids of every live resource of `kind`
    pub async fn list_live(&self, kind: ResourceKind) -> Result<Vec<Iid>> {
        match kind {
            ResourceKind::Vpc => {
                let handler = self.vpc()?;
                self.call(kind, "", "list_vpc", handler.list_iid()).await
            }
            ResourceKind::Subnet => {
                let handler = self.vpc()?;
                let vpcs = self.call(kind, "", "list_vpc", handler.list_vpc()).await?;
                Ok(vpcs
                    .into_iter()
                    .flat_map(|vpc| vpc.subnets.into_iter().map(|s| s.iid))
                    .collect())
            }
            ResourceKind::SecurityGroup => {
                let handler = self.security()?;
                self.call(kind, "", "list_security", handler.list_iid()).await
            }
            ResourceKind::KeyPair => {
                let handler = self.keypair()?;
                self.call(kind, "", "list_key", handler.list_iid()).await
            }
            ResourceKind::Vm => {
                let handler = self.vm()?;
                self.call(kind, "", "list_vm", handler.list_iid()).await
            }
            ResourceKind::Disk => {
                let handler = self.disk()?;
                self.call(kind, "", "list_disk", handler.list_iid()).await
            }
            ResourceKind::MyImage => {
                let handler = self.myimage()?;
                self.call(kind, "", "list_my_image", handler.list_iid()).await
            }
            ResourceKind::Nlb => {
                let handler = self.nlb()?;
                self.call(kind, "", "list_nlb", handler.list_iid()).await
            }
            ResourceKind::FileSystem => {
                let handler = self.filesystem()?;
                self.call(kind, "", "list_file_system", handler.list_iid())
                    .await
            }
        }
    }
}

/// Joins per-item fetches, dropping items that vanished in between
pub(crate) async fn fan_out<I, T, F, Fut>(items: Vec<I>, fetch: F) -> Result<Vec<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results = join_all(items.into_iter().map(fetch)).await;
    let mut fetched = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(item) => fetched.push(item),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(fetched)
}

/// Runs `rollback` after `err`, folding a failed rollback into the error
pub(crate) async fn compensate<Fut>(err: RuntimeError, name: &str, rollback: Fut) -> RuntimeError
where
    Fut: Future<Output = Result<()>>,
{
    match rollback.await {
        Ok(()) => {
            tracing::warn!("Rolled back provider resource {}", name);
            err
        }
        Err(compensation) => {
            tracing::error!("Rollback of {} failed: {}", name, compensation);
            RuntimeError::partial(err, compensation)
        }
    }
}

impl CloudRuntime {
    pub(crate) async fn connect(&self, connection: &str) -> Result<Provider> {
        let driver = self.gateway.resolve(connection).await?;
        let provider = self.gateway.provider_name(connection)?;
        let region = self.gateway.region(connection)?;
        Ok(Provider {
            driver,
            log: CallLog::new(connection, provider, region),
        })
    }

    /// Fails with `AlreadyExists` when `name` is taken in `ns`
    pub(crate) async fn ensure_absent(&self, ns: &Namespace, name: &str) -> Result<()> {
        if self.iids.is_exist(ns, name).await? {
            tracing::error!("{} already exists in {}", name, ns);
            return Err(RuntimeError::AlreadyExists(format!("{} {}", ns, name)));
        }
        Ok(())
    }

    /// Fails with `AlreadyExists` when `name` is taken under any VPC
    pub(crate) async fn ensure_absent_in_group(
        &self,
        group: IidGroup,
        connection: &str,
        name: &str,
    ) -> Result<()> {
        match self.iids.find_in_group(group, connection, name).await {
            Ok((ns, _)) => {
                tracing::error!("{} already exists in {}", name, ns);
                Err(RuntimeError::AlreadyExists(format!("{} {}", ns, name)))
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Persists `record`, undoing the provider create when that fails
    ///
    /// `rollback` is only polled on failure.
    pub(crate) async fn persist_or_rollback<Fut>(
        &self,
        ns: &Namespace,
        record: IidRecord,
        rollback: Fut,
    ) -> Result<IidRecord>
    where
        Fut: Future<Output = Result<()>>,
    {
        let name = record.name.clone();
        match self.iids.create(ns, record).await {
            Ok(record) => Ok(record),
            Err(err) => {
                tracing::error!("Failed to persist {} in {}: {}", name, ns, err);
                Err(compensate(err, &name, rollback).await)
            }
        }
    }

    /// Removes the identity record after the provider side of a delete
    ///
    /// Under `force` a provider failure is logged and the record goes anyway.
    pub(crate) async fn finish_delete(
        &self,
        ns: &Namespace,
        name: &str,
        provider_result: Result<()>,
        force: bool,
    ) -> Result<IidRecord> {
        if let Err(err) = provider_result {
            if !force {
                return Err(err);
            }
            tracing::warn!("Forcing removal of {} in {} after: {}", name, ns, err);
        }
        self.iids.delete(ns, name).await
    }

    /// User IID for a provider-returned IID; untracked ids keep an empty name
    pub(crate) async fn to_user_iid(&self, ns: &Namespace, iid: &Iid) -> Result<Iid> {
        if iid.system_id.is_empty() {
            return Ok(iid.clone());
        }
        match self.iids.get_by_system_id(ns, &iid.system_id).await {
            Ok(record) => Ok(record.user_iid()),
            Err(err) if err.is_not_found() => Ok(Iid::system(iid.system_id.clone())),
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn to_user_iids(&self, ns: &Namespace, iids: &[Iid]) -> Result<Vec<Iid>> {
        let mut translated = Vec::with_capacity(iids.len());
        for iid in iids {
            translated.push(self.to_user_iid(ns, iid).await?);
        }
        Ok(translated)
    }

    /// User name of the VPC with `system_id`, empty when untracked
    pub(crate) async fn vpc_name_of(&self, connection: &str, vpc: &Iid) -> Result<String> {
        let ns = Namespace::global(connection, ResourceKind::Vpc);
        Ok(self.to_user_iid(&ns, vpc).await?.name_id)
    }

    /// Locks a named resource of `kind`
    ///
    /// A subnet is locked through the name of the VPC that owns it, the same
    /// key every subnet change takes.
    pub(crate) async fn lock_resource(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
        mode: LockMode,
    ) -> Result<NamedLockGuard> {
        let (locks, key) = match self.locks.of(kind) {
            Some(locks) => (locks, name.to_string()),
            None => {
                let (ns, _) = self.lookup(connection, kind, name).await?;
                (&self.locks.vpc, ns.parent)
            }
        };
        Ok(match mode {
            LockMode::Exclusive => locks.lock(connection, &key).await,
            LockMode::Shared => locks.rlock(connection, &key).await,
        })
    }

    /// Identity record of a named resource and the namespace holding it
    pub(crate) async fn lookup(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<(Namespace, IidRecord)> {
        let group = IidGroup::of(kind);
        if group.is_hierarchical() {
            return self.iids.find_in_group(group, connection, name).await;
        }
        let ns = Namespace::global(connection, kind);
        let record = self.iids.get(&ns, name).await?;
        Ok((ns, record))
    }

    /// Every identity record of a kind with its namespace
    pub(crate) async fn tracked(
        &self,
        connection: &str,
        kind: ResourceKind,
    ) -> Result<Vec<(Namespace, IidRecord)>> {
        let group = IidGroup::of(kind);
        if group.is_hierarchical() {
            return self.iids.list_group(group, connection).await;
        }
        let ns = Namespace::global(connection, kind);
        Ok(self
            .iids
            .list(&ns)
            .await?
            .into_iter()
            .map(|record| (ns.clone(), record))
            .collect())
    }
}
