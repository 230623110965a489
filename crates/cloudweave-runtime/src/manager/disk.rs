//! Disk operations
//!
//! Attach and detach return once the provider reports the new owner, polled
//! with the disk waiter.

use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use crate::waiter::poll_until;
use cloudweave_cloud::{DiskHandler, DiskInfo, DiskReqInfo, Iid, ResourceKind};
use std::sync::Arc;

const KIND: ResourceKind = ResourceKind::Disk;

impl CloudRuntime {
    pub async fn create_disk(&self, connection: &str, req: DiskReqInfo) -> Result<DiskInfo> {
        let name = check_input("disk name", &req.iid.name_id)?;
        tracing::info!("Creating disk {} on {}", name, connection);

        let provider = self.connect(connection).await?;
        let _lock = self.locks.disk.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        self.ensure_absent(&ns, &name).await?;

        let disk_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.disk()?;
        let driver_req = DiskReqInfo {
            iid: Iid::named(&disk_id),
            ..req
        };
        let info = provider
            .call(KIND, &name, "create_disk", handler.create_disk(driver_req))
            .await?;
        let disk_iid = Iid::new(&disk_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &ns,
                IidRecord::new(&name, &disk_id, &info.iid.system_id),
                delete_provider_disk(&provider, &handler, &name, &disk_iid),
            )
            .await?;

        self.translate_disk(connection, &record, info).await
    }

    async fn translate_disk(
        &self,
        connection: &str,
        record: &IidRecord,
        mut info: DiskInfo,
    ) -> Result<DiskInfo> {
        info.iid = record.user_iid();
        info.owner_vm = match info.owner_vm.take() {
            Some(vm) => {
                let vm_ns = Namespace::global(connection, ResourceKind::Vm);
                Some(self.to_user_iid(&vm_ns, &vm).await?)
            }
            None => None,
        };
        Ok(info)
    }

    async fn fetch_disk(
        &self,
        provider: &Provider,
        connection: &str,
        record: IidRecord,
    ) -> Result<DiskInfo> {
        let handler = provider.disk()?;
        let info = provider
            .call(KIND, &record.name, "get_disk", handler.get_disk(&record.driver_iid()))
            .await?;
        self.translate_disk(connection, &record, info).await
    }

    pub async fn list_disk(&self, connection: &str) -> Result<Vec<DiskInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| self.fetch_disk(&provider, connection, record)).await
    }

    pub async fn get_disk(&self, connection: &str, name: &str) -> Result<DiskInfo> {
        let name = check_input("disk name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.disk.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        self.fetch_disk(&provider, connection, record).await
    }

    /// Grows a disk; shrinking or keeping the size is rejected
    pub async fn change_disk_size(&self, connection: &str, name: &str, size_gb: u64) -> Result<bool> {
        let name = check_input("disk name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.disk.lock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let handler = provider.disk()?;
        let iid = record.driver_iid();
        let current = provider
            .call(KIND, &name, "get_disk", handler.get_disk(&iid))
            .await?;
        if size_gb <= current.disk_size {
            return Err(RuntimeError::InvalidInput(format!(
                "disk {} is {} GB, new size {} GB must be larger",
                name, current.disk_size, size_gb
            )));
        }

        tracing::info!("Resizing disk {} to {} GB on {}", name, size_gb, connection);
        provider
            .call(
                KIND,
                &name,
                "change_disk_size",
                handler.change_disk_size(&iid, size_gb),
            )
            .await
    }

    pub async fn delete_disk(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("disk name", name)?;
        tracing::info!("Deleting disk {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.disk.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        let record = self.iids.get(&ns, &name).await?;
        let result = match provider.disk() {
            Ok(handler) => {
                delete_provider_disk(&provider, &handler, &name, &record.driver_iid()).await
            }
            Err(err) => Err(err),
        };

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }

    /// Attaches a disk and waits until the provider lists the VM as owner
    pub async fn attach_disk(&self, connection: &str, disk: &str, vm: &str) -> Result<DiskInfo> {
        let disk = check_input("disk name", disk)?;
        let vm = check_input("vm name", vm)?;
        tracing::info!("Attaching disk {} to VM {} on {}", disk, vm, connection);
        let provider = self.connect(connection).await?;
        let _vm_lock = self.locks.vm.rlock(connection, &vm).await;
        let _lock = self.locks.disk.lock(connection, &disk).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &disk).await?;
        let vm_record = self
            .iids
            .get(&Namespace::global(connection, ResourceKind::Vm), &vm)
            .await?;
        let handler = provider.disk()?;
        let disk_iid = record.driver_iid();
        let vm_iid = vm_record.driver_iid();
        provider
            .call(KIND, &disk, "attach_disk", handler.attach_disk(&disk_iid, &vm_iid))
            .await?;

        let what = format!("disk {} to attach to VM {}", disk, vm);
        let info = poll_until(&self.settings.waiters.disk, &what, || {
            owner_change(&provider, &handler, &disk, &disk_iid, Some(vm_iid.system_id.as_str()))
        })
        .await?;
        self.translate_disk(connection, &record, info).await
    }

    /// Detaches a disk and waits until the provider reports no owner
    pub async fn detach_disk(&self, connection: &str, disk: &str, vm: &str) -> Result<bool> {
        let disk = check_input("disk name", disk)?;
        let vm = check_input("vm name", vm)?;
        tracing::info!("Detaching disk {} from VM {} on {}", disk, vm, connection);
        let provider = self.connect(connection).await?;
        let _vm_lock = self.locks.vm.rlock(connection, &vm).await;
        let _lock = self.locks.disk.lock(connection, &disk).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &disk).await?;
        let vm_record = self
            .iids
            .get(&Namespace::global(connection, ResourceKind::Vm), &vm)
            .await?;
        let handler = provider.disk()?;
        let disk_iid = record.driver_iid();
        let detached = provider
            .call(
                KIND,
                &disk,
                "detach_disk",
                handler.detach_disk(&disk_iid, &vm_record.driver_iid()),
            )
            .await?;
        confirmed(detached, "disk detach")?;

        let what = format!("disk {} to detach from VM {}", disk, vm);
        poll_until(&self.settings.waiters.disk, &what, || {
            owner_change(&provider, &handler, &disk, &disk_iid, None)
        })
        .await?;
        Ok(true)
    }
}

async fn delete_provider_disk(
    provider: &Provider,
    handler: &Arc<dyn DiskHandler>,
    name: &str,
    iid: &Iid,
) -> Result<()> {
    let deleted = provider
        .call(KIND, name, "delete_disk", handler.delete_disk(iid))
        .await?;
    confirmed(deleted, "disk delete")
}

/// Ready once the disk's owner matches `owner` (a provider VM id, or none)
async fn owner_change(
    provider: &Provider,
    handler: &Arc<dyn DiskHandler>,
    name: &str,
    iid: &Iid,
    owner: Option<&str>,
) -> Result<Option<DiskInfo>> {
    let info = provider
        .call(KIND, name, "get_disk", handler.get_disk(iid))
        .await?;
    let current = info.owner_vm.as_ref().map(|vm| vm.system_id.as_str());
    Ok((current == owner).then_some(info))
}
