//! VM operations
//!
//! A start runs `Creating -> Running` through the public-IP waiter and then
//! probes the guest before returning. Termination waits for `Terminated`
//! before the identity record is dropped.

use super::orchestrate::{Provider, check_input, fan_out};
use crate::error::{Result, RuntimeError};
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::probe::{ReadinessProbe, ssh_address};
use crate::runtime::CloudRuntime;
use crate::waiter::poll_until;
use cloudweave_cloud::{
    DriverError, Iid, ImageType, Platform, ResourceKind, VmControl, VmHandler, VmInfo, VmReqInfo,
    VmStatus, VmStatusInfo,
};
use std::sync::Arc;

const KIND: ResourceKind = ResourceKind::Vm;

/// Providers whose guests are never probed
const UNPROBED_PROVIDERS: &[&str] = &["MOCK"];

impl CloudRuntime {
    pub async fn start_vm(&self, connection: &str, req: VmReqInfo) -> Result<VmInfo> {
        let name = check_input("vm name", &req.iid.name_id)?;
        let image = if req.image_iid.name_id.trim().is_empty() {
            check_input("image", &req.image_iid.system_id)?
        } else {
            req.image_iid.name_id.trim().to_string()
        };
        let vpc_name = check_input("vpc name", &req.vpc_iid.name_id)?;
        let subnet_name = check_input("subnet name", &req.subnet_iid.name_id)?;
        let spec = check_input("vm spec", &req.vm_spec_name)?;
        let sg_names = req
            .security_group_iids
            .iter()
            .map(|sg| check_input("security group name", &sg.name_id))
            .collect::<Result<Vec<_>>>()?;
        let disk_names = req
            .data_disk_iids
            .iter()
            .map(|disk| check_input("disk name", &disk.name_id))
            .collect::<Result<Vec<_>>>()?;
        let key_name = req.key_pair_iid.name_id.trim().to_string();
        tracing::info!("Starting VM {} on {}", name, connection);

        let provider = self.connect(connection).await?;
        let _vpc_lock = self.locks.vpc.rlock(connection, &vpc_name).await;
        let _lock = self.locks.vm.lock(connection, &name).await;

        let vm_ns = Namespace::global(connection, KIND);
        self.ensure_absent(&vm_ns, &name).await?;

        let vpc = self
            .iids
            .get(&Namespace::global(connection, ResourceKind::Vpc), &vpc_name)
            .await?;
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
        let subnet = self.iids.get(&subnet_ns, &subnet_name).await?;
        let sg_ns = Namespace::child(IidGroup::SecurityGroup, connection, &vpc_name);
        let mut security_groups = Vec::with_capacity(sg_names.len());
        for sg_name in &sg_names {
            security_groups.push(self.iids.get(&sg_ns, sg_name).await?.driver_iid());
        }
        let key_pair = if key_name.is_empty() {
            Iid::default()
        } else {
            let key_ns = Namespace::global(connection, ResourceKind::KeyPair);
            self.iids.get(&key_ns, &key_name).await?.driver_iid()
        };
        let image_iid = match req.image_type {
            ImageType::My => {
                let image_ns = Namespace::global(connection, ResourceKind::MyImage);
                self.iids.get(&image_ns, &image).await?.driver_iid()
            }
            ImageType::Public => Iid::new(&image, &image),
        };
        let disk_ns = Namespace::global(connection, ResourceKind::Disk);
        let mut data_disks = Vec::with_capacity(disk_names.len());
        for disk_name in &disk_names {
            data_disks.push(self.iids.get(&disk_ns, disk_name).await?.driver_iid());
        }

        let vm_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.vm()?;
        let platform = req.platform;
        let driver_req = VmReqInfo {
            iid: Iid::named(&vm_id),
            image_type: req.image_type,
            image_iid,
            vpc_iid: vpc.driver_iid(),
            subnet_iid: subnet.driver_iid(),
            security_group_iids: security_groups,
            vm_spec_name: spec,
            key_pair_iid: key_pair,
            root_disk_type: req.root_disk_type,
            root_disk_size: req.root_disk_size,
            data_disk_iids: data_disks,
            vm_user_id: req.vm_user_id,
            vm_user_passwd: req.vm_user_passwd,
            platform,
            tags: req.tags,
        };
        let info = provider
            .call(KIND, &name, "start_vm", handler.start_vm(driver_req))
            .await?;
        let vm_iid = Iid::new(&vm_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &vm_ns,
                IidRecord::new(&name, &vm_id, &info.iid.system_id),
                self.terminate_and_wait(&provider, &name, &vm_iid),
            )
            .await?;

        let info = self.wait_for_boot(&provider, &handler, &name, &vm_iid).await?;
        if platform == Platform::Windows || UNPROBED_PROVIDERS.contains(&provider.name()) {
            tracing::debug!("Skipping readiness probe for {}", name);
        } else {
            self.wait_for_guest(&name, &info).await?;
        }

        tracing::info!("VM {} is running ({})", name, info.public_ip);
        self.translate_vm(connection, &record, info).await
    }

    /// Polls until the VM is Running with a public IP
    async fn wait_for_boot(
        &self,
        provider: &Provider,
        handler: &Arc<dyn VmHandler>,
        name: &str,
        iid: &Iid,
    ) -> Result<VmInfo> {
        let what = format!("VM {} to get a public IP", name);
        poll_until(&self.settings.waiters.vm_public_ip, &what, || {
            boot_progress(provider, handler, name, iid)
        })
        .await
    }

    /// Polls the guest's SSH endpoint until it accepts connections
    async fn wait_for_guest(&self, name: &str, info: &VmInfo) -> Result<()> {
        let Some(address) = ssh_address(&info.public_ip, &info.ssh_access_point) else {
            return Err(RuntimeError::InvalidInput(format!("VM {} has no address to probe", name)));
        };
        let what = format!("VM {} to accept connections on {}", name, address);
        poll_until(&self.settings.waiters.vm_ssh, &what, || {
            guest_ready(&self.probe, &address)
        })
        .await
    }

    /// Terminates and polls until the provider reports the VM gone
    pub(crate) async fn terminate_and_wait(
        &self,
        provider: &Provider,
        name: &str,
        iid: &Iid,
    ) -> Result<()> {
        let handler = provider.vm()?;
        match provider
            .call(KIND, name, "terminate_vm", handler.terminate_vm(iid))
            .await
        {
            Ok(status) if status.is_terminal() => return Ok(()),
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        let what = format!("VM {} to terminate", name);
        poll_until(&self.settings.waiters.vm_terminate, &what, || {
            termination_progress(provider, &handler, name, iid)
        })
        .await
    }

    pub(crate) async fn translate_vm(
        &self,
        connection: &str,
        record: &IidRecord,
        mut info: VmInfo,
    ) -> Result<VmInfo> {
        info.iid = record.user_iid();

        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        info.vpc_iid = self.to_user_iid(&vpc_ns, &info.vpc_iid).await?;
        let vpc_name = info.vpc_iid.name_id.clone();
        if !vpc_name.is_empty() {
            let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
            info.subnet_iid = self.to_user_iid(&subnet_ns, &info.subnet_iid).await?;
            let sg_ns = Namespace::child(IidGroup::SecurityGroup, connection, &vpc_name);
            info.security_group_iids = self.to_user_iids(&sg_ns, &info.security_group_iids).await?;
        }

        let key_ns = Namespace::global(connection, ResourceKind::KeyPair);
        info.key_pair_iid = self.to_user_iid(&key_ns, &info.key_pair_iid).await?;
        info.image_iid = match info.image_type {
            ImageType::My => {
                let image_ns = Namespace::global(connection, ResourceKind::MyImage);
                self.to_user_iid(&image_ns, &info.image_iid).await?
            }
            ImageType::Public => Iid::new(&info.image_iid.system_id, &info.image_iid.system_id),
        };
        let disk_ns = Namespace::global(connection, ResourceKind::Disk);
        info.data_disk_iids = self.to_user_iids(&disk_ns, &info.data_disk_iids).await?;
        Ok(info)
    }

    async fn fetch_vm(
        &self,
        provider: &Provider,
        connection: &str,
        record: IidRecord,
    ) -> Result<VmInfo> {
        let handler = provider.vm()?;
        let info = provider
            .call(KIND, &record.name, "get_vm", handler.get_vm(&record.driver_iid()))
            .await?;
        self.translate_vm(connection, &record, info).await
    }

    pub async fn list_vm(&self, connection: &str) -> Result<Vec<VmInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| self.fetch_vm(&provider, connection, record)).await
    }

    pub async fn get_vm(&self, connection: &str, name: &str) -> Result<VmInfo> {
        let name = check_input("vm name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.vm.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        self.fetch_vm(&provider, connection, record).await
    }

    async fn fetch_vm_status(&self, provider: &Provider, record: IidRecord) -> Result<VmStatusInfo> {
        let handler = provider.vm()?;
        let status = match provider
            .call(
                KIND,
                &record.name,
                "get_vm_status",
                handler.get_vm_status(&record.driver_iid()),
            )
            .await
        {
            Ok(status) => status,
            Err(err) if err.is_not_found() => VmStatus::NotExist,
            Err(err) => return Err(err),
        };
        Ok(VmStatusInfo {
            iid: record.user_iid(),
            status,
        })
    }

    /// Status of every tracked VM; vanished VMs report `NotExist`
    pub async fn list_vm_status(&self, connection: &str) -> Result<Vec<VmStatusInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| self.fetch_vm_status(&provider, record)).await
    }

    pub async fn get_vm_status(&self, connection: &str, name: &str) -> Result<VmStatus> {
        let name = check_input("vm name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.vm.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let handler = provider.vm()?;
        provider
            .call(
                KIND,
                &name,
                "get_vm_status",
                handler.get_vm_status(&record.driver_iid()),
            )
            .await
    }

    pub async fn control_vm(
        &self,
        connection: &str,
        name: &str,
        action: VmControl,
    ) -> Result<VmStatus> {
        let name = check_input("vm name", name)?;
        tracing::info!("{:?} VM {} on {}", action, name, connection);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.vm.lock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let iid = record.driver_iid();
        let handler = provider.vm()?;
        match action {
            VmControl::Suspend => {
                provider
                    .call(KIND, &name, "suspend_vm", handler.suspend_vm(&iid))
                    .await
            }
            VmControl::Resume => {
                provider
                    .call(KIND, &name, "resume_vm", handler.resume_vm(&iid))
                    .await
            }
            VmControl::Reboot => {
                provider
                    .call(KIND, &name, "reboot_vm", handler.reboot_vm(&iid))
                    .await
            }
        }
    }

    /// Terminates a VM and drops its record once the provider reports it gone
    ///
    /// Under `force` the record is dropped even when termination fails or
    /// times out.
    pub async fn terminate_vm(&self, connection: &str, name: &str, force: bool) -> Result<VmStatus> {
        let name = check_input("vm name", name)?;
        tracing::info!("Terminating VM {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.vm.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        let record = self.iids.get(&ns, &name).await?;
        let result = self
            .terminate_and_wait(&provider, &name, &record.driver_iid())
            .await;

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(VmStatus::Terminated)
    }
}

async fn boot_progress(
    provider: &Provider,
    handler: &Arc<dyn VmHandler>,
    name: &str,
    iid: &Iid,
) -> Result<Option<VmInfo>> {
    let status = provider
        .call(KIND, name, "get_vm_status", handler.get_vm_status(iid))
        .await?;
    match status {
        VmStatus::Running => {
            let info = provider
                .call(KIND, name, "get_vm", handler.get_vm(iid))
                .await?;
            Ok((!info.public_ip.is_empty()).then_some(info))
        }
        VmStatus::Failed | VmStatus::Terminated | VmStatus::NotExist => Err(DriverError::fatal(
            format!("VM {} went {} while booting", name, status),
        )
        .into()),
        _ => Ok(None),
    }
}

async fn termination_progress(
    provider: &Provider,
    handler: &Arc<dyn VmHandler>,
    name: &str,
    iid: &Iid,
) -> Result<Option<()>> {
    match provider
        .call(KIND, name, "get_vm_status", handler.get_vm_status(iid))
        .await
    {
        Ok(status) if status.is_terminal() => Ok(Some(())),
        Ok(_) => Ok(None),
        Err(err) if err.is_not_found() => Ok(Some(())),
        Err(err) => Err(err),
    }
}

async fn guest_ready(probe: &Arc<dyn ReadinessProbe>, address: &str) -> Result<Option<()>> {
    Ok(probe.is_ready(address).await.then_some(()))
}
