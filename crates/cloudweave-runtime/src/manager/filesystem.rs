//! Shared file system operations
//!
//! File systems are flat records; their access subnets are tracked under the
//! owning VPC and resolved from there.

use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::Result;
use crate::iid::{IidGroup, IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{FileSystemHandler, FileSystemInfo, FileSystemReqInfo, Iid, ResourceKind};
use std::sync::Arc;

const KIND: ResourceKind = ResourceKind::FileSystem;

impl CloudRuntime {
    pub async fn create_file_system(
        &self,
        connection: &str,
        req: FileSystemReqInfo,
    ) -> Result<FileSystemInfo> {
        let name = check_input("file system name", &req.iid.name_id)?;
        let vpc_name = check_input("vpc name", &req.vpc_iid.name_id)?;
        let subnet_names = req
            .access_subnets
            .iter()
            .map(|subnet| check_input("subnet name", &subnet.name_id))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!("Creating file system {} in VPC {} on {}", name, vpc_name, connection);

        let provider = self.connect(connection).await?;
        let _vpc_lock = self.locks.vpc.rlock(connection, &vpc_name).await;
        let _lock = self.locks.filesystem.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        self.ensure_absent(&ns, &name).await?;
        let vpc_record = self
            .iids
            .get(&Namespace::global(connection, ResourceKind::Vpc), &vpc_name)
            .await?;
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
        let mut access_subnets = Vec::with_capacity(subnet_names.len());
        for subnet_name in &subnet_names {
            access_subnets.push(self.iids.get(&subnet_ns, subnet_name).await?.driver_iid());
        }

        let fs_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.filesystem()?;
        let driver_req = FileSystemReqInfo {
            iid: Iid::named(&fs_id),
            vpc_iid: vpc_record.driver_iid(),
            access_subnets,
            nfs_version: req.nfs_version,
            capacity_gb: req.capacity_gb,
            tags: req.tags,
        };
        let info = provider
            .call(
                KIND,
                &name,
                "create_file_system",
                handler.create_file_system(driver_req),
            )
            .await?;
        let fs_iid = Iid::new(&fs_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &ns,
                IidRecord::new(&name, &fs_id, &info.iid.system_id),
                delete_provider_fs(&provider, &handler, &name, &fs_iid),
            )
            .await?;

        self.translate_file_system(connection, &record, info).await
    }

    async fn translate_file_system(
        &self,
        connection: &str,
        record: &IidRecord,
        mut info: FileSystemInfo,
    ) -> Result<FileSystemInfo> {
        info.iid = record.user_iid();
        let vpc_ns = Namespace::global(connection, ResourceKind::Vpc);
        info.vpc_iid = self.to_user_iid(&vpc_ns, &info.vpc_iid).await?;
        info.access_subnets = self
            .subnet_names(connection, &info.vpc_iid.name_id, &info.access_subnets)
            .await?;
        Ok(info)
    }

    /// User IIDs of provider subnets under a VPC, empty names when untracked
    async fn subnet_names(
        &self,
        connection: &str,
        vpc_name: &str,
        subnets: &[Iid],
    ) -> Result<Vec<Iid>> {
        if vpc_name.is_empty() {
            return Ok(subnets
                .iter()
                .map(|subnet| Iid::system(subnet.system_id.clone()))
                .collect());
        }
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, vpc_name);
        self.to_user_iids(&subnet_ns, subnets).await
    }

    async fn fetch_file_system(
        &self,
        provider: &Provider,
        connection: &str,
        record: IidRecord,
    ) -> Result<FileSystemInfo> {
        let handler = provider.filesystem()?;
        let info = provider
            .call(
                KIND,
                &record.name,
                "get_file_system",
                handler.get_file_system(&record.driver_iid()),
            )
            .await?;
        self.translate_file_system(connection, &record, info).await
    }

    pub async fn list_file_system(&self, connection: &str) -> Result<Vec<FileSystemInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| {
            self.fetch_file_system(&provider, connection, record)
        })
        .await
    }

    pub async fn get_file_system(&self, connection: &str, name: &str) -> Result<FileSystemInfo> {
        let name = check_input("file system name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.filesystem.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        self.fetch_file_system(&provider, connection, record).await
    }

    pub async fn delete_file_system(
        &self,
        connection: &str,
        name: &str,
        force: bool,
    ) -> Result<bool> {
        let name = check_input("file system name", name)?;
        tracing::info!("Deleting file system {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.filesystem.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        let record = self.iids.get(&ns, &name).await?;
        let result = match provider.filesystem() {
            Ok(handler) => {
                delete_provider_fs(&provider, &handler, &name, &record.driver_iid()).await
            }
            Err(err) => Err(err),
        };

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }

    /// Resolves a subnet name under the file system's VPC
    async fn access_subnet(
        &self,
        provider: &Provider,
        connection: &str,
        record: &IidRecord,
        subnet: &str,
    ) -> Result<Iid> {
        let handler = provider.filesystem()?;
        let info = provider
            .call(
                KIND,
                &record.name,
                "get_file_system",
                handler.get_file_system(&record.driver_iid()),
            )
            .await?;
        let vpc_name = self.vpc_name_of(connection, &info.vpc_iid).await?;
        let subnet_ns = Namespace::child(IidGroup::Subnet, connection, &vpc_name);
        Ok(self.iids.get(&subnet_ns, subnet).await?.driver_iid())
    }

    pub async fn add_access_subnet(
        &self,
        connection: &str,
        name: &str,
        subnet: &str,
    ) -> Result<FileSystemInfo> {
        let name = check_input("file system name", name)?;
        let subnet = check_input("subnet name", subnet)?;
        tracing::info!("Opening file system {} to subnet {} on {}", name, subnet, connection);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.filesystem.lock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let subnet_iid = self
            .access_subnet(&provider, connection, &record, &subnet)
            .await?;
        let handler = provider.filesystem()?;
        let info = provider
            .call(
                KIND,
                &name,
                "add_access_subnet",
                handler.add_access_subnet(&record.driver_iid(), &subnet_iid),
            )
            .await?;
        self.translate_file_system(connection, &record, info).await
    }

    pub async fn remove_access_subnet(
        &self,
        connection: &str,
        name: &str,
        subnet: &str,
    ) -> Result<bool> {
        let name = check_input("file system name", name)?;
        let subnet = check_input("subnet name", subnet)?;
        tracing::info!("Closing file system {} to subnet {} on {}", name, subnet, connection);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.filesystem.lock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let subnet_iid = self
            .access_subnet(&provider, connection, &record, &subnet)
            .await?;
        let handler = provider.filesystem()?;
        provider
            .call(
                KIND,
                &name,
                "remove_access_subnet",
                handler.remove_access_subnet(&record.driver_iid(), &subnet_iid),
            )
            .await
    }

    pub async fn list_access_subnet(&self, connection: &str, name: &str) -> Result<Vec<Iid>> {
        let name = check_input("file system name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.filesystem.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        let handler = provider.filesystem()?;
        let iid = record.driver_iid();
        let info = provider
            .call(KIND, &name, "get_file_system", handler.get_file_system(&iid))
            .await?;
        let subnets = provider
            .call(KIND, &name, "list_access_subnet", handler.list_access_subnet(&iid))
            .await?;
        let vpc_name = self.vpc_name_of(connection, &info.vpc_iid).await?;
        self.subnet_names(connection, &vpc_name, &subnets).await
    }
}

async fn delete_provider_fs(
    provider: &Provider,
    handler: &Arc<dyn FileSystemHandler>,
    name: &str,
    iid: &Iid,
) -> Result<()> {
    let deleted = provider
        .call(KIND, name, "delete_file_system", handler.delete_file_system(iid))
        .await?;
    confirmed(deleted, "file system delete")
}
