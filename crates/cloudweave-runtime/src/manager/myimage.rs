use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::Result;
use crate::iid::{IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{Iid, MyImageHandler, MyImageInfo, MyImageReqInfo, ResourceKind};
use std::sync::Arc;

const KIND: ResourceKind = ResourceKind::MyImage;

impl CloudRuntime {
    /// Captures a tracked VM as a reusable image
    pub async fn snapshot_vm(&self, connection: &str, req: MyImageReqInfo) -> Result<MyImageInfo> {
        let name = check_input("image name", &req.iid.name_id)?;
        let vm_name = check_input("source vm name", &req.source_vm.name_id)?;
        tracing::info!("Snapshotting VM {} as {} on {}", vm_name, name, connection);

        let provider = self.connect(connection).await?;
        let _vm_lock = self.locks.vm.rlock(connection, &vm_name).await;
        let _lock = self.locks.myimage.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        self.ensure_absent(&ns, &name).await?;
        let vm_record = self
            .iids
            .get(&Namespace::global(connection, ResourceKind::Vm), &vm_name)
            .await?;

        let image_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.myimage()?;
        let driver_req = MyImageReqInfo {
            iid: Iid::named(&image_id),
            source_vm: vm_record.driver_iid(),
            tags: req.tags,
        };
        let mut info = provider
            .call(KIND, &name, "snapshot_vm", handler.snapshot_vm(driver_req))
            .await?;
        let image_iid = Iid::new(&image_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &ns,
                IidRecord::new(&name, &image_id, &info.iid.system_id),
                delete_provider_image(&provider, &handler, &name, &image_iid),
            )
            .await?;

        info.iid = record.user_iid();
        info.source_vm = vm_record.user_iid();
        Ok(info)
    }

    async fn fetch_my_image(
        &self,
        provider: &Provider,
        connection: &str,
        record: IidRecord,
    ) -> Result<MyImageInfo> {
        let handler = provider.myimage()?;
        let mut info = provider
            .call(
                KIND,
                &record.name,
                "get_my_image",
                handler.get_my_image(&record.driver_iid()),
            )
            .await?;
        info.iid = record.user_iid();
        let vm_ns = Namespace::global(connection, ResourceKind::Vm);
        info.source_vm = self.to_user_iid(&vm_ns, &info.source_vm).await?;
        Ok(info)
    }

    pub async fn list_my_image(&self, connection: &str) -> Result<Vec<MyImageInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| {
            self.fetch_my_image(&provider, connection, record)
        })
        .await
    }

    pub async fn get_my_image(&self, connection: &str, name: &str) -> Result<MyImageInfo> {
        let name = check_input("image name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.myimage.rlock(connection, &name).await;

        let record = self.iids.get(&Namespace::global(connection, KIND), &name).await?;
        self.fetch_my_image(&provider, connection, record).await
    }

    pub async fn delete_my_image(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("image name", name)?;
        tracing::info!("Deleting image {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.myimage.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        let record = self.iids.get(&ns, &name).await?;
        let result = match provider.myimage() {
            Ok(handler) => {
                delete_provider_image(&provider, &handler, &name, &record.driver_iid()).await
            }
            Err(err) => Err(err),
        };

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }
}

async fn delete_provider_image(
    provider: &Provider,
    handler: &Arc<dyn MyImageHandler>,
    name: &str,
    iid: &Iid,
) -> Result<()> {
    let deleted = provider
        .call(KIND, name, "delete_my_image", handler.delete_my_image(iid))
        .await?;
    confirmed(deleted, "image delete")
}
