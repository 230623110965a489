use super::orchestrate::{Provider, check_input, confirmed, fan_out};
use crate::error::Result;
use crate::iid::{IidRecord, Namespace};
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{Iid, KeyPairInfo, KeyPairReqInfo, ResourceKind};

const KIND: ResourceKind = ResourceKind::KeyPair;

impl CloudRuntime {
    /// Creates a key pair; the private key is only ever returned here
    pub async fn create_key(&self, connection: &str, req: KeyPairReqInfo) -> Result<KeyPairInfo> {
        let name = check_input("key pair name", &req.iid.name_id)?;
        tracing::info!("Creating key pair {} on {}", name, connection);

        let provider = self.connect(connection).await?;
        let _lock = self.locks.keypair.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        self.ensure_absent(&ns, &name).await?;

        let key_id = self.iids.new_id(connection, KIND, &name);
        let handler = provider.keypair()?;
        let driver_req = KeyPairReqInfo {
            iid: Iid::named(&key_id),
            tags: req.tags,
        };
        let mut info = provider
            .call(KIND, &name, "create_key", handler.create_key(driver_req))
            .await?;
        let key_iid = Iid::new(&key_id, &info.iid.system_id);

        let record = self
            .persist_or_rollback(
                &ns,
                IidRecord::new(&name, &key_id, &info.iid.system_id),
                async {
                    let deleted = provider
                        .call(KIND, &name, "delete_key", handler.delete_key(&key_iid))
                        .await?;
                    confirmed(deleted, "key pair rollback")
                },
            )
            .await?;

        info.iid = record.user_iid();
        Ok(info)
    }

    async fn fetch_key(&self, provider: &Provider, record: IidRecord) -> Result<KeyPairInfo> {
        let handler = provider.keypair()?;
        let mut info = provider
            .call(KIND, &record.name, "get_key", handler.get_key(&record.driver_iid()))
            .await?;
        info.iid = record.user_iid();
        info.private_key = None;
        Ok(info)
    }

    pub async fn list_key(&self, connection: &str) -> Result<Vec<KeyPairInfo>> {
        let provider = self.connect(connection).await?;
        let records = self.iids.list(&Namespace::global(connection, KIND)).await?;
        fan_out(records, |record| self.fetch_key(&provider, record)).await
    }

    pub async fn get_key(&self, connection: &str, name: &str) -> Result<KeyPairInfo> {
        let name = check_input("key pair name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self.locks.keypair.rlock(connection, &name).await;

        let record = self
            .iids
            .get(&Namespace::global(connection, KIND), &name)
            .await?;
        self.fetch_key(&provider, record).await
    }

    pub async fn delete_key(&self, connection: &str, name: &str, force: bool) -> Result<bool> {
        let name = check_input("key pair name", name)?;
        tracing::info!("Deleting key pair {} on {} (force: {})", name, connection, force);
        let provider = self.connect(connection).await?;
        let _lock = self.locks.keypair.lock(connection, &name).await;

        let ns = Namespace::global(connection, KIND);
        let record = self.iids.get(&ns, &name).await?;
        let result = async {
            let handler = provider.keypair()?;
            let deleted = provider
                .call(KIND, &name, "delete_key", handler.delete_key(&record.driver_iid()))
                .await?;
            confirmed(deleted, "key pair delete")
        }
        .await;

        self.finish_delete(&ns, &name, result, force).await?;
        Ok(true)
    }
}
