//! Tag operations on any tracked resource
//!
//! The resource kind picks the namespace the name is looked up in; the
//! provider only ever sees the driver IID.

use super::orchestrate::check_input;
use crate::error::Result;
use crate::lock::LockMode;
use crate::runtime::CloudRuntime;
use cloudweave_cloud::{Iid, KeyValue, ResourceKind, TagInfo};
use std::collections::HashMap;

impl CloudRuntime {
    pub async fn add_tag(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
        tag: KeyValue,
    ) -> Result<KeyValue> {
        let name = check_input("resource name", name)?;
        let key = check_input("tag key", &tag.key)?;
        tracing::info!("Tagging {} {} with {} on {}", kind, name, key, connection);
        let provider = self.connect(connection).await?;
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Shared)
            .await?;

        let (_, record) = self.lookup(connection, kind, &name).await?;
        let handler = provider.tag()?;
        let tag = KeyValue::new(key, tag.value);
        provider
            .call(kind, &name, "add_tag", handler.add_tag(kind, &record.driver_iid(), tag))
            .await
    }

    pub async fn list_tag(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Vec<KeyValue>> {
        let name = check_input("resource name", name)?;
        let provider = self.connect(connection).await?;
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Shared)
            .await?;

        let (_, record) = self.lookup(connection, kind, &name).await?;
        let handler = provider.tag()?;
        provider
            .call(kind, &name, "list_tag", handler.list_tag(kind, &record.driver_iid()))
            .await
    }

    pub async fn get_tag(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
        key: &str,
    ) -> Result<KeyValue> {
        let name = check_input("resource name", name)?;
        let key = check_input("tag key", key)?;
        let provider = self.connect(connection).await?;
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Shared)
            .await?;

        let (_, record) = self.lookup(connection, kind, &name).await?;
        let handler = provider.tag()?;
        provider
            .call(
                kind,
                &name,
                "get_tag",
                handler.get_tag(kind, &record.driver_iid(), &key),
            )
            .await
    }

    pub async fn remove_tag(
        &self,
        connection: &str,
        kind: ResourceKind,
        name: &str,
        key: &str,
    ) -> Result<bool> {
        let name = check_input("resource name", name)?;
        let key = check_input("tag key", key)?;
        tracing::info!("Removing tag {} from {} {} on {}", key, kind, name, connection);
        let provider = self.connect(connection).await?;
        let _lock = self
            .lock_resource(connection, kind, &name, LockMode::Shared)
            .await?;

        let (_, record) = self.lookup(connection, kind, &name).await?;
        let handler = provider.tag()?;
        provider
            .call(
                kind,
                &name,
                "remove_tag",
                handler.remove_tag(kind, &record.driver_iid(), &key),
            )
            .await
    }

    /// Resources of `kind` whose tag keys or values contain `keyword`
    ///
    /// An empty keyword matches every tagged resource. Untracked resources are
    /// returned with an empty user name.
    pub async fn find_tag(
        &self,
        connection: &str,
        kind: ResourceKind,
        keyword: &str,
    ) -> Result<Vec<TagInfo>> {
        let provider = self.connect(connection).await?;
        let handler = provider.tag()?;
        let found = provider
            .call(kind, keyword, "find_tag", handler.find_tag(kind, keyword.trim()))
            .await?;

        let names: HashMap<String, String> = self
            .tracked(connection, kind)
            .await?
            .into_iter()
            .map(|(_, record)| (record.system_id, record.name))
            .collect();
        Ok(found
            .into_iter()
            .map(|mut info| {
                let system_id = info.resource_iid.system_id;
                info.resource_iid = match names.get(&system_id) {
                    Some(name) => Iid::new(name, system_id),
                    None => Iid::system(system_id),
                };
                info
            })
            .collect())
    }
}
