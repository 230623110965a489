use super::generator::IdGenerator;
use super::record::IidRecord;
use super::store::{self, IidStore};
use super::{IidGroup, Namespace};
use crate::error::{Result, RuntimeError};
use cloudweave_cloud::ResourceKind;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Typed access to identity records on top of an [`IidStore`]
///
/// Creates are only atomic for one name while the caller holds that name's
/// named lock.
pub struct IidManager {
    store: Arc<dyn IidStore>,
    generator: IdGenerator,
}

impl IidManager {
    pub fn new(store: Arc<dyn IidStore>) -> Self {
        Self {
            store,
            generator: IdGenerator::new(),
        }
    }

    /// Fresh id to hand to a driver in place of `name`
    pub fn new_id(&self, connection: &str, kind: ResourceKind, name: &str) -> String {
        self.generator.generate(connection, kind, name)
    }

    pub async fn create(&self, ns: &Namespace, record: IidRecord) -> Result<IidRecord> {
        let key = store::record_key(ns, &record.name);
        if self.store.get(&key).await?.is_some() {
            return Err(RuntimeError::AlreadyExists(format!(
                "{} {}",
                ns, record.name
            )));
        }
        self.store.put(&key, record.to_stored()).await?;
        tracing::debug!("Created IID {} in {}", record.name, ns);
        Ok(record)
    }

    pub async fn get(&self, ns: &Namespace, name: &str) -> Result<IidRecord> {
        let key = store::record_key(ns, name);
        match self.store.get(&key).await? {
            Some(value) => Ok(IidRecord::from_stored(name, &value)?),
            None => Err(RuntimeError::NotFound(format!("{} {}", ns, name))),
        }
    }

    /// Reverse lookup by provider id
    pub async fn get_by_system_id(&self, ns: &Namespace, system_id: &str) -> Result<IidRecord> {
        self.list(ns)
            .await?
            .into_iter()
            .find(|r| r.system_id == system_id)
            .ok_or_else(|| RuntimeError::NotFound(format!("{} system id {}", ns, system_id)))
    }

    pub async fn is_exist(&self, ns: &Namespace, name: &str) -> Result<bool> {
        let key = store::record_key(ns, name);
        Ok(self.store.get(&key).await?.is_some())
    }

    /// Every record of a namespace, empty when there are none
    pub async fn list(&self, ns: &Namespace) -> Result<Vec<IidRecord>> {
        let prefix = store::namespace_prefix(ns);
        self.store
            .list_prefix(&prefix)
            .await?
            .into_iter()
            .map(|(key, value)| {
                let name = store::unescape(&key[prefix.len()..]);
                IidRecord::from_stored(name, &value).map_err(RuntimeError::from)
            })
            .collect()
    }

    /// Distinct parent keys that hold records of `group`
    pub async fn list_resource_type(
        &self,
        group: IidGroup,
        connection: &str,
    ) -> Result<Vec<String>> {
        let prefix = store::group_prefix(group, connection);
        let parents: BTreeSet<String> = self
            .store
            .list_prefix(&prefix)
            .await?
            .into_iter()
            .filter_map(|(key, _)| {
                key[prefix.len()..]
                    .split('/')
                    .next()
                    .map(store::unescape)
            })
            .collect();
        Ok(parents.into_iter().collect())
    }

    /// Number of records of `kind` in `connection`, or in every connection
    pub async fn count(&self, kind: ResourceKind, connection: Option<&str>) -> Result<usize> {
        let group = IidGroup::of(kind);
        let prefix = match connection {
            Some(connection) => store::group_prefix(group, connection),
            None => store::group_root(group),
        };
        let entries = self.store.list_prefix(&prefix).await?;
        if group.is_hierarchical() {
            return Ok(entries.len());
        }
        // flat kinds share the global group; the kind is the parent segment
        let kind_segment = kind.as_str();
        Ok(entries
            .iter()
            .filter(|(key, _)| {
                let mut rest = key[prefix.len()..].split('/');
                if connection.is_none() {
                    rest.next();
                }
                rest.next() == Some(kind_segment)
            })
            .count())
    }

    pub async fn delete(&self, ns: &Namespace, name: &str) -> Result<IidRecord> {
        let key = store::record_key(ns, name);
        match self.store.delete(&key).await? {
            Some(value) => {
                tracing::debug!("Deleted IID {} in {}", name, ns);
                Ok(IidRecord::from_stored(name, &value)?)
            }
            None => Err(RuntimeError::NotFound(format!("{} {}", ns, name))),
        }
    }

    /// Finds `name` under any parent of a hierarchical group
    pub async fn find_in_group(
        &self,
        group: IidGroup,
        connection: &str,
        name: &str,
    ) -> Result<(Namespace, IidRecord)> {
        for parent in self.list_resource_type(group, connection).await? {
            let ns = Namespace::child(group, connection, parent);
            if self.is_exist(&ns, name).await? {
                let record = self.get(&ns, name).await?;
                return Ok((ns, record));
            }
        }
        Err(RuntimeError::NotFound(format!(
            "{}/{} {}",
            group, connection, name
        )))
    }

    /// Every record of a hierarchical group with the namespace it lives in
    pub async fn list_group(
        &self,
        group: IidGroup,
        connection: &str,
    ) -> Result<Vec<(Namespace, IidRecord)>> {
        let mut all = Vec::new();
        for parent in self.list_resource_type(group, connection).await? {
            let ns = Namespace::child(group, connection, parent);
            for record in self.list(&ns).await? {
                all.push((ns.clone(), record));
            }
        }
        Ok(all)
    }
}
