//! Runtime entry point

use crate::error::Result;
use crate::gateway::ConfigGateway;
use crate::iid::{IidManager, IidStore, JsonFileStore, MemoryStore};
use crate::lock::ResourceLocks;
use crate::probe::{ReadinessProbe, TcpProbe};
use cloudweave_cloud::{DriverFactory, DriverGateway};
use cloudweave_config::{CloudweaveConfig, RuntimeSettings};
use std::sync::Arc;

/// Owns the identity store, the lock registries and the driver gateway
///
/// Resource operations are `impl` blocks in [`crate::manager`]; every one of
/// them is safe to call concurrently from many tasks.
pub struct CloudRuntime {
    pub(crate) gateway: Arc<dyn DriverGateway>,
    pub(crate) iids: IidManager,
    pub(crate) locks: ResourceLocks,
    pub(crate) settings: RuntimeSettings,
    pub(crate) probe: Arc<dyn ReadinessProbe>,
}

impl CloudRuntime {
    pub fn new(
        gateway: Arc<dyn DriverGateway>,
        store: Arc<dyn IidStore>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            gateway,
            iids: IidManager::new(store),
            locks: ResourceLocks::new(),
            settings,
            probe: Arc::new(TcpProbe::default()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Builds a runtime from a loaded config
    ///
    /// The identity store is file-backed when `runtime.store.path` is set and
    /// in-memory otherwise.
    pub async fn from_config(
        config: CloudweaveConfig,
        factories: Vec<Arc<dyn DriverFactory>>,
    ) -> Result<Self> {
        let mut gateway = ConfigGateway::new(config.connections);
        for factory in factories {
            gateway.register(factory);
        }

        let store: Arc<dyn IidStore> = match &config.runtime.store.path {
            Some(dir) => {
                let store = JsonFileStore::open(dir).await?;
                tracing::info!("Identity store: {}", store.path().display());
                Arc::new(store)
            }
            None => {
                tracing::info!("Identity store: in-memory");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(Arc::new(gateway), store, config.runtime))
    }

    pub fn iids(&self) -> &IidManager {
        &self.iids
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudweave_cloud_mock::MockDriverFactory;

    #[tokio::test]
    async fn test_from_config_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "connections:\n  - {{ name: m1, provider: mock, region: r1 }}\nruntime:\n  store:\n    path: {}\n",
            dir.path().display()
        );
        let config = CloudweaveConfig::from_yaml_str(&yaml).unwrap();
        let runtime = CloudRuntime::from_config(config, vec![Arc::new(MockDriverFactory::default())])
            .await
            .unwrap();
        assert_eq!(runtime.settings().destroy_retries, 3);
        assert!(runtime.gateway.resolve("m1").await.is_ok());
    }
}
