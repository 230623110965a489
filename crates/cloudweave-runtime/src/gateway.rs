//! Config-backed driver gateway
//!
//! Resolves connection names through a [`ConnectionCatalog`] and hands out
//! one driver per connection, built by the factory registered for the
//! connection's provider.

use async_trait::async_trait;
use cloudweave_cloud::{CloudDriver, DriverError, DriverFactory, DriverGateway, RegionInfo};
use cloudweave_config::ConnectionCatalog;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ConfigGateway {
    catalog: ConnectionCatalog,
    factories: HashMap<String, Arc<dyn DriverFactory>>,
    drivers: Mutex<HashMap<String, Arc<dyn CloudDriver>>>,
}

impl ConfigGateway {
    pub fn new(catalog: ConnectionCatalog) -> Self {
        Self {
            catalog,
            factories: HashMap::new(),
            drivers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `factory` under its provider name, replacing any previous one
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        let provider = factory.provider_name().to_uppercase();
        tracing::debug!("Registered driver factory for {}", provider);
        self.factories.insert(provider, factory);
    }

    pub fn with_factory(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn catalog(&self) -> &ConnectionCatalog {
        &self.catalog
    }
}

fn connection_not_found(connection: &str) -> DriverError {
    DriverError::ConnectionNotFound(connection.to_string())
}

#[async_trait]
impl DriverGateway for ConfigGateway {
    async fn resolve(&self, connection: &str) -> cloudweave_cloud::Result<Arc<dyn CloudDriver>> {
        if let Some(driver) = self.drivers.lock().get(connection) {
            return Ok(driver.clone());
        }

        let provider = self.provider_name(connection)?;
        let factory = self
            .factories
            .get(&provider)
            .ok_or_else(|| DriverError::Unsupported(format!("no driver for provider {}", provider)))?;
        let region = self.region(connection)?;
        let driver = factory.connect(connection, &region)?;

        // a concurrent resolve may have won; keep the first driver
        let mut drivers = self.drivers.lock();
        let driver = drivers
            .entry(connection.to_string())
            .or_insert(driver)
            .clone();
        Ok(driver)
    }

    fn provider_name(&self, connection: &str) -> cloudweave_cloud::Result<String> {
        self.catalog
            .provider_name(connection)
            .map_err(|_| connection_not_found(connection))
    }

    fn region(&self, connection: &str) -> cloudweave_cloud::Result<RegionInfo> {
        let (region, zone) = self
            .catalog
            .region(connection)
            .map_err(|_| connection_not_found(connection))?;
        Ok(RegionInfo { region, zone })
    }
}
