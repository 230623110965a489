//! Mock driver and factory

use crate::cloud::{MockCloud, MockOptions};
use cloudweave_cloud::{
    CloudDriver, DiskHandler, DriverCapability, DriverFactory, FileSystemHandler, KeyPairHandler,
    MyImageHandler, NlbHandler, RegionInfo, Result, SecurityHandler, TagHandler, VmHandler,
    VpcHandler,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider name of the mock driver
pub const MOCK_PROVIDER: &str = "MOCK";

/// Handler set backed by a [`MockCloud`]
pub(crate) struct MockHandler {
    pub(crate) cloud: Arc<MockCloud>,
}

/// Driver for one mock connection
pub struct MockDriver {
    cloud: Arc<MockCloud>,
}

impl MockDriver {
    pub fn new(cloud: Arc<MockCloud>) -> Self {
        Self { cloud }
    }

    pub fn cloud(&self) -> &Arc<MockCloud> {
        &self.cloud
    }

    fn handler(&self) -> Arc<MockHandler> {
        Arc::new(MockHandler {
            cloud: self.cloud.clone(),
        })
    }
}

impl CloudDriver for MockDriver {
    fn provider_name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn capability(&self) -> DriverCapability {
        DriverCapability {
            single_vpc: self.cloud.options().single_vpc,
        }
    }

    fn vpc_handler(&self) -> Result<Arc<dyn VpcHandler>> {
        Ok(self.handler())
    }

    fn security_handler(&self) -> Result<Arc<dyn SecurityHandler>> {
        Ok(self.handler())
    }

    fn keypair_handler(&self) -> Result<Arc<dyn KeyPairHandler>> {
        Ok(self.handler())
    }

    fn vm_handler(&self) -> Result<Arc<dyn VmHandler>> {
        Ok(self.handler())
    }

    fn disk_handler(&self) -> Result<Arc<dyn DiskHandler>> {
        Ok(self.handler())
    }

    fn myimage_handler(&self) -> Result<Arc<dyn MyImageHandler>> {
        Ok(self.handler())
    }

    fn nlb_handler(&self) -> Result<Arc<dyn NlbHandler>> {
        Ok(self.handler())
    }

    fn tag_handler(&self) -> Result<Arc<dyn TagHandler>> {
        Ok(self.handler())
    }

    fn filesystem_handler(&self) -> Result<Arc<dyn FileSystemHandler>> {
        Ok(self.handler())
    }
}

/// Hands out one shared [`MockCloud`] per connection name
#[derive(Default)]
pub struct MockDriverFactory {
    options: MockOptions,
    clouds: Mutex<HashMap<String, Arc<MockCloud>>>,
}

impl MockDriverFactory {
    pub fn new(options: MockOptions) -> Self {
        Self {
            options,
            clouds: Mutex::new(HashMap::new()),
        }
    }

    /// Provider state behind `connection`, created on first use
    pub fn cloud(&self, connection: &str, region: &RegionInfo) -> Arc<MockCloud> {
        self.clouds
            .lock()
            .entry(connection.to_string())
            .or_insert_with(|| Arc::new(MockCloud::new(region.clone(), self.options.clone())))
            .clone()
    }
}

impl DriverFactory for MockDriverFactory {
    fn provider_name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn connect(&self, connection: &str, region: &RegionInfo) -> Result<Arc<dyn CloudDriver>> {
        tracing::debug!("Connecting mock driver: {}", connection);
        Ok(Arc::new(MockDriver::new(self.cloud(connection, region))))
    }
}
