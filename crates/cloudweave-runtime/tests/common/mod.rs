use async_trait::async_trait;
use cloudweave_cloud::{
    CloudDriver, DriverFactory, Iid, KeyPairReqInfo, RegionInfo, SecurityReqInfo, SecurityRule,
    SubnetInfo, VmReqInfo, VpcReqInfo,
};
use cloudweave_cloud_mock::{MOCK_PROVIDER, MockCloud, MockDriverFactory, MockOptions};
use cloudweave_config::{ConnectionCatalog, ConnectionConfig, RuntimeSettings, WaitSpec};
use cloudweave_runtime::{
    CloudRuntime, ConfigGateway, IidStore, MemoryStore, ReadinessProbe, StoreError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub const CONN: &str = "mock-1";

/// A runtime wired to one mock connection
pub struct TestCloud {
    pub runtime: CloudRuntime,
    pub cloud: Arc<MockCloud>,
}

impl TestCloud {
    pub fn new() -> Self {
        Self::build(MockOptions::default(), Arc::new(MemoryStore::new()), None)
    }

    #[allow(dead_code)]
    pub fn with_options(options: MockOptions) -> Self {
        Self::build(options, Arc::new(MemoryStore::new()), None)
    }

    #[allow(dead_code)]
    pub fn with_store(store: Arc<dyn IidStore>) -> Self {
        Self::build(MockOptions::default(), store, None)
    }

    /// A mock cloud under a provider name whose guests get probed
    #[allow(dead_code)]
    pub fn probed(probe: Arc<dyn ReadinessProbe>) -> Self {
        Self::build(
            MockOptions::default(),
            Arc::new(MemoryStore::new()),
            Some(probe),
        )
    }

    fn build(
        options: MockOptions,
        store: Arc<dyn IidStore>,
        probe: Option<Arc<dyn ReadinessProbe>>,
    ) -> Self {
        let region = RegionInfo {
            region: "mock-region".to_string(),
            zone: "mock-zone-a".to_string(),
        };
        let mock = Arc::new(MockDriverFactory::new(options));
        let cloud = mock.cloud(CONN, &region);
        let (provider, factory) = match probe {
            Some(_) => (LAB_PROVIDER, Arc::new(LabFactory(mock)) as Arc<dyn DriverFactory>),
            None => (MOCK_PROVIDER, mock as Arc<dyn DriverFactory>),
        };
        let catalog = ConnectionCatalog::new(vec![ConnectionConfig::new(
            CONN,
            provider,
            &region.region,
            &region.zone,
        )])
        .unwrap();
        let gateway = ConfigGateway::new(catalog).with_factory(factory);
        let mut runtime = CloudRuntime::new(Arc::new(gateway), store, fast_settings());
        if let Some(probe) = probe {
            runtime = runtime.with_probe(probe);
        }
        Self { runtime, cloud }
    }

    /// VPC `vpc-1` with subnet `subnet-1`, security group `sg-1` and key `key-1`
    #[allow(dead_code)]
    pub async fn network(&self) {
        self.runtime
            .create_vpc(CONN, vpc_req("vpc-1", &[("subnet-1", "10.0.1.0/24")]))
            .await
            .unwrap();
        self.runtime
            .create_security(CONN, sg_req("sg-1", "vpc-1"))
            .await
            .unwrap();
        self.runtime
            .create_key(
                CONN,
                KeyPairReqInfo {
                    iid: Iid::named("key-1"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
}

/// One-second polls with a short budget; tests run on paused time
pub fn fast_settings() -> RuntimeSettings {
    let mut settings = RuntimeSettings::default();
    settings.waiters.vm_public_ip = WaitSpec::new(1, 5);
    settings.waiters.vm_ssh = WaitSpec::new(1, 5);
    settings.waiters.vm_terminate = WaitSpec::new(1, 5);
    settings.waiters.disk = WaitSpec::new(1, 5);
    settings
}

pub fn vpc_req(name: &str, subnets: &[(&str, &str)]) -> VpcReqInfo {
    VpcReqInfo {
        iid: Iid::named(name),
        ipv4_cidr: "10.0.0.0/16".to_string(),
        subnets: subnets
            .iter()
            .map(|(subnet, cidr)| SubnetInfo::new(Iid::named(*subnet), *cidr))
            .collect(),
        tags: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn sg_req(name: &str, vpc: &str) -> SecurityReqInfo {
    SecurityReqInfo {
        iid: Iid::named(name),
        vpc_iid: Iid::named(vpc),
        rules: vec![SecurityRule::inbound_tcp(22, "0.0.0.0/0")],
        tags: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn vm_req(name: &str) -> VmReqInfo {
    VmReqInfo {
        iid: Iid::named(name),
        image_iid: Iid::named("ubuntu-22.04"),
        vpc_iid: Iid::named("vpc-1"),
        subnet_iid: Iid::named("subnet-1"),
        security_group_iids: vec![Iid::named("sg-1")],
        vm_spec_name: "t3.micro".to_string(),
        key_pair_iid: Iid::named("key-1"),
        ..Default::default()
    }
}

/// Memory store whose writes can be made to fail
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IidStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.delete(key).await
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.inner.list_prefix(prefix).await
    }
}

const LAB_PROVIDER: &str = "LAB";

/// Mock driver registered under a provider name the runtime probes
struct LabFactory(Arc<MockDriverFactory>);

impl DriverFactory for LabFactory {
    fn provider_name(&self) -> &str {
        LAB_PROVIDER
    }

    fn connect(
        &self,
        connection: &str,
        region: &RegionInfo,
    ) -> cloudweave_cloud::Result<Arc<dyn CloudDriver>> {
        self.0.connect(connection, region)
    }
}

/// Probe that answers ready from its `ready_after`-th call on
#[allow(dead_code)]
pub struct CountingProbe {
    ready_after: u32,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl CountingProbe {
    pub fn new(ready_after: u32) -> Self {
        Self {
            ready_after,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessProbe for CountingProbe {
    async fn is_ready(&self, _address: &str) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        call >= self.ready_after
    }
}
