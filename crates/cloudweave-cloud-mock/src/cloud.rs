//! In-memory provider state

use crate::error::{MockError, Result};
use cloudweave_cloud::{
    DiskInfo, DriverError, FileSystemInfo, KeyPairInfo, KeyValue, MyImageInfo, NlbInfo,
    RegionInfo, ResourceKind, SecurityInfo, VmInfo, VmStatus, VpcInfo,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation class used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Create,
    Get,
    List,
    Delete,
    /// Control, attach, rule and membership changes
    Update,
}

/// Tunables of a mock cloud
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Status polls a new VM reports `Creating` before it turns `Running`
    pub boot_polls: u32,
    /// Status polls a terminating VM reports `Terminating` before it is gone
    pub terminate_polls: u32,
    /// Reported through the driver capability
    pub single_vpc: bool,
    /// Port of the SSH access point handed out with public IPs
    pub ssh_port: u16,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            boot_polls: 1,
            terminate_polls: 1,
            single_vpc: false,
            ssh_port: 22,
        }
    }
}

#[derive(Debug)]
struct Fault {
    kind: ResourceKind,
    op: MockOp,
    error: DriverError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct MockVm {
    pub info: VmInfo,
    pub status: VmStatus,
    pub pending_polls: u32,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub vpcs: BTreeMap<String, VpcInfo>,
    pub security_groups: BTreeMap<String, SecurityInfo>,
    pub keys: BTreeMap<String, KeyPairInfo>,
    pub vms: BTreeMap<String, MockVm>,
    pub disks: BTreeMap<String, DiskInfo>,
    pub images: BTreeMap<String, MyImageInfo>,
    pub nlbs: BTreeMap<String, NlbInfo>,
    pub file_systems: BTreeMap<String, FileSystemInfo>,
    pub tags: HashMap<(ResourceKind, String), Vec<KeyValue>>,
}

impl MockState {
    pub(crate) fn exists(&self, kind: ResourceKind, system_id: &str) -> bool {
        match kind {
            ResourceKind::Vpc => self.vpcs.contains_key(system_id),
            ResourceKind::Subnet => self
                .vpcs
                .values()
                .any(|vpc| vpc.subnets.iter().any(|s| s.iid.system_id == system_id)),
            ResourceKind::SecurityGroup => self.security_groups.contains_key(system_id),
            ResourceKind::KeyPair => self.keys.contains_key(system_id),
            ResourceKind::Vm => self.vms.contains_key(system_id),
            ResourceKind::Disk => self.disks.contains_key(system_id),
            ResourceKind::MyImage => self.images.contains_key(system_id),
            ResourceKind::Nlb => self.nlbs.contains_key(system_id),
            ResourceKind::FileSystem => self.file_systems.contains_key(system_id),
        }
    }
}

/// The provider side of one mock connection
///
/// All handlers of a [`MockDriver`](crate::MockDriver) share this state, and
/// tests use it to seed resources, simulate drift and plant failures.
pub struct MockCloud {
    pub(crate) state: Mutex<MockState>,
    faults: Mutex<Vec<Fault>>,
    next_id: AtomicU64,
    options: MockOptions,
    region: RegionInfo,
}

impl MockCloud {
    pub fn new(region: RegionInfo, options: MockOptions) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            faults: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            options,
            region,
        }
    }

    pub fn options(&self) -> &MockOptions {
        &self.options
    }

    pub fn region(&self) -> &RegionInfo {
        &self.region
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:08x}", prefix, n)
    }

    /// Fails the next `op` on `kind` with `error`
    pub fn fail_next(&self, kind: ResourceKind, op: MockOp, error: DriverError) {
        self.fail_times(kind, op, 1, error);
    }

    pub fn fail_times(&self, kind: ResourceKind, op: MockOp, times: u32, error: DriverError) {
        self.faults.lock().push(Fault {
            kind,
            op,
            error,
            remaining: Some(times),
        });
    }

    /// Fails every `op` on `kind` until [`clear_faults`](Self::clear_faults)
    pub fn fail_always(&self, kind: ResourceKind, op: MockOp, error: DriverError) {
        self.faults.lock().push(Fault {
            kind,
            op,
            error,
            remaining: None,
        });
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    pub(crate) fn check_fault(&self, kind: ResourceKind, op: MockOp) -> Result<()> {
        let mut faults = self.faults.lock();
        let Some(pos) = faults.iter().position(|f| f.kind == kind && f.op == op) else {
            return Ok(());
        };
        let error = faults[pos].error.clone();
        let exhausted = match faults[pos].remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            faults.remove(pos);
        }
        tracing::debug!("Injected fault on {} {:?}: {}", kind, op, error);
        Err(MockError::Injected(error))
    }

    /// Places a VPC on the provider without going through a handler
    pub fn insert_vpc(&self, info: VpcInfo) {
        self.state
            .lock()
            .vpcs
            .insert(info.iid.system_id.clone(), info);
    }

    pub fn insert_security(&self, info: SecurityInfo) {
        self.state
            .lock()
            .security_groups
            .insert(info.iid.system_id.clone(), info);
    }

    pub fn insert_key(&self, info: KeyPairInfo) {
        self.state
            .lock()
            .keys
            .insert(info.iid.system_id.clone(), info);
    }

    /// Places a running VM on the provider
    pub fn insert_vm(&self, info: VmInfo) {
        let vm = MockVm {
            info,
            status: VmStatus::Running,
            pending_polls: 0,
        };
        self.state
            .lock()
            .vms
            .insert(vm.info.iid.system_id.clone(), vm);
    }

    pub fn insert_disk(&self, info: DiskInfo) {
        self.state
            .lock()
            .disks
            .insert(info.iid.system_id.clone(), info);
    }

    pub fn insert_file_system(&self, info: FileSystemInfo) {
        self.state
            .lock()
            .file_systems
            .insert(info.iid.system_id.clone(), info);
    }

    /// Drops a resource behind the runtime's back
    pub fn remove(&self, kind: ResourceKind, system_id: &str) -> bool {
        let mut state = self.state.lock();
        match kind {
            ResourceKind::Vpc => state.vpcs.remove(system_id).is_some(),
            ResourceKind::Subnet => state.vpcs.values_mut().any(|vpc| {
                let before = vpc.subnets.len();
                vpc.subnets.retain(|s| s.iid.system_id != system_id);
                before != vpc.subnets.len()
            }),
            ResourceKind::SecurityGroup => state.security_groups.remove(system_id).is_some(),
            ResourceKind::KeyPair => state.keys.remove(system_id).is_some(),
            ResourceKind::Vm => state.vms.remove(system_id).is_some(),
            ResourceKind::Disk => state.disks.remove(system_id).is_some(),
            ResourceKind::MyImage => state.images.remove(system_id).is_some(),
            ResourceKind::Nlb => state.nlbs.remove(system_id).is_some(),
            ResourceKind::FileSystem => state.file_systems.remove(system_id).is_some(),
        }
    }

    pub fn contains(&self, kind: ResourceKind, system_id: &str) -> bool {
        self.state.lock().exists(kind, system_id)
    }

    /// Number of live resources of a kind
    pub fn count(&self, kind: ResourceKind) -> usize {
        let state = self.state.lock();
        match kind {
            ResourceKind::Vpc => state.vpcs.len(),
            ResourceKind::Subnet => state.vpcs.values().map(|v| v.subnets.len()).sum(),
            ResourceKind::SecurityGroup => state.security_groups.len(),
            ResourceKind::KeyPair => state.keys.len(),
            ResourceKind::Vm => state.vms.len(),
            ResourceKind::Disk => state.disks.len(),
            ResourceKind::MyImage => state.images.len(),
            ResourceKind::Nlb => state.nlbs.len(),
            ResourceKind::FileSystem => state.file_systems.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudweave_cloud::Iid;

    fn cloud() -> MockCloud {
        MockCloud::new(RegionInfo::default(), MockOptions::default())
    }

    #[test]
    fn test_fault_fires_once() {
        let cloud = cloud();
        cloud.fail_next(ResourceKind::Vpc, MockOp::Create, DriverError::fatal("quota"));

        assert!(cloud.check_fault(ResourceKind::Vpc, MockOp::Delete).is_ok());
        assert!(cloud.check_fault(ResourceKind::Vpc, MockOp::Create).is_err());
        assert!(cloud.check_fault(ResourceKind::Vpc, MockOp::Create).is_ok());
    }

    #[test]
    fn test_fault_forever_until_cleared() {
        let cloud = cloud();
        cloud.fail_always(ResourceKind::Vm, MockOp::Get, DriverError::fatal("down"));
        for _ in 0..3 {
            assert!(cloud.check_fault(ResourceKind::Vm, MockOp::Get).is_err());
        }
        cloud.clear_faults();
        assert!(cloud.check_fault(ResourceKind::Vm, MockOp::Get).is_ok());
    }

    #[test]
    fn test_insert_and_remove() {
        let cloud = cloud();
        cloud.insert_vm(VmInfo {
            iid: Iid::system("i-1234"),
            ..Default::default()
        });
        assert!(cloud.contains(ResourceKind::Vm, "i-1234"));
        assert_eq!(cloud.count(ResourceKind::Vm), 1);
        assert!(cloud.remove(ResourceKind::Vm, "i-1234"));
        assert!(!cloud.remove(ResourceKind::Vm, "i-1234"));
    }
}
