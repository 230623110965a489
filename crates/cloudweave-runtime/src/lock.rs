//! Keyed lock registry
//!
//! Exclusive and shared locks keyed by `(connection, resource name)`. Entries
//! are created on first use and removed when the last holder or waiter lets
//! go. Registries are per resource kind, so unrelated kinds never contend.

use cloudweave_cloud::ResourceKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type LockKey = (String, String);
type LockMap = Mutex<HashMap<LockKey, Arc<RwLock<()>>>>;

/// Registry of named locks for one resource kind
#[derive(Default)]
pub struct NamedLocks {
    entries: Arc<LockMap>,
}

enum Held {
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
}

/// Holds a named lock until dropped
///
/// Not re-entrant: a task must not acquire a key it already holds.
pub struct NamedLockGuard {
    held: Option<Held>,
    key: LockKey,
    lock: Arc<RwLock<()>>,
    entries: Arc<LockMap>,
}

impl NamedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, connection: &str, name: &str) -> (LockKey, Arc<RwLock<()>>) {
        let key = (connection.to_string(), name.to_string());
        let lock = self
            .entries
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone();
        (key, lock)
    }

    /// Waits until no other task holds `name` in any mode
    pub async fn lock(&self, connection: &str, name: &str) -> NamedLockGuard {
        let (key, lock) = self.entry(connection, name);
        let guard = lock.clone().write_owned().await;
        NamedLockGuard {
            held: Some(Held::Exclusive(guard)),
            key,
            lock,
            entries: self.entries.clone(),
        }
    }

    /// Waits until no other task holds `name` exclusively
    pub async fn rlock(&self, connection: &str, name: &str) -> NamedLockGuard {
        let (key, lock) = self.entry(connection, name);
        let guard = lock.clone().read_owned().await;
        NamedLockGuard {
            held: Some(Held::Shared(guard)),
            key,
            lock,
            entries: self.entries.clone(),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// One line per live entry: `connection/name: <users>`
    pub fn status(&self) -> String {
        let entries = self.entries.lock();
        let mut keys: Vec<_> = entries.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for ((connection, name), lock) in keys {
            // one reference is the map's; every holder or waiter keeps two,
            // its guard's and the one moved into the tokio lock guard
            let users = (Arc::strong_count(lock) - 1) / 2;
            let _ = writeln!(out, "{}/{}: {}", connection, name, users);
        }
        out
    }
}

impl NamedLockGuard {
    pub fn is_exclusive(&self) -> bool {
        matches!(self.held, Some(Held::Exclusive(_)))
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        // release before inspecting the reference count
        self.held.take();
        let mut entries = self.entries.lock();
        // map + this guard: nobody else holds or waits
        if Arc::strong_count(&self.lock) == 2
            && entries
                .get(&self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &self.lock))
        {
            entries.remove(&self.key);
        }
    }
}

/// How a named lock is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Exclusive,
    Shared,
}

/// One registry per resource kind
///
/// Subnets have no registry of their own: every subnet operation locks the
/// owning VPC's name in `vpc`.
#[derive(Default)]
pub struct ResourceLocks {
    pub vpc: NamedLocks,
    pub security_group: NamedLocks,
    pub keypair: NamedLocks,
    pub vm: NamedLocks,
    pub disk: NamedLocks,
    pub myimage: NamedLocks,
    pub nlb: NamedLocks,
    pub filesystem: NamedLocks,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry keyed by the resource's own name, `None` for subnets
    pub fn of(&self, kind: ResourceKind) -> Option<&NamedLocks> {
        match kind {
            ResourceKind::Vpc => Some(&self.vpc),
            ResourceKind::Subnet => None,
            ResourceKind::SecurityGroup => Some(&self.security_group),
            ResourceKind::KeyPair => Some(&self.keypair),
            ResourceKind::Vm => Some(&self.vm),
            ResourceKind::Disk => Some(&self.disk),
            ResourceKind::MyImage => Some(&self.myimage),
            ResourceKind::Nlb => Some(&self.nlb),
            ResourceKind::FileSystem => Some(&self.filesystem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_reclaimed_after_release() {
        let locks = NamedLocks::new();
        {
            let guard = locks.lock("c1", "vm-1").await;
            assert!(guard.is_exclusive());
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_readers_share() {
        let locks = NamedLocks::new();
        let a = locks.rlock("c1", "vpc").await;
        let b = locks.rlock("c1", "vpc").await;
        assert!(!a.is_exclusive());
        assert_eq!(locks.len(), 1);
        drop(a);
        assert_eq!(locks.len(), 1);
        drop(b);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_writer_excludes_reader() {
        let locks = Arc::new(NamedLocks::new());
        let writer = locks.lock("c1", "vpc").await;

        let pending = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.rlock("c1", "vpc").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(writer);
        pending.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let locks = NamedLocks::new();
        let _a = locks.lock("c1", "vm-1").await;
        let _b = locks.lock("c1", "vm-2").await;
        let _c = locks.lock("c2", "vm-1").await;
        assert_eq!(locks.len(), 3);
        assert!(locks.status().contains("c2/vm-1: 1"));
    }

    #[tokio::test]
    async fn test_status_counts_holders_and_waiters() {
        let locks = Arc::new(NamedLocks::new());
        let writer = locks.lock("c", "vm").await;
        assert_eq!(locks.status(), "c/vm: 1\n");

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.rlock("c", "vm").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(locks.status(), "c/vm: 2\n");

        drop(writer);
        waiting.await.unwrap();
        assert_eq!(locks.status(), "");

        let _a = locks.rlock("c", "vpc").await;
        let _b = locks.rlock("c", "vpc").await;
        assert_eq!(locks.status(), "c/vpc: 2\n");
    }

    #[tokio::test]
    async fn test_mutual_exclusion_under_contention() {
        let locks = Arc::new(NamedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("c1", "same").await;
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn test_subnet_has_no_registry_of_its_own() {
        let locks = ResourceLocks::new();
        assert!(locks.of(ResourceKind::Subnet).is_none());
        assert!(std::ptr::eq(
            locks.of(ResourceKind::Vpc).unwrap(),
            &locks.vpc
        ));
    }
}
