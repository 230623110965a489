//! CloudWeave runtime
//!
//! Keeps user-chosen names stable on top of whatever identifiers each cloud
//! provider assigns, and serializes conflicting operations on one resource.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  CloudRuntime                    │
//! │      create / list / get / delete per kind       │
//! └───┬────────────┬────────────┬────────────┬───────┘
//!     │            │            │            │
//! ┌───▼────┐  ┌────▼─────┐  ┌───▼────┐  ┌────▼─────┐
//! │  iid   │  │   lock   │  │ waiter │  │ gateway  │
//! │ store  │  │ registry │  │        │  │ (driver) │
//! └────────┘  └──────────┘  └────────┘  └──────────┘
//! ```
//!
//! Every provider resource is tracked as a record `{user name, generated id,
//! provider id}`. Callers only ever see `{user name, provider id}`; drivers
//! only ever see `{generated id, provider id}`.

pub mod calllog;
pub mod error;
pub mod gateway;
pub mod iid;
pub mod lock;
pub mod logging;
pub mod manager;
pub mod probe;
pub mod reconcile;
pub mod runtime;
pub mod waiter;

// Re-exports
pub use error::{Result, RuntimeError};
pub use gateway::ConfigGateway;
pub use iid::{
    IidGroup, IidManager, IidRecord, IidStore, JsonFileStore, MemoryStore, Namespace, StoreError,
};
pub use lock::{LockMode, NamedLockGuard, NamedLocks, ResourceLocks};
pub use manager::{CspResourceInfo, DestroyFailure, DestroyReport};
pub use probe::{ReadinessProbe, TcpProbe};
pub use reconcile::{AllResourceList, classify};
pub use runtime::CloudRuntime;
pub use waiter::{Waiter, poll_until};
