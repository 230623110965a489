//! CloudWeave driver contract
//!
//! This crate defines the interface between the CloudWeave runtime and the
//! per-provider drivers: the identifier pair, the request/info structures of
//! every resource kind, one handler trait per kind and the gateway that
//! resolves a connection name to a live driver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               cloudweave-runtime                 │
//! │   (identity store, locks, resource managers)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │ DriverGateway::resolve(conn)
//! ┌─────────────────▼───────────────────────────────┐
//! │               cloudweave-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait CloudDriver { vpc_handler() ... }  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Iid / kinds  │  │ DriverError  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  mock driver  │ │ other drivers │
//! └───────────────┘ └───────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod iid;
pub mod kind;
pub mod resources;

// Re-exports
pub use driver::{
    CloudDriver, DiskHandler, DriverCapability, DriverFactory, DriverGateway, FileSystemHandler,
    KeyPairHandler, MyImageHandler, NlbHandler, SecurityHandler, TagHandler, VmHandler,
    VpcHandler,
};
pub use error::{DriverError, Result};
pub use iid::Iid;
pub use kind::ResourceKind;
pub use resources::*;
