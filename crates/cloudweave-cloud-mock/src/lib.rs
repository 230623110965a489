//! In-memory mock provider for CloudWeave
//!
//! This crate implements every handler trait of `cloudweave-cloud` against
//! process-local state, so the runtime can be exercised without a real
//! cloud account.
//!
//! # Features
//!
//! - VPC/subnet, security group, key pair, VM, disk, image, NLB, file system and tag handlers
//! - VM status transitions driven by status polls (boot and termination)
//! - Fault injection per resource kind and operation class
//! - Seeding and removal of provider resources behind the runtime's back
//!
//! # Example
//!
//! ```ignore
//! use cloudweave_cloud::{DriverError, DriverFactory, RegionInfo, ResourceKind};
//! use cloudweave_cloud_mock::{MockDriverFactory, MockOp};
//!
//! let factory = MockDriverFactory::default();
//! let cloud = factory.cloud("mock-conn", &RegionInfo::default());
//!
//! // Next VPC create fails with a provider error
//! cloud.fail_next(ResourceKind::Vpc, MockOp::Create, DriverError::fatal("quota"));
//!
//! let driver = factory.connect("mock-conn", &RegionInfo::default())?;
//! ```

pub mod cloud;
pub mod driver;
pub mod error;
mod handlers;

pub use cloud::{MockCloud, MockOp, MockOptions};
pub use driver::{MOCK_PROVIDER, MockDriver, MockDriverFactory};
pub use error::{MockError, Result};
