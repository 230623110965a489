//! Resource managers
//!
//! One module per resource kind, each an `impl` block on
//! [`CloudRuntime`](crate::CloudRuntime). Every operation follows the same
//! recipe: validate input, take locks, resolve names to driver IIDs, call the
//! driver, persist or drop the identity record, and translate the provider's
//! answer back to user names.

mod common;
mod disk;
mod filesystem;
mod keypair;
mod myimage;
mod nlb;
mod orchestrate;
mod security;
mod tag;
mod vm;
mod vpc;

pub use common::{CspResourceInfo, DestroyFailure, DestroyReport};
