//! On-disk layout of an instance.
//!
//! [`DirectoryPlan`] names the directories every instance needs.
//! [`StorageResolver`] decides where each identity directory physically
//! lives, and [`DirectoryProvisioner`] creates and removes the layout.

mod error;
mod plan;
mod provisioner;
mod resolver;

pub(crate) const STORAGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::storage");

pub use error::{RemovalErrors, StorageError};
pub use plan::{DirectoryPlan, IDENTITY_DIRS};
pub use provisioner::DirectoryProvisioner;
pub use resolver::{Placement, SharedRootResolver, StorageResolver};
