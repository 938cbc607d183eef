//! Creation and removal of an instance's directory layout.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::instance::ManagedInstance;

use super::STORAGE_TARGET;
use super::error::{RemovalErrors, StorageError};
use super::plan::DirectoryPlan;
use super::resolver::{Placement, StorageResolver, create_dir_all};

/// Provisions and removes instance directories through a [`StorageResolver`].
#[derive(Clone)]
pub struct DirectoryProvisioner {
    resolver: Arc<dyn StorageResolver>,
}

impl fmt::Debug for DirectoryProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryProvisioner").finish_non_exhaustive()
    }
}

impl DirectoryProvisioner {
    pub fn new(resolver: Arc<dyn StorageResolver>) -> Self {
        Self { resolver }
    }

    /// Creates the instance root, places every identity directory, then
    /// creates the remaining data directories. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`] met. Directories created before it
    /// are left in place.
    pub fn provision_all(
        &self,
        instance: &ManagedInstance,
    ) -> Result<Vec<Placement>, StorageError> {
        let plan = DirectoryPlan::for_instance(instance.config());
        info!(target: STORAGE_TARGET, root = %plan.root().display(), "provisioning instance");
        create_dir_all(plan.root())?;

        let placements = plan
            .identity_dirs()
            .iter()
            .map(|name| self.resolver.provision(plan.root(), name))
            .collect::<Result<Vec<_>, _>>()?;

        for dir in plan.data_directories() {
            create_dir_all(dir)?;
        }
        Ok(placements)
    }

    /// Removes every identity directory under `instance_root`, including any
    /// shared storage behind it.
    ///
    /// Each entry is attempted even after earlier failures.
    ///
    /// # Errors
    ///
    /// Returns [`RemovalErrors`] holding every failure, most recent last.
    pub fn remove(&self, instance_root: &Path) -> Result<(), RemovalErrors> {
        let failures: Vec<StorageError> = super::IDENTITY_DIRS
            .iter()
            .map(|name| instance_root.join(name))
            .filter_map(|entry| self.resolver.release(&entry).err())
            .flatten()
            .inspect(|failure| {
                error!(target: STORAGE_TARGET, error = %failure, "removal step failed");
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RemovalErrors::new(failures))
        }
    }
}
