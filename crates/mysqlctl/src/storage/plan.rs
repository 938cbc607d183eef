//! The fixed directory topology of an instance.

use std::path::{Path, PathBuf};

use crate::instance::InstanceConfig;

/// Top-level directories that may be redirected into the shared root, in
/// provisioning order.
pub const IDENTITY_DIRS: [&str; 4] = ["data", "innodb", "relay-logs", "bin-logs"];

/// Directories to create for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPlan {
    root: PathBuf,
    data_directories: Vec<PathBuf>,
}

impl DirectoryPlan {
    pub fn for_instance(config: &InstanceConfig) -> Self {
        Self {
            root: config.root().to_path_buf(),
            data_directories: config.data_directories(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity_dirs(&self) -> &'static [&'static str] {
        &IDENTITY_DIRS
    }

    /// Directories created after the identity directories are placed. Most
    /// live beneath an identity directory and so follow its redirection.
    pub fn data_directories(&self) -> &[PathBuf] {
        &self.data_directories
    }
}
