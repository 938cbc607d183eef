//! Placement of identity directories.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, symlink};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::STORAGE_TARGET;
use super::error::StorageError;

const DIR_MODE: u32 = 0o775;

/// Where an identity directory ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A plain directory under the instance root.
    Local(PathBuf),
    /// A link under the instance root pointing into shared storage.
    Shared { link: PathBuf, target: PathBuf },
}

impl Placement {
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared { .. })
    }
}

/// Decides where identity directories physically live.
///
/// Platforms that share volumes some other way, such as mounts, implement
/// this instead of the symlink scheme.
pub trait StorageResolver: Send + Sync {
    /// Makes `instance_root/name` usable and reports where it lives.
    ///
    /// Must be safe to call again after an earlier partial failure.
    fn provision(&self, instance_root: &Path, name: &str) -> Result<Placement, StorageError>;

    /// Removes `entry` and whatever storage backs it. Every step is attempted
    /// and all failures are returned.
    fn release(&self, entry: &Path) -> Result<(), Vec<StorageError>>;
}

/// Redirects an identity directory into `<shared_root>/<name>/<instance>`
/// whenever the shared root already has an entry called `<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRootResolver {
    shared_root: PathBuf,
}

impl SharedRootResolver {
    pub fn new(shared_root: impl Into<PathBuf>) -> Self {
        Self {
            shared_root: shared_root.into(),
        }
    }

    pub fn shared_root(&self) -> &Path {
        &self.shared_root
    }
}

impl StorageResolver for SharedRootResolver {
    fn provision(&self, instance_root: &Path, name: &str) -> Result<Placement, StorageError> {
        let entry = instance_root.join(name);
        let shared = self.shared_root.join(name);
        if !entry_exists(&shared)? {
            info!(target: STORAGE_TARGET, path = %entry.display(), "creating directory");
            create_dir_all(&entry)?;
            return Ok(Placement::Local(entry));
        }

        let instance_name = instance_root
            .file_name()
            .ok_or_else(|| StorageError::InvalidRoot {
                path: instance_root.to_path_buf(),
            })?;
        let target = shared.join(instance_name);
        info!(target: STORAGE_TARGET, path = %target.display(), "creating directory");
        create_dir_all(&target)?;
        create_dir_all(instance_root)?;
        link_into(&entry, &target)?;
        Ok(Placement::Shared {
            link: entry,
            target,
        })
    }

    fn release(&self, entry: &Path) -> Result<(), Vec<StorageError>> {
        let metadata = match fs::symlink_metadata(entry) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(target: STORAGE_TARGET, path = %entry.display(), "already removed");
                return Ok(());
            }
            Err(source) => {
                return Err(vec![StorageError::Inspect {
                    path: entry.to_path_buf(),
                    source,
                }]);
            }
        };

        let mut errors = Vec::new();
        if metadata.file_type().is_symlink() {
            match fs::canonicalize(entry) {
                Ok(target) => {
                    info!(
                        target: STORAGE_TARGET,
                        path = %target.display(),
                        "removing symlinked directory"
                    );
                    if let Err(error) = remove_all(&target) {
                        errors.push(error);
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    warn!(target: STORAGE_TARGET, link = %entry.display(), "dangling symlink");
                }
                Err(source) => errors.push(StorageError::ResolveLink {
                    path: entry.to_path_buf(),
                    source,
                }),
            }
        }

        info!(target: STORAGE_TARGET, path = %entry.display(), "removing directory");
        if let Err(error) = remove_all(entry) {
            errors.push(error);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Checks for an entry without following a final symlink.
fn entry_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub(super) fn create_dir_all(path: &Path) -> Result<(), StorageError> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

/// Creates `link -> target`, accepting an identical link left by an earlier
/// run.
fn link_into(link: &Path, target: &Path) -> Result<(), StorageError> {
    if entry_exists(link)? {
        return match fs::read_link(link) {
            Ok(existing) if existing == target => Ok(()),
            _ => Err(StorageError::Conflict {
                path: link.to_path_buf(),
                expected: target.to_path_buf(),
            }),
        };
    }
    info!(
        target: STORAGE_TARGET,
        link = %link.display(),
        target_dir = %target.display(),
        "creating symlink"
    );
    symlink(target, link).map_err(|source| StorageError::Link {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    })
}

/// Removes a file, link, or directory tree. A missing path is not an error.
fn remove_all(path: &Path) -> Result<(), StorageError> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(error) => Err(error),
    };
    match result {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
