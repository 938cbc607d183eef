//! Storage provisioning and removal errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while creating or removing instance directories.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to inspect '{}': {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to link '{}' to '{}': {source}", link.display(), target.display())]
    Link {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    /// An entry is in the way of the placement the resolver wants. Repair is
    /// left to a teardown followed by a fresh init.
    #[error("'{}' already exists and is not a link to '{}'", path.display(), expected.display())]
    Conflict { path: PathBuf, expected: PathBuf },
    #[error("could not resolve symlink '{}': {source}", path.display())]
    ResolveLink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed removing '{}': {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("instance root '{}' has no final path component", path.display())]
    InvalidRoot { path: PathBuf },
}

/// Every failure met while removing an instance's directories, in the order
/// they happened.
#[derive(Debug, Default)]
pub struct RemovalErrors(Vec<StorageError>);

impl RemovalErrors {
    pub fn new(errors: Vec<StorageError>) -> Self {
        Self(errors)
    }

    /// The most recent failure.
    pub fn last(&self) -> Option<&StorageError> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorageError> {
        self.0.iter()
    }
}

impl fmt::Display for RemovalErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.last() {
            Some(last) => write!(f, "{} removal failure(s), last: {last}", self.0.len()),
            None => write!(f, "no removal failures"),
        }
    }
}

impl std::error::Error for RemovalErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.last().map(|error| error as &(dyn std::error::Error + 'static))
    }
}

impl IntoIterator for RemovalErrors {
    type Item = StorageError;
    type IntoIter = std::vec::IntoIter<StorageError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
