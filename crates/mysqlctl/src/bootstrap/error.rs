//! Bootstrap and teardown errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;
use crate::storage::StorageError;

use super::collaborators::RenderError;
use super::sequencer::InstanceState;

/// Errors raised by init, teardown, and reinit.
///
/// Each init stage has its own variant so callers can tell how far the
/// sequence got. Nothing is rolled back.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to provision directories: {0}")]
    Provision(#[source] StorageError),
    #[error("failed rendering '{}': {source}", template.display())]
    RenderConfig {
        template: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error("failed creating '{}': {source}", path.display())]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed unpacking '{}': {source}", archive.display())]
    ExtractSeed {
        archive: PathBuf,
        #[source]
        source: ProcessError,
    },
    #[error("failed starting, check '{}': {source}", error_log.display())]
    Start {
        error_log: PathBuf,
        #[source]
        source: ProcessError,
    },
    #[error("failed reading schema '{}': {source}", path.display())]
    ReadSchema {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed applying baseline schema: {0}")]
    ApplySchema(#[source] ProcessError),
    /// Shutdown failed during a non-forced teardown. The filesystem was not
    /// touched.
    #[error("failed mysqld shutdown: {0}")]
    Shutdown(#[source] ProcessError),
    /// A forced teardown, or the removal step, met failures. Every step was
    /// still attempted.
    #[error(transparent)]
    Teardown(TeardownFailures),
}

impl BootstrapError {
    /// The init stage that was being entered when the error happened.
    pub fn failed_stage(&self) -> Option<InstanceState> {
        match self {
            Self::Provision(_) => Some(InstanceState::DirectoriesReady),
            Self::RenderConfig { .. } | Self::WriteConfig { .. } => {
                Some(InstanceState::ConfigWritten)
            }
            Self::ExtractSeed { .. } => Some(InstanceState::SeedUnpacked),
            Self::Start { .. } => Some(InstanceState::Running),
            Self::ReadSchema { .. } | Self::ApplySchema(_) => Some(InstanceState::SchemaLoaded),
            Self::Shutdown(_) | Self::Teardown(_) => None,
        }
    }

    /// Returns true when the failure is a poll deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Start { source, .. } | Self::Shutdown(source) => source.is_timeout(),
            _ => false,
        }
    }
}

/// One failed teardown step.
#[derive(Debug, Error)]
pub enum TeardownFailure {
    #[error("shutdown: {0}")]
    Shutdown(#[source] ProcessError),
    #[error("removal: {0}")]
    Removal(#[source] StorageError),
}

/// Failures met during a teardown, in the order they happened.
#[derive(Debug, Default)]
pub struct TeardownFailures(Vec<TeardownFailure>);

impl TeardownFailures {
    pub fn new(failures: Vec<TeardownFailure>) -> Self {
        Self(failures)
    }

    /// The most recent failure.
    pub fn last(&self) -> Option<&TeardownFailure> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeardownFailure> {
        self.0.iter()
    }
}

impl fmt::Display for TeardownFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.last() {
            Some(last) => write!(
                f,
                "teardown finished with {} failure(s), last: {last}",
                self.0.len()
            ),
            None => write!(f, "teardown finished without failures"),
        }
    }
}

impl std::error::Error for TeardownFailures {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .last()
            .map(|failure| failure as &(dyn std::error::Error + 'static))
    }
}
