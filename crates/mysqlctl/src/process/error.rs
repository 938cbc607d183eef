//! Error surface for process start, shutdown, and status probes.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

/// Errors raised while driving the engine process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Executable name.
        command: String,
        #[source]
        source: io::Error,
    },
    /// Communicating with or waiting on a spawned tool failed.
    #[error("failed while running '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The tool ran but reported failure. `output` holds its combined
    /// stdout and stderr.
    #[error("{command}: {output}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        output: String,
    },
    /// The socket never appeared within the poll budget.
    #[error("{}: deadline exceeded waiting for {}", launcher.display(), socket.display())]
    StartTimeout {
        launcher: PathBuf,
        socket: PathBuf,
        waited: Duration,
    },
    /// The socket was still present when the poll budget ran out. The engine
    /// may still be flushing; this is not a confirmed failure to stop.
    #[error("gave up waiting for mysqld to stop: {} still present after {waited:?}", socket.display())]
    ShutdownTimeout { socket: PathBuf, waited: Duration },
    /// Inspecting a marker file failed for a reason other than absence.
    #[error("failed to inspect '{}': {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read pid file '{}': {source}", path.display())]
    ReadPid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse pid file '{}': {source}", path.display())]
    ParsePid {
        path: PathBuf,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        pid: u32,
        #[source]
        source: Errno,
    },
}

impl ProcessError {
    /// Returns true when the error is a poll deadline rather than a hard
    /// failure, so callers can decide to retry or force a teardown.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::StartTimeout { .. } | Self::ShutdownTimeout { .. }
        )
    }
}
