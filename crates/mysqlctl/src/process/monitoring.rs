//! Bounded polling on filesystem markers.
//!
//! The engine is started through an intermediary launcher, so the controller
//! cannot wait on it directly. Readiness and termination are observed through
//! the socket file instead, checked at a fixed interval for a fixed number of
//! rounds. Every wait ends in one of three ways: the marker reached the wanted
//! state, the rounds ran out, or inspecting the marker failed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use mysqlctl_config::{Config, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_ITERATIONS};

use super::error::ProcessError;

/// Interval and round count for marker polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    iterations: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, iterations: u32) -> Self {
        Self {
            interval,
            iterations,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval(), config.wait_iterations())
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Upper bound on the time spent sleeping during one wait. No sleep
    /// follows the last round.
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.iterations.saturating_sub(1))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_ITERATIONS)
    }
}

/// State a wait is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presence {
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// The marker reached the wanted state on the given round (1-based).
    Reached { round: u32 },
    TimedOut,
}

/// Returns whether `path` exists. Absence is not an error; every other
/// inspection failure is.
pub(crate) fn path_exists(path: &Path) -> Result<bool, ProcessError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ProcessError::Probe {
            path: PathBuf::from(path),
            source,
        }),
    }
}

/// Polls `path` until it reaches `wanted` or the policy is exhausted.
///
/// The marker is checked before the first sleep, so a marker that is already
/// in the wanted state is reported on round one without delay.
pub(crate) fn wait_for(
    path: &Path,
    wanted: Presence,
    policy: PollPolicy,
) -> Result<WaitOutcome, ProcessError> {
    for round in 1..=policy.iterations() {
        let present = path_exists(path)?;
        let reached = match wanted {
            Presence::Present => present,
            Presence::Absent => !present,
        };
        if reached {
            return Ok(WaitOutcome::Reached { round });
        }
        if round < policy.iterations() {
            thread::sleep(policy.interval());
        }
    }
    Ok(WaitOutcome::TimedOut)
}

/// Reads a pid file, treating a missing or empty file as no pid.
pub(crate) fn read_pid(path: &Path) -> Result<Option<u32>, ProcessError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ProcessError::ReadPid {
                path: PathBuf::from(path),
                source,
            });
        }
    };
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|source| ProcessError::ParsePid {
            path: PathBuf::from(path),
            source,
        })
}
