//! Process control for the engine.
//!
//! - [`command`] describes tool invocations and runs them.
//! - [`monitoring`] holds the bounded marker polling.
//! - [`controller`] implements start, shutdown, and status.

mod command;
mod controller;
mod error;
mod monitoring;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

#[cfg(test)]
pub(crate) use command::MockCommandRunner;
pub use command::{CommandRunner, EngineCommand, SystemCommandRunner};
pub use controller::{InstanceStatus, ProcessController};
pub use error::ProcessError;
pub use monitoring::PollPolicy;
