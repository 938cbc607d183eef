//! Init, teardown, and reinit of a managed instance.
//!
//! The sequencer composes the [`ProcessController`](crate::process::ProcessController)
//! and [`DirectoryProvisioner`](crate::storage::DirectoryProvisioner) with three
//! collaborators: a configuration renderer, a seed extractor, and a SQL
//! executor.

mod collaborators;
mod error;
mod schema;
mod sequencer;
#[cfg(test)]
mod tests;

pub(crate) const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

#[cfg(test)]
pub(crate) use collaborators::{MockConfigRenderer, MockSeedExtractor, MockSqlExecutor};
pub use collaborators::{
    ConfigRenderer, MysqlClientExecutor, RenderError, SeedExtractor, SqlExecutor, TarExtractor,
    TemplateRenderer, render_template,
};
pub use error::{BootstrapError, TeardownFailure, TeardownFailures};
pub use schema::split_statements;
pub use sequencer::{BootstrapSequencer, BootstrapServices, InstanceState};
