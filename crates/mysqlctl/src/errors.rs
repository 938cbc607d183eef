//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use mysqlctl_config::ConfigError;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::process::ProcessError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[source] ConfigError),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to write command output: {0}")]
    WriteOutput(io::Error),
}
