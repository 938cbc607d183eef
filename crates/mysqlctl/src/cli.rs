//! Command-line interface definitions for `mysqlctl`.

use clap::{Args, Parser, Subcommand};

/// Port assumed when `--port` is not given.
pub(crate) const DEFAULT_PORT: u16 = 3306;

/// Lifecycle controller for a local MySQL instance.
#[derive(Parser, Debug)]
#[command(name = "mysqlctl", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Identifies the instance a command acts on.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InstanceArgs {
    /// Server identifier; selects the `vt_<id>` instance root.
    #[arg(long, value_name = "ID")]
    pub(crate) server_id: u32,
    /// TCP port the engine listens on.
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub(crate) port: u16,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Builds a fresh instance and loads the baseline schema.
    Init {
        #[command(flatten)]
        instance: InstanceArgs,
    },
    /// Stops the engine and removes the instance's directories.
    Teardown {
        #[command(flatten)]
        instance: InstanceArgs,
        /// Remove directories even when the engine cannot be stopped.
        #[arg(long)]
        force: bool,
    },
    /// Tears the instance down and initialises it again.
    Reinit {
        #[command(flatten)]
        instance: InstanceArgs,
    },
    /// Launches the engine and waits for its socket.
    Start {
        #[command(flatten)]
        instance: InstanceArgs,
    },
    /// Asks the engine to stop.
    Shutdown {
        #[command(flatten)]
        instance: InstanceArgs,
        /// Return once the request is sent instead of waiting for the socket
        /// to disappear.
        #[arg(long)]
        no_wait: bool,
    },
    /// Reports whether the engine is running.
    Status {
        #[command(flatten)]
        instance: InstanceArgs,
    },
}

impl CliCommand {
    pub(crate) fn instance(&self) -> InstanceArgs {
        match self {
            Self::Init { instance }
            | Self::Teardown { instance, .. }
            | Self::Reinit { instance }
            | Self::Start { instance }
            | Self::Shutdown { instance, .. }
            | Self::Status { instance } => *instance,
        }
    }
}
