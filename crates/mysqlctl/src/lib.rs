//! Lifecycle controller for a local MySQL instance.
//!
//! The library brings an engine instance up and down, lays out its storage
//! with optional shared-root redirection, and bootstraps fresh instances from
//! a seed dataset. The `mysqlctl` binary is a thin wrapper around [`run`].
//!
//! Nothing here locks. Callers must serialise lifecycle operations against a
//! given instance.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::error::ErrorKind;
use mysqlctl_config::Config;

pub mod bootstrap;
mod cli;
mod config;
mod errors;
pub mod instance;
pub mod process;
pub mod storage;
pub mod telemetry;
#[cfg(test)]
mod tests;

use bootstrap::BootstrapSequencer;
use cli::{Cli, CliCommand};
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use instance::{Installation, ManagedInstance};
use process::{CommandRunner, PollPolicy, SystemCommandRunner};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `mysqlctl_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--mysql-root",
    "--vt-root",
    "--data-root",
    "--shared-root",
    "--wait-iterations",
    "--poll-interval-ms",
    "--dba-user",
    "--repl-user",
    "--charset",
    "--log-filter",
    "--log-format",
];

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(
        args,
        stdout,
        stderr,
        &OrthoConfigLoader,
        Arc::new(SystemCommandRunner),
    )
}

/// Runs the CLI with a custom configuration loader and command runner.
#[must_use]
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    runner: Arc<dyn CommandRunner>,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
        Ok(cli) => cli,
        Err(error) => return report_usage(error, stdout, stderr),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            execute(cli.command, &config, runner)
        })
        .and_then(|message| writeln!(stdout, "{message}").map_err(AppError::WriteOutput));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests are successes written to stdout.
fn report_usage<W, E>(error: clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    W: Write,
    E: Write,
{
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        _ => {
            let _ = write!(stderr, "{}", AppError::CliUsage(error));
            ExitCode::FAILURE
        }
    }
}

fn execute(
    command: CliCommand,
    config: &Config,
    runner: Arc<dyn CommandRunner>,
) -> Result<String, AppError> {
    let args = command.instance();
    let instance = ManagedInstance::from_config(config, args.server_id, args.port);
    let installation = Installation::from_config(config);
    let sequencer =
        BootstrapSequencer::for_installation(&installation, runner, PollPolicy::from_config(config));
    let controller = sequencer.controller();
    let _span = telemetry::instance_span(&instance).entered();

    let message = match command {
        CliCommand::Init { .. } => {
            sequencer.init(&instance)?;
            format!("initialised {instance}")
        }
        CliCommand::Teardown { force, .. } => {
            sequencer.teardown(&instance, force)?;
            format!("removed {instance}")
        }
        CliCommand::Reinit { .. } => {
            sequencer.reinit(&instance)?;
            format!("reinitialised {instance}")
        }
        CliCommand::Start { .. } => {
            controller.start(&instance)?;
            format!("started {instance}")
        }
        CliCommand::Shutdown { no_wait: true, .. } => {
            controller.shutdown(&instance, false)?;
            format!("shutdown requested for {instance}")
        }
        CliCommand::Shutdown { no_wait: false, .. } => {
            controller.shutdown(&instance, true)?;
            format!("stopped {instance}")
        }
        CliCommand::Status { .. } => {
            let status = controller.status(&instance)?;
            format!("{instance}: {status}")
        }
    };
    Ok(message)
}
