//! External collaborators of the bootstrap sequence and their default
//! implementations.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::instance::{ConnectionParams, EngineTools, ManagedInstance};
use crate::process::{CommandRunner, EngineCommand, ProcessError};

use super::BOOTSTRAP_TARGET;

const TAR_PROGRAM: &str = "tar";
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Errors raised while rendering the engine configuration.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template '{}': {source}", path.display())]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown template field '{field}'")]
    UnknownField { field: String },
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },
}

/// Produces the engine configuration file contents for an instance.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigRenderer: Send + Sync {
    fn render(&self, template: &Path, instance: &ManagedInstance) -> Result<String, RenderError>;
}

/// Unpacks the seed dataset into a data directory.
#[cfg_attr(test, mockall::automock)]
pub trait SeedExtractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ProcessError>;
}

/// Runs privileged statements against a running engine.
#[cfg_attr(test, mockall::automock)]
pub trait SqlExecutor: Send + Sync {
    /// Executes `statements` in order as one batch, stopping at the first
    /// failure.
    fn execute_batch(
        &self,
        connection: &ConnectionParams,
        statements: &[String],
    ) -> Result<(), ProcessError>;
}

/// Fills `{{.Field}}` placeholders in a template file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl ConfigRenderer for TemplateRenderer {
    fn render(&self, template: &Path, instance: &ManagedInstance) -> Result<String, RenderError> {
        let text = fs::read_to_string(template).map_err(|source| RenderError::ReadTemplate {
            path: template.to_path_buf(),
            source,
        })?;
        render_template(&text, instance)
    }
}

/// Substitutes `{{.Field}}` placeholders with values from `instance`.
///
/// Whitespace inside the braces is ignored. Unknown fields are rejected
/// rather than left in place.
pub fn render_template(template: &str, instance: &ManagedInstance) -> Result<String, RenderError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let offset = template.len() - rest.len() + start;
        let inner = &rest[start + 2..];
        let end = inner
            .find("}}")
            .ok_or(RenderError::Unterminated { offset })?;
        let field = inner[..end].trim();
        let value = field
            .strip_prefix('.')
            .and_then(|name| field_value(instance, name))
            .ok_or_else(|| RenderError::UnknownField {
                field: field.to_owned(),
            })?;
        rendered.push_str(&value);
        rest = &inner[end + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn field_value(instance: &ManagedInstance, name: &str) -> Option<String> {
    let config = instance.config();
    let path = |path: &Path| path.display().to_string();
    let value = match name {
        "ServerId" => config.server_id().to_string(),
        "MysqlPort" => config.port().to_string(),
        "DataDir" => path(config.data_dir()),
        "InnodbDataHomeDir" => path(config.innodb_data_home_dir()),
        "InnodbLogGroupHomeDir" => path(config.innodb_log_group_home_dir()),
        "SocketFile" => path(config.socket_file()),
        "PidFile" => path(config.pid_file()),
        "ErrorLogPath" => path(config.error_log_path()),
        "SlowLogPath" => path(config.slow_log_path()),
        "RelayLogPath" => path(config.relay_log_path()),
        "BinLogPath" => path(config.bin_log_path()),
        "TmpDir" => path(config.tmp_dir()),
        "SlaveLoadTmpDir" => path(config.slave_load_tmp_dir()),
        "ReplUser" => instance.repl().username.clone(),
        "Charset" => instance.dba().charset.clone(),
        _ => return None,
    };
    Some(value)
}

/// Extracts bzip2 tarballs with the system `tar`.
#[derive(Clone)]
pub struct TarExtractor {
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for TarExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TarExtractor").finish_non_exhaustive()
    }
}

impl TarExtractor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub(crate) fn command(archive: &Path, destination: &Path) -> EngineCommand {
        EngineCommand::new(TAR_PROGRAM)
            .arg("-xj")
            .arg("-C")
            .arg(destination)
            .arg("-f")
            .arg(archive)
    }
}

impl SeedExtractor for TarExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ProcessError> {
        info!(
            target: BOOTSTRAP_TARGET,
            archive = %archive.display(),
            destination = %destination.display(),
            "unpacking seed archive"
        );
        self.runner
            .run(&Self::command(archive, destination))
            .map(|_| ())
    }
}

/// Pipes statements through the engine's command-line client.
#[derive(Clone)]
pub struct MysqlClientExecutor {
    runner: Arc<dyn CommandRunner>,
    tools: EngineTools,
}

impl fmt::Debug for MysqlClientExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlClientExecutor")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl MysqlClientExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: EngineTools) -> Self {
        Self { runner, tools }
    }

    /// The client runs in batch mode, which aborts on the first failing
    /// statement.
    pub(crate) fn command(&self, connection: &ConnectionParams, statements: &[String]) -> EngineCommand {
        let mut command = EngineCommand::new(&self.tools.sql_client)
            .arg("-u")
            .arg(connection.username.as_str());
        if let Some(socket) = &connection.unix_socket {
            command = command.arg("-S").arg(socket);
        }
        let script: String = statements
            .iter()
            .map(|statement| format!("{statement};\n"))
            .collect();
        command
            .arg(format!("--default-character-set={}", connection.charset))
            .env(LIBRARY_PATH_VAR, &self.tools.library_dir)
            .current_dir(&self.tools.working_dir)
            .input(script)
    }
}

impl SqlExecutor for MysqlClientExecutor {
    fn execute_batch(
        &self,
        connection: &ConnectionParams,
        statements: &[String],
    ) -> Result<(), ProcessError> {
        if statements.is_empty() {
            return Ok(());
        }
        info!(
            target: BOOTSTRAP_TARGET,
            user = %connection.username,
            statements = statements.len(),
            "executing statement batch"
        );
        self.runner
            .run(&self.command(connection, statements))
            .map(|_| ())
    }
}
