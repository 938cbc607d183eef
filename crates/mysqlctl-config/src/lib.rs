//! Layered configuration shared by the `mysqlctl` library and binary.
//!
//! Values are merged from built-in defaults, an optional configuration file,
//! `MYSQLCTL_*` environment variables, and command-line flags, in increasing
//! order of precedence. Every field is optional; the accessors fold in the
//! defaults from [`defaults`] so callers never observe an unset value.
//!
//! The controller resolves these values once, when an instance is
//! constructed. Lifecycle operations never consult the process environment.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
pub use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_CHARSET, DEFAULT_DATA_ROOT, DEFAULT_DBA_USER, DEFAULT_LOG_FILTER, DEFAULT_MYSQL_ROOT,
    DEFAULT_POLL_INTERVAL, DEFAULT_REPL_USER, DEFAULT_VT_ROOT, DEFAULT_WAIT_ITERATIONS,
    default_data_root, default_log_filter, default_log_format, default_mysql_root,
    default_vt_root,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Roots end up in symlink targets and tool arguments, so they must not
    /// depend on the working directory.
    #[error("{field} must be an absolute path, got '{path}'")]
    RelativePath {
        field: &'static str,
        path: Utf8PathBuf,
    },
    #[error("wait_iterations must be at least 1")]
    NoWaitIterations,
}

/// Controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MYSQLCTL")]
#[serde(default)]
pub struct Config {
    /// Engine installation root containing `bin/` and `lib/mysql`.
    pub mysql_root: Option<Utf8PathBuf>,
    /// Installation root holding `config/mycnf` and `data/bootstrap/`.
    pub vt_root: Option<Utf8PathBuf>,
    /// Parent directory of every instance root.
    pub data_root: Option<Utf8PathBuf>,
    /// Shared root consulted for identity-directory redirection.
    pub shared_root: Option<Utf8PathBuf>,
    /// Number of poll rounds for start and shutdown waits.
    pub wait_iterations: Option<u32>,
    /// Delay between poll rounds, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Privileged account name.
    pub dba_user: Option<String>,
    /// Replication account name.
    pub repl_user: Option<String>,
    /// Connection character set.
    pub charset: Option<String>,
    /// Tracing filter expression.
    pub log_filter: Option<String>,
    /// Log output format.
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Engine installation root.
    pub fn mysql_root(&self) -> Utf8PathBuf {
        self.mysql_root.clone().unwrap_or_else(default_mysql_root)
    }

    /// Installation root holding templates and bootstrap artefacts.
    pub fn vt_root(&self) -> Utf8PathBuf {
        self.vt_root.clone().unwrap_or_else(default_vt_root)
    }

    /// Parent directory of every instance root.
    pub fn data_root(&self) -> Utf8PathBuf {
        self.data_root.clone().unwrap_or_else(default_data_root)
    }

    /// Shared root; falls back to the data root.
    pub fn shared_root(&self) -> Utf8PathBuf {
        self.shared_root.clone().unwrap_or_else(|| self.data_root())
    }

    /// Number of poll rounds before giving up.
    pub fn wait_iterations(&self) -> u32 {
        self.wait_iterations.unwrap_or(DEFAULT_WAIT_ITERATIONS)
    }

    /// Delay between poll rounds.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis)
    }

    /// Privileged account name.
    pub fn dba_user(&self) -> &str {
        self.dba_user.as_deref().unwrap_or(DEFAULT_DBA_USER)
    }

    /// Replication account name.
    pub fn repl_user(&self) -> &str {
        self.repl_user.as_deref().unwrap_or(DEFAULT_REPL_USER)
    }

    /// Connection character set.
    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    /// Tracing filter expression.
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Checks values the accessors cannot repair.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let roots = [
            ("mysql_root", self.mysql_root()),
            ("vt_root", self.vt_root()),
            ("data_root", self.data_root()),
            ("shared_root", self.shared_root()),
        ];
        if let Some((field, path)) = roots.into_iter().find(|(_, path)| path.is_relative()) {
            return Err(ConfigError::RelativePath { field, path });
        }
        if self.wait_iterations() == 0 {
            return Err(ConfigError::NoWaitIterations);
        }
        Ok(())
    }

    /// Returns a copy rooted under `base`, used by tests and sandboxes that
    /// keep every artefact beneath one directory.
    pub fn rooted_at(base: &Utf8Path) -> Self {
        Self {
            mysql_root: Some(base.join("mysql")),
            vt_root: Some(base.join("dist")),
            data_root: Some(base.join("vt")),
            ..Self::default()
        }
    }
}
