//! Built-in defaults applied when a configuration layer leaves a field unset.

use std::time::Duration;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default engine installation root.
pub const DEFAULT_MYSQL_ROOT: &str = "/usr";

/// Default installation root holding the config template and bootstrap data.
pub const DEFAULT_VT_ROOT: &str = "/vt/dist";

/// Default parent directory for instance roots.
pub const DEFAULT_DATA_ROOT: &str = "/vt";

/// Number of poll rounds before a start or shutdown wait gives up.
pub const DEFAULT_WAIT_ITERATIONS: u32 = 20;

/// Delay between poll rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Privileged account used for administrative commands.
pub const DEFAULT_DBA_USER: &str = "vt_dba";

/// Account used by replicas.
pub const DEFAULT_REPL_USER: &str = "vt_repl";

/// Character set for both connection records.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Filter applied when `log_filter` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Function form of [`DEFAULT_LOG_FILTER`].
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default engine installation root as an owned path.
pub fn default_mysql_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_MYSQL_ROOT)
}

/// Default installation root as an owned path.
pub fn default_vt_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_VT_ROOT)
}

/// Default data root as an owned path.
pub fn default_data_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DATA_ROOT)
}
