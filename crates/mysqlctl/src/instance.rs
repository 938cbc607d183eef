//! Identity and derived paths for one managed engine instance.
//!
//! [`InstanceConfig`] captures the on-disk layout of a single instance and is
//! immutable once built. [`ManagedInstance`] adds the connection records and
//! the paths the controller derives from the instance root. [`Installation`]
//! resolves every installation-relative path from the loaded configuration so
//! lifecycle operations never consult the process environment.

use std::fmt;
use std::path::{Path, PathBuf};

use mysqlctl_config::Config;

/// Default host advertised in the instance address.
pub const DEFAULT_HOST: &str = "localhost";

/// Name of the rendered configuration file inside the instance root.
pub const MYCNF_FILE_NAME: &str = "my.cnf";

const SNAPSHOT_DIR_NAME: &str = "snapshot";

/// Returns the directory name used for an instance: `vt_<id>` with the id
/// zero-padded to ten digits.
pub fn instance_dir_name(server_id: u32) -> String {
    format!("vt_{server_id:010}")
}

/// Per-instance identity and file layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    server_id: u32,
    root: PathBuf,
    data_dir: PathBuf,
    innodb_data_home_dir: PathBuf,
    innodb_log_group_home_dir: PathBuf,
    relay_log_path: PathBuf,
    bin_log_path: PathBuf,
    tmp_dir: PathBuf,
    slave_load_tmp_dir: PathBuf,
    socket_file: PathBuf,
    pid_file: PathBuf,
    error_log_path: PathBuf,
    slow_log_path: PathBuf,
    host: String,
    port: u16,
}

impl InstanceConfig {
    /// Derives the standard layout for `server_id` beneath `data_root`.
    pub fn new(server_id: u32, port: u16, data_root: &Path) -> Self {
        Self::with_host(server_id, port, data_root, DEFAULT_HOST)
    }

    /// Derives the standard layout and advertises `host` in [`Self::addr`].
    pub fn with_host(server_id: u32, port: u16, data_root: &Path, host: &str) -> Self {
        let root = data_root.join(instance_dir_name(server_id));
        Self {
            server_id,
            data_dir: root.join("data"),
            innodb_data_home_dir: root.join("innodb").join("data"),
            innodb_log_group_home_dir: root.join("innodb").join("log"),
            relay_log_path: root
                .join("relay-logs")
                .join(format!("vt-{server_id:010}-relay-bin")),
            bin_log_path: root.join("bin-logs").join(format!("vt-{server_id:010}-bin")),
            tmp_dir: root.join("tmp"),
            slave_load_tmp_dir: root.join("slave_load_tmp"),
            socket_file: root.join("mysql.sock"),
            pid_file: root.join("mysql.pid"),
            error_log_path: root.join("error.log"),
            slow_log_path: root.join("slow-query.log"),
            host: host.to_owned(),
            port,
            root,
        }
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Instance root directory (`<data_root>/vt_<id>`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn innodb_data_home_dir(&self) -> &Path {
        &self.innodb_data_home_dir
    }

    pub fn innodb_log_group_home_dir(&self) -> &Path {
        &self.innodb_log_group_home_dir
    }

    pub fn relay_log_path(&self) -> &Path {
        &self.relay_log_path
    }

    pub fn bin_log_path(&self) -> &Path {
        &self.bin_log_path
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn slave_load_tmp_dir(&self) -> &Path {
        &self.slave_load_tmp_dir
    }

    /// Unix socket whose appearance signals readiness.
    pub fn socket_file(&self) -> &Path {
        &self.socket_file
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Engine error log; the first place to look when startup fails.
    pub fn error_log_path(&self) -> &Path {
        &self.error_log_path
    }

    pub fn slow_log_path(&self) -> &Path {
        &self.slow_log_path
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Network address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Data-bearing directories created after the identity directories.
    ///
    /// Log paths name files, so their parent directories are listed instead.
    pub fn data_directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.data_dir.clone(),
            self.innodb_data_home_dir.clone(),
            self.innodb_log_group_home_dir.clone(),
        ];
        dirs.extend(self.relay_log_path.parent().map(Path::to_path_buf));
        dirs.extend(self.bin_log_path.parent().map(Path::to_path_buf));
        dirs.push(self.tmp_dir.clone());
        dirs.push(self.slave_load_tmp_dir.clone());
        dirs
    }
}

/// Connection record handed to the SQL executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub username: String,
    pub charset: String,
    pub unix_socket: Option<PathBuf>,
}

impl ConnectionParams {
    pub fn new(username: impl Into<String>, charset: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            charset: charset.into(),
            unix_socket: None,
        }
    }

    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.unix_socket = Some(socket.into());
        self
    }
}

/// An instance together with its credentials and derived paths.
///
/// Exactly one controller may drive a given instance at a time; nothing here
/// enforces that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedInstance {
    config: InstanceConfig,
    dba: ConnectionParams,
    repl: ConnectionParams,
    snapshot_dir: PathBuf,
    mycnf_file: PathBuf,
}

impl ManagedInstance {
    /// Builds a managed instance.
    ///
    /// A privileged connection record without a socket is bound to the
    /// instance socket.
    pub fn new(
        config: InstanceConfig,
        data_root: &Path,
        dba: ConnectionParams,
        repl: ConnectionParams,
    ) -> Self {
        let dba = match dba.unix_socket {
            Some(_) => dba,
            None => dba.with_socket(config.socket_file()),
        };
        let snapshot_dir = data_root
            .join(SNAPSHOT_DIR_NAME)
            .join(instance_dir_name(config.server_id()));
        let mycnf_file = config.root().join(MYCNF_FILE_NAME);
        Self {
            config,
            dba,
            repl,
            snapshot_dir,
            mycnf_file,
        }
    }

    /// Builds the instance for `server_id` using the layout and accounts
    /// named by `config`.
    pub fn from_config(config: &Config, server_id: u32, port: u16) -> Self {
        let data_root = config.data_root().into_std_path_buf();
        let instance = InstanceConfig::new(server_id, port, &data_root);
        let dba = ConnectionParams::new(config.dba_user(), config.charset());
        let repl = ConnectionParams::new(config.repl_user(), config.charset());
        Self::new(instance, &data_root, dba, repl)
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn dba(&self) -> &ConnectionParams {
        &self.dba
    }

    pub fn repl(&self) -> &ConnectionParams {
        &self.repl
    }

    /// Instance root directory.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Path of the rendered engine configuration file.
    pub fn mycnf_file(&self) -> &Path {
        &self.mycnf_file
    }

    pub fn addr(&self) -> String {
        self.config.addr()
    }
}

impl fmt::Display for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            instance_dir_name(self.config.server_id()),
            self.root().display()
        )
    }
}

/// Read-only seed data shared by every instance of an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapArtifacts {
    pub config_template: PathBuf,
    pub seed_archive: PathBuf,
    pub schema_script: PathBuf,
}

impl BootstrapArtifacts {
    /// Resolves the well-known artefact paths beneath `vt_root`.
    pub fn under(vt_root: &Path) -> Self {
        let bootstrap = vt_root.join("data").join("bootstrap");
        Self {
            config_template: vt_root.join("config").join("mycnf"),
            seed_archive: bootstrap.join("mysql-db-dir.tbz"),
            schema_script: bootstrap.join("_vt_schema.sql"),
        }
    }
}

/// Executables and environment of the engine installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTools {
    /// Startup wrapper that supervises the engine process.
    pub launcher: PathBuf,
    /// Administrative client used for shutdown.
    pub admin_client: PathBuf,
    /// Interactive client used to apply the baseline schema.
    pub sql_client: PathBuf,
    /// Directory appended to the dynamic-library search path.
    pub library_dir: PathBuf,
    /// Working directory for spawned tools.
    pub working_dir: PathBuf,
}

impl EngineTools {
    /// Resolves the tools beneath `mysql_root`.
    pub fn under(mysql_root: &Path) -> Self {
        let bin = mysql_root.join("bin");
        Self {
            launcher: bin.join("mysqld_safe"),
            admin_client: bin.join("mysqladmin"),
            sql_client: bin.join("mysql"),
            library_dir: mysql_root.join("lib").join("mysql"),
            working_dir: mysql_root.to_path_buf(),
        }
    }
}

/// Every installation-relative path the controller needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub tools: EngineTools,
    pub artifacts: BootstrapArtifacts,
    pub shared_root: PathBuf,
}

impl Installation {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tools: EngineTools::under(config.mysql_root().as_std_path()),
            artifacts: BootstrapArtifacts::under(config.vt_root().as_std_path()),
            shared_root: config.shared_root().into_std_path_buf(),
        }
    }
}
