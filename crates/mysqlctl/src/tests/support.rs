//! Shared fixtures for unit and behaviour tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use mysqlctl_config::Config;
use rstest::fixture;
use tempfile::TempDir;

use crate::instance::{Installation, ManagedInstance};
use crate::process::{CommandRunner, EngineCommand, PollPolicy, ProcessError};

pub(crate) const SERVER_ID: u32 = 123;
pub(crate) const PORT: u16 = 3306;

/// A throwaway installation and instance rooted in a temporary directory.
pub(crate) struct Sandbox {
    pub(crate) dir: TempDir,
    pub(crate) config: Config,
    pub(crate) instance: ManagedInstance,
    pub(crate) installation: Installation,
}

impl Sandbox {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        Self::from_config(dir, Config::rooted_at(&base))
    }

    /// Uses a dedicated shared root beside the data root.
    pub(crate) fn with_shared_root() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let config = Config {
            shared_root: Some(base.join("shared")),
            ..Config::rooted_at(&base)
        };
        fs::create_dir_all(config.shared_root()).expect("create shared root");
        Self::from_config(dir, config)
    }

    fn from_config(dir: TempDir, config: Config) -> Self {
        let config = Config {
            wait_iterations: Some(3),
            poll_interval_ms: Some(5),
            ..config
        };
        let instance = ManagedInstance::from_config(&config, SERVER_ID, PORT);
        let installation = Installation::from_config(&config);
        Self {
            dir,
            config,
            instance,
            installation,
        }
    }

    pub(crate) fn base(&self) -> &Utf8Path {
        Utf8Path::from_path(self.dir.path()).expect("utf8 temp dir")
    }

    /// Creates an empty identity directory in the shared root so the
    /// instance's entry of the same name is redirected.
    pub(crate) fn share(&self, name: &str) {
        fs::create_dir_all(self.installation.shared_root.join(name)).expect("create shared dir");
    }

    pub(crate) fn write_schema(&self, schema: &str) {
        let path = &self.installation.artifacts.schema_script;
        touch(path);
        fs::write(path, schema).expect("write schema");
    }

    pub(crate) fn write_template(&self, template: &str) {
        let path = &self.installation.artifacts.config_template;
        touch(path);
        fs::write(path, template).expect("write template");
    }

    pub(crate) fn touch_socket(&self) {
        touch(self.instance.config().socket_file());
    }

    pub(crate) fn touch_pid(&self, pid: u32) {
        let path = self.instance.config().pid_file();
        touch(path);
        fs::write(path, format!("{pid}\n")).expect("write pid");
    }
}

pub(crate) fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, b"").expect("touch file");
}

pub(crate) fn fast_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), 3)
}

#[fixture]
pub(crate) fn sandbox() -> Sandbox {
    Sandbox::new()
}

#[fixture]
pub(crate) fn shared_sandbox() -> Sandbox {
    Sandbox::with_shared_root()
}

/// Stands in for the engine tools.
///
/// The launcher creates the instance socket; the administrative client
/// removes it unless configured to fail. Every other tool succeeds.
#[derive(Debug)]
pub(crate) struct FakeRunner {
    socket: PathBuf,
    pid_file: PathBuf,
    refuse_shutdown: AtomicBool,
    launches: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub(crate) fn for_instance(instance: &ManagedInstance) -> Self {
        Self {
            socket: instance.config().socket_file().to_path_buf(),
            pid_file: instance.config().pid_file().to_path_buf(),
            refuse_shutdown: AtomicBool::new(false),
            launches: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refuse_shutdown(&self) {
        self.refuse_shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl CommandRunner for FakeRunner {
    fn spawn_detached(&self, command: &EngineCommand) -> Result<(), ProcessError> {
        self.commands.lock().expect("commands lock").push(command.name());
        self.launches.fetch_add(1, Ordering::SeqCst);
        touch(&self.socket);
        Ok(())
    }

    fn run(&self, command: &EngineCommand) -> Result<String, ProcessError> {
        let name = command.name();
        self.commands.lock().expect("commands lock").push(name.clone());
        if name != "mysqladmin" {
            return Ok(String::new());
        }
        if self.refuse_shutdown.load(Ordering::SeqCst) {
            return Err(ProcessError::CommandFailed {
                command: name,
                status: Some(1),
                output: String::from("mysqladmin: shutdown failed; error: 'Access denied'"),
            });
        }
        for marker in [&self.socket, &self.pid_file] {
            let _ = fs::remove_file(marker);
        }
        Ok(String::new())
    }
}
