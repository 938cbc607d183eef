//! Start, shutdown, and status for one engine instance.

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::instance::{EngineTools, ManagedInstance};

use super::PROCESS_TARGET;
use super::command::{CommandRunner, EngineCommand};
use super::error::ProcessError;
use super::monitoring::{PollPolicy, Presence, WaitOutcome, path_exists, read_pid, wait_for};

const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Observed state of an instance's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// The engine is up. `pid` is absent while the pid file has not been
    /// written yet.
    Running { pid: Option<u32> },
    /// Neither a socket nor a pid file is present.
    Stopped,
    /// A pid file names a process that no longer exists.
    Stale { pid: u32 },
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running { pid: Some(pid) } => write!(f, "running (pid {pid})"),
            Self::Running { pid: None } => write!(f, "running (pid unknown)"),
            Self::Stopped => write!(f, "stopped"),
            Self::Stale { pid } => write!(f, "stale pid file (pid {pid} is not running)"),
        }
    }
}

/// Drives the external engine process.
///
/// The controller holds no per-instance state and performs no locking;
/// callers must serialise operations against a given instance.
#[derive(Clone)]
pub struct ProcessController {
    runner: Arc<dyn CommandRunner>,
    tools: EngineTools,
    policy: PollPolicy,
}

impl fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessController")
            .field("tools", &self.tools)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ProcessController {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: EngineTools, policy: PollPolicy) -> Self {
        Self {
            runner,
            tools,
            policy,
        }
    }

    pub fn tools(&self) -> &EngineTools {
        &self.tools
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Launches the engine and waits for its socket to appear.
    ///
    /// A successful spawn is not readiness. The launcher keeps running after
    /// this call returns and is reaped in the background.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Spawn`] when the launcher cannot be executed.
    /// - [`ProcessError::Probe`] when the socket cannot be inspected.
    /// - [`ProcessError::StartTimeout`] when the socket does not appear in time.
    pub fn start(&self, instance: &ManagedInstance) -> Result<(), ProcessError> {
        let command = self.launcher_command(instance);
        let socket = instance.config().socket_file();
        info!(
            target: PROCESS_TARGET,
            launcher = %self.tools.launcher.display(),
            socket = %socket.display(),
            "starting engine"
        );
        self.runner.spawn_detached(&command)?;
        match wait_for(socket, Presence::Present, self.policy)? {
            WaitOutcome::Reached { round } => {
                info!(
                    target: PROCESS_TARGET,
                    socket = %socket.display(),
                    round,
                    "engine socket is ready"
                );
                Ok(())
            }
            WaitOutcome::TimedOut => Err(ProcessError::StartTimeout {
                launcher: self.tools.launcher.clone(),
                socket: socket.to_path_buf(),
                waited: self.policy.budget(),
            }),
        }
    }

    /// Asks the engine to stop.
    ///
    /// Returns immediately when neither the socket nor the pid file exists.
    /// With `wait_for_completion` set, polls until the socket disappears; a
    /// full buffer flush can take far longer than the poll budget, so a
    /// timeout means "still stopping", not "stuck".
    ///
    /// # Errors
    ///
    /// - [`ProcessError::CommandFailed`] or [`ProcessError::Spawn`] when the
    ///   administrative client fails. No wait happens in that case.
    /// - [`ProcessError::ShutdownTimeout`] when the socket outlives the poll
    ///   budget.
    pub fn shutdown(
        &self,
        instance: &ManagedInstance,
        wait_for_completion: bool,
    ) -> Result<(), ProcessError> {
        let config = instance.config();
        let socket_present = path_exists(config.socket_file())?;
        let pid_present = path_exists(config.pid_file())?;
        if !socket_present && !pid_present {
            warn!(
                target: PROCESS_TARGET,
                instance = %instance,
                "assuming engine is stopped: no socket and no pid file"
            );
            return Ok(());
        }

        let command = self.admin_command(instance, "shutdown");
        info!(target: PROCESS_TARGET, instance = %instance, "requesting engine shutdown");
        self.runner.run(&command)?;

        if !wait_for_completion {
            return Ok(());
        }
        match wait_for(config.socket_file(), Presence::Absent, self.policy)? {
            WaitOutcome::Reached { round } => {
                info!(
                    target: PROCESS_TARGET,
                    instance = %instance,
                    round,
                    "engine stopped"
                );
                Ok(())
            }
            WaitOutcome::TimedOut => Err(ProcessError::ShutdownTimeout {
                socket: config.socket_file().to_path_buf(),
                waited: self.policy.budget(),
            }),
        }
    }

    /// Reports whether the instance appears to be running.
    pub fn status(&self, instance: &ManagedInstance) -> Result<InstanceStatus, ProcessError> {
        let config = instance.config();
        let socket_present = path_exists(config.socket_file())?;
        match read_pid(config.pid_file())? {
            Some(pid) if process_is_alive(pid)? => Ok(InstanceStatus::Running { pid: Some(pid) }),
            Some(pid) => Ok(InstanceStatus::Stale { pid }),
            None if socket_present => Ok(InstanceStatus::Running { pid: None }),
            None => Ok(InstanceStatus::Stopped),
        }
    }

    pub(crate) fn launcher_command(&self, instance: &ManagedInstance) -> EngineCommand {
        self.tool_command(&self.tools.launcher, instance)
    }

    pub(crate) fn admin_command(&self, instance: &ManagedInstance, verb: &str) -> EngineCommand {
        self.tool_command(&self.tools.admin_client, instance)
            .arg("-u")
            .arg(instance.dba().username.as_str())
            .arg("-S")
            .arg(instance.config().socket_file())
            .arg(verb)
    }

    /// Base invocation shared by every engine tool: the defaults file comes
    /// first, as the engine tools require.
    fn tool_command(&self, program: &std::path::Path, instance: &ManagedInstance) -> EngineCommand {
        let mut defaults_file = OsString::from("--defaults-file=");
        defaults_file.push(instance.mycnf_file());
        EngineCommand::new(program)
            .arg(defaults_file)
            .env(LIBRARY_PATH_VAR, &self.tools.library_dir)
            .current_dir(&self.tools.working_dir)
    }
}

fn process_is_alive(pid: u32) -> Result<bool, ProcessError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(ProcessError::CheckProcess { pid, source }),
    }
}
