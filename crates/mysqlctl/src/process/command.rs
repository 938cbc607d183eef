//! External executable invocation.
//!
//! [`CommandRunner`] is the seam between the controller and the operating
//! system. [`SystemCommandRunner`] is the production implementation; tests
//! substitute a mock so no real engine tools are required.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use super::PROCESS_TARGET;
use super::error::ProcessError;

/// Description of an external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    working_dir: Option<PathBuf>,
    input: Option<String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Text written to the tool's standard input before waiting on it.
    #[must_use]
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn environment(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn stdin_input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Returns true when any argument equals `needle`.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg.as_os_str() == OsStr::new(needle))
    }

    /// Short name used in diagnostics: the program's file name.
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.env.iter().map(|(key, value)| (key, value)));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Executes external tools on behalf of the controller.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Spawns the command without waiting for it.
    ///
    /// The spawned process must outlive the caller. Implementations reap it in
    /// the background so it never lingers as a zombie.
    fn spawn_detached(&self, command: &EngineCommand) -> Result<(), ProcessError>;

    /// Runs the command to completion and returns its combined output.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::CommandFailed`] carrying the combined output
    /// when the tool exits unsuccessfully.
    fn run(&self, command: &EngineCommand) -> Result<String, ProcessError>;
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn spawn_detached(&self, command: &EngineCommand) -> Result<(), ProcessError> {
        let name = command.name();
        let mut process = command.to_command();
        process
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Keep terminal signals aimed at the controller away from the engine.
            process.process_group(0);
        }
        let child = process.spawn().map_err(|source| ProcessError::Spawn {
            command: name.clone(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            command = %name,
            pid = child.id(),
            "spawned detached process"
        );
        spawn_reaper(name, child);
        Ok(())
    }

    fn run(&self, command: &EngineCommand) -> Result<String, ProcessError> {
        let name = command.name();
        debug!(
            target: PROCESS_TARGET,
            command = %name,
            args = ?command.arguments(),
            "running command"
        );
        let mut process = command.to_command();
        process.stdout(Stdio::piped()).stderr(Stdio::piped());
        process.stdin(if command.stdin_input().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        let mut child = process.spawn().map_err(|source| ProcessError::Spawn {
            command: name.clone(),
            source,
        })?;

        // Stdin is fed from its own thread so a client that answers while
        // reading cannot fill the output pipes and stall the write.
        let (output, write_result) = thread::scope(|scope| {
            let writer = match (command.stdin_input(), child.stdin.take()) {
                // Dropping stdin after the write closes the pipe.
                (Some(input), Some(mut stdin)) => {
                    Some(scope.spawn(move || stdin.write_all(input.as_bytes())))
                }
                _ => None,
            };
            let output = child.wait_with_output();
            let write_result = writer.map_or(Ok(()), |handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")))
            });
            (output, write_result)
        });
        let output = output.map_err(|source| ProcessError::Wait {
            command: name.clone(),
            source,
        })?;
        let combined = combine_output(&output.stdout, &output.stderr);
        if !output.status.success() {
            return Err(ProcessError::CommandFailed {
                command: name,
                status: output.status.code(),
                output: combined,
            });
        }
        write_result.map_err(|source| ProcessError::Wait {
            command: name,
            source,
        })?;
        Ok(combined)
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined
}

/// Drains the child's stderr and collects its exit status on a detached
/// thread. The result is logged and never reported to the caller.
fn spawn_reaper(name: String, mut child: Child) {
    let pid = child.id();
    let stderr = child.stderr.take();
    let spawned = thread::Builder::new()
        .name(format!("reaper-{pid}"))
        .spawn(move || {
            let mut captured = Vec::new();
            if let Some(mut stderr) = stderr
                && let Err(error) = stderr.read_to_end(&mut captured)
            {
                debug!(target: PROCESS_TARGET, pid, %error, "stopped reading stderr");
            }
            let stderr_text = String::from_utf8_lossy(&captured);
            match child.wait() {
                Ok(status) => info!(
                    target: PROCESS_TARGET,
                    command = %name,
                    pid,
                    ?status,
                    stderr = %stderr_text.trim(),
                    "detached process exited"
                ),
                Err(error) => warn!(
                    target: PROCESS_TARGET,
                    command = %name,
                    pid,
                    %error,
                    "failed to reap detached process"
                ),
            }
        });
    if let Err(error) = spawned {
        warn!(
            target: PROCESS_TARGET,
            pid,
            %error,
            "failed to start reaper thread"
        );
    }
}
