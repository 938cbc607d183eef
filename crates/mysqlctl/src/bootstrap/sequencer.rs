//! The init, teardown, and reinit sequences.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;

use strum::{AsRefStr, Display};
use tracing::{error, info, warn};

use crate::instance::{BootstrapArtifacts, Installation, ManagedInstance};
use crate::process::{CommandRunner, PollPolicy, ProcessController};
use crate::storage::{DirectoryProvisioner, SharedRootResolver};

use super::BOOTSTRAP_TARGET;
use super::collaborators::{
    ConfigRenderer, MysqlClientExecutor, SeedExtractor, SqlExecutor, TarExtractor,
    TemplateRenderer,
};
use super::error::{BootstrapError, TeardownFailure, TeardownFailures};
use super::schema::split_statements;

const MYCNF_MODE: u32 = 0o664;

/// Lifecycle states an instance passes through during init, in order.
///
/// Teardown with `force` always returns the instance to
/// [`InstanceState::Unprovisioned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum InstanceState {
    Unprovisioned,
    DirectoriesReady,
    ConfigWritten,
    SeedUnpacked,
    Running,
    SchemaLoaded,
}

/// The collaborators the sequencer delegates to.
#[derive(Clone)]
pub struct BootstrapServices {
    pub renderer: Arc<dyn ConfigRenderer>,
    pub extractor: Arc<dyn SeedExtractor>,
    pub executor: Arc<dyn SqlExecutor>,
}

impl BootstrapServices {
    /// Default collaborators backed by the system `tar` and the engine's
    /// command-line client.
    pub fn system(runner: Arc<dyn CommandRunner>, installation: &Installation) -> Self {
        Self {
            renderer: Arc::new(TemplateRenderer),
            extractor: Arc::new(TarExtractor::new(Arc::clone(&runner))),
            executor: Arc::new(MysqlClientExecutor::new(
                runner,
                installation.tools.clone(),
            )),
        }
    }
}

impl fmt::Debug for BootstrapServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapServices").finish_non_exhaustive()
    }
}

/// Composes process control and storage into whole-instance operations.
///
/// Like the controller it wraps, the sequencer does no locking.
#[derive(Debug, Clone)]
pub struct BootstrapSequencer {
    controller: ProcessController,
    provisioner: DirectoryProvisioner,
    services: BootstrapServices,
    artifacts: BootstrapArtifacts,
}

impl BootstrapSequencer {
    pub fn new(
        controller: ProcessController,
        provisioner: DirectoryProvisioner,
        services: BootstrapServices,
        artifacts: BootstrapArtifacts,
    ) -> Self {
        Self {
            controller,
            provisioner,
            services,
            artifacts,
        }
    }

    /// Wires the production collaborators for `installation`.
    pub fn for_installation(
        installation: &Installation,
        runner: Arc<dyn CommandRunner>,
        policy: PollPolicy,
    ) -> Self {
        let controller = ProcessController::new(
            Arc::clone(&runner),
            installation.tools.clone(),
            policy,
        );
        let provisioner = DirectoryProvisioner::new(Arc::new(SharedRootResolver::new(
            &installation.shared_root,
        )));
        let services = BootstrapServices::system(runner, installation);
        Self::new(
            controller,
            provisioner,
            services,
            installation.artifacts.clone(),
        )
    }

    pub fn controller(&self) -> &ProcessController {
        &self.controller
    }

    pub fn provisioner(&self) -> &DirectoryProvisioner {
        &self.provisioner
    }

    /// Builds a fresh instance and leaves it running with the baseline
    /// schema loaded.
    ///
    /// # Errors
    ///
    /// Stops at the first failing stage. Nothing is rolled back; recover with
    /// a forced [`teardown`](Self::teardown).
    pub fn init(&self, instance: &ManagedInstance) -> Result<(), BootstrapError> {
        info!(target: BOOTSTRAP_TARGET, instance = %instance, "initialising instance");
        let result = self.run_init(instance);
        if let Err(error) = &result {
            error!(
                target: BOOTSTRAP_TARGET,
                instance = %instance,
                stage = ?error.failed_stage(),
                %error,
                "init aborted"
            );
        }
        result
    }

    fn run_init(&self, instance: &ManagedInstance) -> Result<(), BootstrapError> {
        self.provisioner
            .provision_all(instance)
            .map_err(BootstrapError::Provision)?;
        reached(instance, InstanceState::DirectoriesReady);

        let template = &self.artifacts.config_template;
        let rendered = self
            .services
            .renderer
            .render(template, instance)
            .map_err(|source| BootstrapError::RenderConfig {
                template: template.clone(),
                source,
            })?;
        write_config(instance.mycnf_file(), &rendered)?;
        reached(instance, InstanceState::ConfigWritten);

        let archive = &self.artifacts.seed_archive;
        self.services
            .extractor
            .extract(archive, instance.config().data_dir())
            .map_err(|source| BootstrapError::ExtractSeed {
                archive: archive.clone(),
                source,
            })?;
        reached(instance, InstanceState::SeedUnpacked);

        self.controller
            .start(instance)
            .map_err(|source| BootstrapError::Start {
                error_log: instance.config().error_log_path().to_path_buf(),
                source,
            })?;
        reached(instance, InstanceState::Running);

        let schema_path = &self.artifacts.schema_script;
        let schema =
            fs::read_to_string(schema_path).map_err(|source| BootstrapError::ReadSchema {
                path: schema_path.clone(),
                source,
            })?;
        let statements = split_statements(&schema);
        self.services
            .executor
            .execute_batch(instance.dba(), &statements)
            .map_err(BootstrapError::ApplySchema)?;
        reached(instance, InstanceState::SchemaLoaded);
        Ok(())
    }

    /// Stops the engine and removes the instance's identity directories.
    ///
    /// Without `force`, a failed shutdown is returned as
    /// [`BootstrapError::Shutdown`] and nothing is deleted. With `force`,
    /// every step runs regardless and all failures are reported together.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::Shutdown`] or [`BootstrapError::Teardown`].
    pub fn teardown(&self, instance: &ManagedInstance, force: bool) -> Result<(), BootstrapError> {
        info!(target: BOOTSTRAP_TARGET, instance = %instance, force, "tearing down instance");
        let mut failures = Vec::new();
        if let Err(error) = self.controller.shutdown(instance, true) {
            warn!(target: BOOTSTRAP_TARGET, instance = %instance, %error, "failed mysqld shutdown");
            if !force {
                return Err(BootstrapError::Shutdown(error));
            }
            failures.push(TeardownFailure::Shutdown(error));
        }

        if let Err(errors) = self.provisioner.remove(instance.root()) {
            failures.extend(errors.into_iter().map(TeardownFailure::Removal));
        }
        if !failures.is_empty() {
            return Err(BootstrapError::Teardown(TeardownFailures::new(failures)));
        }
        reached(instance, InstanceState::Unprovisioned);
        Ok(())
    }

    /// Tears the instance down without force, then initialises it again.
    ///
    /// # Errors
    ///
    /// A teardown error is returned unchanged and init is not attempted.
    pub fn reinit(&self, instance: &ManagedInstance) -> Result<(), BootstrapError> {
        self.teardown(instance, false)?;
        self.init(instance)
    }
}

fn reached(instance: &ManagedInstance, state: InstanceState) {
    info!(
        target: BOOTSTRAP_TARGET,
        instance = %instance,
        state = state.as_ref(),
        "instance state reached"
    );
}

fn write_config(path: &Path, contents: &str) -> Result<(), BootstrapError> {
    let write_error = |source| BootstrapError::WriteConfig {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(MYCNF_MODE)
        .open(path)
        .map_err(write_error)?;
    file.write_all(contents.as_bytes()).map_err(write_error)
}
