//! Unit tests for the bootstrap sequence and its default collaborators.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockall::Sequence;
use rstest::rstest;

use super::{
    BootstrapError, BootstrapSequencer, BootstrapServices, InstanceState, MockConfigRenderer,
    MockSeedExtractor, MockSqlExecutor, MysqlClientExecutor, RenderError, SeedExtractor,
    SqlExecutor, TarExtractor, TeardownFailure, render_template,
};
use crate::process::{MockCommandRunner, ProcessController, ProcessError};
use crate::storage::{DirectoryProvisioner, IDENTITY_DIRS, SharedRootResolver};
use crate::tests::support::{Sandbox, fast_policy, sandbox, touch};

const SCHEMA: &str = "CREATE TABLE a (x int);\nCREATE TABLE b (y int);;";

#[derive(Default)]
struct Doubles {
    runner: MockCommandRunner,
    renderer: MockConfigRenderer,
    extractor: MockSeedExtractor,
    executor: MockSqlExecutor,
}

fn sequencer(sandbox: &Sandbox, doubles: Doubles) -> BootstrapSequencer {
    let controller = ProcessController::new(
        Arc::new(doubles.runner),
        sandbox.installation.tools.clone(),
        fast_policy(),
    );
    let provisioner = DirectoryProvisioner::new(Arc::new(SharedRootResolver::new(
        &sandbox.installation.shared_root,
    )));
    let services = BootstrapServices {
        renderer: Arc::new(doubles.renderer),
        extractor: Arc::new(doubles.extractor),
        executor: Arc::new(doubles.executor),
    };
    BootstrapSequencer::new(
        controller,
        provisioner,
        services,
        sandbox.installation.artifacts.clone(),
    )
}

fn failed(command: &str) -> ProcessError {
    ProcessError::CommandFailed {
        command: command.to_owned(),
        status: Some(2),
        output: String::from("boom"),
    }
}

fn identity_entries(root: &Path) -> usize {
    IDENTITY_DIRS
        .iter()
        .filter(|name| fs::symlink_metadata(root.join(name)).is_ok())
        .count()
}

/// Expectations for a runner whose launcher creates the socket.
fn launching_runner(sandbox: &Sandbox) -> MockCommandRunner {
    let socket = sandbox.instance.config().socket_file().to_path_buf();
    let mut runner = MockCommandRunner::new();
    runner.expect_spawn_detached().times(1).returning(move |_| {
        touch(&socket);
        Ok(())
    });
    runner
}

fn provision(sandbox: &Sandbox) {
    DirectoryProvisioner::new(Arc::new(SharedRootResolver::new(
        &sandbox.installation.shared_root,
    )))
    .provision_all(&sandbox.instance)
    .expect("provision");
}

#[rstest]
fn init_runs_every_stage_in_order(sandbox: Sandbox) {
    sandbox.write_schema(SCHEMA);
    let mut order = Sequence::new();
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .times(1)
        .in_sequence(&mut order)
        .returning(|_, instance| {
            Ok(format!(
                "[mysqld]\nserver-id = {}\n",
                instance.config().server_id()
            ))
        });
    let data_dir = sandbox.instance.config().data_dir().to_path_buf();
    doubles
        .extractor
        .expect_extract()
        .withf(move |_, destination| destination == data_dir.as_path())
        .times(1)
        .in_sequence(&mut order)
        .returning(|_, _| Ok(()));
    let socket = sandbox.instance.config().socket_file().to_path_buf();
    doubles
        .runner
        .expect_spawn_detached()
        .times(1)
        .in_sequence(&mut order)
        .returning(move |_| {
            touch(&socket);
            Ok(())
        });
    doubles
        .executor
        .expect_execute_batch()
        .withf(|connection, statements| {
            connection.username == "vt_dba"
                && statements == ["CREATE TABLE a (x int)", "CREATE TABLE b (y int)"]
        })
        .times(1)
        .in_sequence(&mut order)
        .returning(|_, _| Ok(()));

    sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect("init succeeds");

    let mycnf = sandbox.instance.mycnf_file();
    assert_eq!(
        fs::read_to_string(mycnf).expect("read my.cnf"),
        "[mysqld]\nserver-id = 123\n"
    );
    let mode = fs::metadata(mycnf).expect("metadata").permissions().mode();
    assert_eq!(mode & !0o664 & 0o777, 0);
    assert_eq!(identity_entries(sandbox.instance.root()), IDENTITY_DIRS.len());
}

#[rstest]
fn init_stops_when_extraction_fails(sandbox: Sandbox) {
    sandbox.write_schema(SCHEMA);
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .returning(|_, _| Ok(String::from("[mysqld]\n")));
    doubles
        .extractor
        .expect_extract()
        .returning(|_, _| Err(failed("tar")));
    doubles.runner.expect_spawn_detached().times(0);
    doubles.executor.expect_execute_batch().times(0);

    let error = sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect_err("extraction fails");
    assert!(matches!(error, BootstrapError::ExtractSeed { .. }));
    assert_eq!(error.failed_stage(), Some(InstanceState::SeedUnpacked));
    // Earlier stages are not rolled back.
    assert!(sandbox.instance.mycnf_file().is_file());
}

#[rstest]
fn init_reports_start_timeout_and_skips_schema(sandbox: Sandbox) {
    sandbox.write_schema(SCHEMA);
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .returning(|_, _| Ok(String::new()));
    doubles.extractor.expect_extract().returning(|_, _| Ok(()));
    doubles.runner.expect_spawn_detached().returning(|_| Ok(()));
    doubles.executor.expect_execute_batch().times(0);

    let error = sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect_err("socket never appears");
    assert!(matches!(error, BootstrapError::Start { .. }));
    assert!(error.is_timeout());
    assert!(error.to_string().contains("error.log"));
}

#[rstest]
fn init_reports_render_failure(sandbox: Sandbox) {
    let mut doubles = Doubles::default();
    doubles.renderer.expect_render().returning(|_, _| {
        Err(RenderError::UnknownField {
            field: String::from(".Nope"),
        })
    });
    doubles.extractor.expect_extract().times(0);

    let error = sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect_err("render fails");
    assert!(matches!(error, BootstrapError::RenderConfig { .. }));
    assert_eq!(error.failed_stage(), Some(InstanceState::ConfigWritten));
}

#[rstest]
fn init_reports_missing_schema(sandbox: Sandbox) {
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .returning(|_, _| Ok(String::new()));
    doubles.extractor.expect_extract().returning(|_, _| Ok(()));
    doubles.runner = launching_runner(&sandbox);
    doubles.executor.expect_execute_batch().times(0);

    let error = sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect_err("schema missing");
    assert!(matches!(error, BootstrapError::ReadSchema { .. }));
}

#[rstest]
fn init_reports_schema_failure(sandbox: Sandbox) {
    sandbox.write_schema(SCHEMA);
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .returning(|_, _| Ok(String::new()));
    doubles.extractor.expect_extract().returning(|_, _| Ok(()));
    doubles.runner = launching_runner(&sandbox);
    doubles
        .executor
        .expect_execute_batch()
        .returning(|_, _| Err(failed("mysql")));

    let error = sequencer(&sandbox, doubles)
        .init(&sandbox.instance)
        .expect_err("schema fails");
    assert!(matches!(error, BootstrapError::ApplySchema(_)));
    assert_eq!(error.failed_stage(), Some(InstanceState::SchemaLoaded));
}

#[rstest]
fn teardown_without_force_keeps_directories_when_shutdown_fails(sandbox: Sandbox) {
    provision(&sandbox);
    sandbox.touch_socket();
    let mut doubles = Doubles::default();
    doubles
        .runner
        .expect_run()
        .returning(|_| Err(failed("mysqladmin")));

    let error = sequencer(&sandbox, doubles)
        .teardown(&sandbox.instance, false)
        .expect_err("shutdown fails");
    assert!(matches!(error, BootstrapError::Shutdown(_)));
    assert_eq!(identity_entries(sandbox.instance.root()), IDENTITY_DIRS.len());
}

#[rstest]
fn forced_teardown_removes_directories_and_reports_shutdown(sandbox: Sandbox) {
    provision(&sandbox);
    sandbox.touch_socket();
    let mut doubles = Doubles::default();
    doubles
        .runner
        .expect_run()
        .returning(|_| Err(failed("mysqladmin")));

    let error = sequencer(&sandbox, doubles)
        .teardown(&sandbox.instance, true)
        .expect_err("shutdown failure is still reported");
    let BootstrapError::Teardown(failures) = error else {
        panic!("expected teardown failures, got {error:?}");
    };
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures.last(), Some(TeardownFailure::Shutdown(_))));
    assert_eq!(identity_entries(sandbox.instance.root()), 0);
}

#[rstest]
fn forced_teardown_reports_removal_failure_last(sandbox: Sandbox) {
    provision(&sandbox);
    sandbox.touch_socket();
    let bin_logs = sandbox.instance.root().join("bin-logs");
    fs::remove_dir_all(&bin_logs).expect("clear bin-logs");
    std::os::unix::fs::symlink(&bin_logs, &bin_logs).expect("looping link");
    let mut doubles = Doubles::default();
    doubles
        .runner
        .expect_run()
        .returning(|_| Err(failed("mysqladmin")));

    let error = sequencer(&sandbox, doubles)
        .teardown(&sandbox.instance, true)
        .expect_err("both steps fail");
    let BootstrapError::Teardown(failures) = error else {
        panic!("expected teardown failures, got {error:?}");
    };
    assert_eq!(failures.len(), 2);
    assert!(matches!(
        failures.iter().next(),
        Some(TeardownFailure::Shutdown(_))
    ));
    assert!(matches!(failures.last(), Some(TeardownFailure::Removal(_))));
    assert_eq!(identity_entries(sandbox.instance.root()), 0);
}

#[rstest]
fn teardown_of_stopped_instance_removes_directories(sandbox: Sandbox) {
    provision(&sandbox);
    let mut doubles = Doubles::default();
    doubles.runner.expect_run().times(0);

    sequencer(&sandbox, doubles)
        .teardown(&sandbox.instance, false)
        .expect("teardown succeeds");
    assert_eq!(identity_entries(sandbox.instance.root()), 0);
}

#[rstest]
fn reinit_does_not_init_after_failed_teardown(sandbox: Sandbox) {
    provision(&sandbox);
    sandbox.touch_socket();
    let mut doubles = Doubles::default();
    doubles
        .runner
        .expect_run()
        .returning(|_| Err(failed("mysqladmin")));
    doubles.runner.expect_spawn_detached().times(0);
    doubles.renderer.expect_render().times(0);

    let error = sequencer(&sandbox, doubles)
        .reinit(&sandbox.instance)
        .expect_err("teardown fails");
    let BootstrapError::Shutdown(ProcessError::CommandFailed { command, .. }) = error else {
        panic!("teardown error must surface unchanged, got {error:?}");
    };
    assert_eq!(command, "mysqladmin");
}

#[rstest]
fn reinit_rebuilds_stopped_instance(sandbox: Sandbox) {
    provision(&sandbox);
    touch(&sandbox.instance.config().data_dir().join("stale.ibd"));
    sandbox.write_schema(SCHEMA);
    let mut doubles = Doubles::default();
    doubles
        .renderer
        .expect_render()
        .times(1)
        .returning(|_, _| Ok(String::new()));
    doubles.extractor.expect_extract().times(1).returning(|_, _| Ok(()));
    doubles.runner = launching_runner(&sandbox);
    doubles
        .executor
        .expect_execute_batch()
        .times(1)
        .returning(|_, _| Ok(()));

    sequencer(&sandbox, doubles)
        .reinit(&sandbox.instance)
        .expect("reinit succeeds");
    assert!(!sandbox.instance.config().data_dir().join("stale.ibd").exists());
}

#[rstest]
fn template_fields_follow_instance_layout(sandbox: Sandbox) {
    let rendered = render_template(
        "server-id = {{.ServerId}}\nport={{ .MysqlPort }}\nsocket = {{.SocketFile}}\n",
        &sandbox.instance,
    )
    .expect("render");
    let socket = sandbox.instance.config().socket_file().display().to_string();
    assert_eq!(
        rendered,
        format!("server-id = 123\nport=3306\nsocket = {socket}\n")
    );
}

#[rstest]
#[case::unknown_field("x = {{.Unknown}}")]
#[case::missing_dot("x = {{ServerId}}")]
fn template_rejects_unknown_fields(sandbox: Sandbox, #[case] template: &str) {
    let error = render_template(template, &sandbox.instance).expect_err("unknown field");
    assert!(matches!(error, RenderError::UnknownField { .. }));
}

#[rstest]
fn template_rejects_unterminated_placeholder(sandbox: Sandbox) {
    let error = render_template("a {{.ServerId", &sandbox.instance).expect_err("unterminated");
    assert!(matches!(error, RenderError::Unterminated { offset: 2 }));
}

#[rstest]
fn template_fills_account_fields(sandbox: Sandbox) {
    let rendered = render_template(
        "master-user = {{.ReplUser}}\ndefault-character-set = {{.Charset}}\n",
        &sandbox.instance,
    )
    .expect("render");
    assert_eq!(
        rendered,
        "master-user = vt_repl\ndefault-character-set = utf8\n"
    );
}

#[rstest]
fn template_renderer_reads_file(sandbox: Sandbox) {
    use super::{ConfigRenderer, TemplateRenderer};

    sandbox.write_template("datadir = {{.DataDir}}\n");
    let rendered = TemplateRenderer
        .render(&sandbox.installation.artifacts.config_template, &sandbox.instance)
        .expect("render");
    assert!(rendered.ends_with("vt_0000000123/data\n"), "got: {rendered}");
}

#[test]
fn tar_extractor_unpacks_into_destination() {
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .withf(|command| {
            let args: Vec<_> = command
                .arguments()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            command.name() == "tar"
                && args == ["-xj", "-C", "/vt/vt_0000000001/data", "-f", "/seed.tbz"]
        })
        .times(1)
        .returning(|_| Ok(String::new()));
    TarExtractor::new(Arc::new(runner))
        .extract(
            &PathBuf::from("/seed.tbz"),
            &PathBuf::from("/vt/vt_0000000001/data"),
        )
        .expect("extract");
}

#[rstest]
fn mysql_client_pipes_statements_over_instance_socket(sandbox: Sandbox) {
    let socket = sandbox.instance.config().socket_file().display().to_string();
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .withf(move |command| {
            command.name() == "mysql"
                && command.has_arg("vt_dba")
                && command.has_arg(&socket)
                && command.has_arg("--default-character-set=utf8")
                && command.stdin_input() == Some("SELECT 1;\nSELECT 2;\n")
        })
        .times(1)
        .returning(|_| Ok(String::new()));
    MysqlClientExecutor::new(Arc::new(runner), sandbox.installation.tools.clone())
        .execute_batch(
            sandbox.instance.dba(),
            &[String::from("SELECT 1"), String::from("SELECT 2")],
        )
        .expect("execute");
}

#[rstest]
fn mysql_client_skips_empty_batches(sandbox: Sandbox) {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().times(0);
    MysqlClientExecutor::new(Arc::new(runner), sandbox.installation.tools.clone())
        .execute_batch(sandbox.instance.dba(), &[])
        .expect("nothing to run");
}

#[test]
fn instance_states_are_ordered() {
    assert!(InstanceState::Unprovisioned < InstanceState::DirectoriesReady);
    assert!(InstanceState::Running < InstanceState::SchemaLoaded);
    assert_eq!(InstanceState::SeedUnpacked.to_string(), "seed_unpacked");
}
