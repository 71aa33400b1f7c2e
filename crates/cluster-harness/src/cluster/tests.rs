//! Unit tests for the cluster controller against a scripted runtime.

use std::collections::BTreeSet;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cluster_harness_config::HarnessConfig;
use mockall::mock;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::command::Invocation;
use crate::host_dir::HostDirectory;

mock! {
    Docker {}
    impl ProcessExecutor for Docker {
        fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, HarnessError>;
    }
}

const COMPOSE: &str = r"
services:
  zookeeper:
    image: confluentinc/cp-zookeeper
  default-config:
    image: confluentinc/cp-kafka
  failing-config:
    image: confluentinc/cp-kafka
";

/// Behaviour of the scripted container runtime.
#[derive(Debug, Clone, Default)]
struct Script {
    running: BTreeSet<&'static str>,
    exited: BTreeSet<&'static str>,
    fail_up: bool,
    fail_down: bool,
    probe_failures: u32,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<Vec<String>>,
    probes: u32,
}

impl Journal {
    fn count(&self, subcommand: &str) -> usize {
        self.calls
            .iter()
            .filter(|args| subcommand_of(args) == Some(subcommand))
            .count()
    }

    fn last(&self, subcommand: &str) -> Option<&Vec<String>> {
        self.calls
            .iter()
            .rev()
            .find(|args| subcommand_of(args) == Some(subcommand))
    }
}

const SUBCOMMANDS: [&str; 6] = ["up", "down", "ps", "exec", "logs", "inspect"];

fn subcommand_of(args: &[String]) -> Option<&str> {
    args.iter()
        .map(String::as_str)
        .find(|arg| SUBCOMMANDS.contains(arg))
}

fn trailing_after<'a>(args: &'a [String], marker: &str) -> &'a [String] {
    args.iter()
        .position(|arg| arg == marker)
        .and_then(|index| args.get(index + 1..))
        .unwrap_or_default()
}

fn respond(script: &Script, journal: &mut Journal, args: &[String]) -> CommandOutput {
    let ok = |stdout: String| CommandOutput::new(Some(0), stdout, "");
    match subcommand_of(args) {
        Some("up") if script.fail_up => {
            CommandOutput::new(Some(1), "", "pull access denied for confluentinc/cp-kafka\n")
        }
        Some("down") if script.fail_down => CommandOutput::new(Some(1), "", "network in use\n"),
        Some("ps") if args.iter().any(|arg| arg == "running") => ok(script
            .running
            .iter()
            .map(|name| format!("cid-{name}\n"))
            .collect()),
        Some("ps") => {
            let service = args.last().map_or("", String::as_str);
            if script.running.contains(service) || script.exited.contains(service) {
                ok(format!("cid-{service}\n"))
            } else {
                ok(String::new())
            }
        }
        Some("inspect") => {
            let id = args.last().map_or("", String::as_str);
            let service = id.trim_start_matches("cid-");
            ok(format!("{}\n", script.running.contains(service)))
        }
        Some("exec") => {
            let rest = trailing_after(args, "-T");
            let Some((service, argv)) = rest.split_first() else {
                return CommandOutput::new(Some(2), "", "missing service\n");
            };
            if argv.first().is_some_and(|program| program == "bash") {
                journal.probes += 1;
                if journal.probes <= script.probe_failures {
                    return ok(String::from("FAIL\n"));
                }
                return ok(String::from("PASS\n"));
            }
            if argv.first().is_some_and(|program| program == "false") {
                return CommandOutput::new(Some(1), "", "command failed\n");
            }
            ok(format!("{service}: {}\n", argv.join(" ")))
        }
        Some("logs") => {
            let service = args.last().map_or("", String::as_str);
            CommandOutput::new(Some(0), "", format!("{service} exiting: BROKER_ID is required.\n"))
        }
        _ => ok(String::new()),
    }
}

struct Harness {
    fixtures: TempDir,
    journal: Arc<Mutex<Journal>>,
}

impl Harness {
    fn new() -> Self {
        let fixtures = TempDir::new().expect("temp dir");
        fs::write(fixtures.path().join("standalone-config.yml"), COMPOSE).expect("write compose");
        Self {
            fixtures,
            journal: Arc::default(),
        }
    }

    fn definition(&self) -> ServiceGroupDefinition {
        ServiceGroupDefinition::new("config-test", self.fixtures.path(), "standalone-config.yml")
    }

    fn cluster(&self, script: Script) -> TestCluster<MockDocker> {
        self.cluster_for(self.definition(), script)
    }

    fn cluster_for(
        &self,
        definition: ServiceGroupDefinition,
        script: Script,
    ) -> TestCluster<MockDocker> {
        let journal = Arc::clone(&self.journal);
        let mut docker = MockDocker::new();
        docker.expect_execute().returning(move |invocation| {
            let mut journal = journal.lock().expect("journal lock");
            let args = invocation.get_args().to_vec();
            let output = respond(&script, &mut journal, &args);
            journal.calls.push(args);
            Ok(output)
        });
        let config = HarnessConfig::default();
        TestCluster::new(definition, CommandRunner::new(docker, &config)).expect("cluster")
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().expect("journal lock")
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn healthy() -> Script {
    Script {
        running: ["zookeeper", "default-config"].into_iter().collect(),
        exited: ["failing-config"].into_iter().collect(),
        ..Script::default()
    }
}

fn cat_properties() -> ContainerCommand {
    ContainerCommand::new("cat").arg("/etc/kafka/server.properties")
}

#[rstest]
fn services_are_read_from_the_compose_file(harness: Harness) {
    let cluster = harness.cluster(healthy());
    let names: Vec<&str> = cluster.services().map(ServiceHandle::name).collect();
    assert_eq!(names, ["default-config", "failing-config", "zookeeper"]);
    assert!(cluster.service("zookeeper").is_some());
}

#[rstest]
fn start_runs_compose_up_detached(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");

    let journal = harness.journal();
    let up = journal.last("up").expect("compose up issued");
    assert_eq!(up.first().map(String::as_str), Some("compose"));
    assert!(up.contains(&String::from("config-test")));
    assert_eq!(up.last().map(String::as_str), Some("-d"));
    drop(journal);

    assert!(
        cluster
            .services()
            .all(|handle| handle.state() == ServiceState::Starting)
    );
}

#[rstest]
fn second_start_is_rejected(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let err = cluster.start().expect_err("second start");
    assert!(matches!(err, HarnessError::AlreadyStarted { .. }), "got {err}");
    assert_eq!(harness.journal().count("up"), 1);
}

#[rstest]
fn failed_start_surfaces_and_still_tears_down(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        fail_up: true,
        ..healthy()
    });
    let err = cluster.start().expect_err("start must fail");
    match &err {
        HarnessError::GroupStart { group, message } => {
            assert_eq!(group, "config-test");
            assert!(message.contains("pull access denied"), "got {message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    cluster.shutdown();
    assert_eq!(harness.journal().count("down"), 1);
}

#[rstest]
fn commands_require_a_started_group(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    let err = cluster
        .run_command_on_service("zookeeper", &cat_properties())
        .expect_err("not started");
    assert!(matches!(err, HarnessError::NotStarted { .. }), "got {err}");
    assert!(harness.journal().calls.is_empty());
}

#[rstest]
fn run_command_on_service_execs_structured_argv(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");

    let output = cluster
        .run_command_on_service("default-config", &cat_properties())
        .expect("exec");
    assert_eq!(output, "default-config: cat /etc/kafka/server.properties\n");

    let journal = harness.journal();
    let exec = journal.last("exec").expect("exec issued");
    assert_eq!(
        trailing_after(exec, "exec"),
        ["-T", "default-config", "cat", "/etc/kafka/server.properties"]
    );
    drop(journal);
    assert_eq!(
        cluster.service("default-config").map(ServiceHandle::state),
        Some(ServiceState::Running)
    );
}

#[rstest]
fn unknown_service_fails_without_touching_the_runtime(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let before = harness.journal().calls.len();

    let err = cluster
        .run_command_on_service("no-such-service", &cat_properties())
        .expect_err("unknown service");
    match err {
        HarnessError::UnknownService { group, service } => {
            assert_eq!(group, "config-test");
            assert_eq!(service, "no-such-service");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.journal().calls.len(), before);
}

#[rstest]
fn exited_service_rejects_commands(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let err = cluster
        .run_command_on_service("failing-config", &cat_properties())
        .expect_err("not running");
    assert!(matches!(err, HarnessError::ServiceNotRunning { .. }), "got {err}");
    assert_eq!(
        cluster.service("failing-config").map(ServiceHandle::state),
        Some(ServiceState::Stopped)
    );
    assert_eq!(harness.journal().count("exec"), 0);
}

#[rstest]
fn failing_command_is_a_container_execution_error(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let err = cluster
        .run_command_on_service("zookeeper", &ContainerCommand::new("false"))
        .expect_err("command fails");
    assert!(
        matches!(err, HarnessError::ContainerExecution { status: Some(1), .. }),
        "got {err}"
    );
}

#[rstest]
fn logs_of_stopped_service_are_returned(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let logs = cluster
        .service_logs("failing-config", true)
        .expect("stopped logs");
    assert!(logs.contains("BROKER_ID is required."), "got {logs}");

    let journal = harness.journal();
    let call = journal.last("logs").expect("logs issued");
    assert_eq!(
        trailing_after(call, "logs"),
        ["--no-color", "--no-log-prefix", "failing-config"]
    );
}

#[rstest]
fn logs_of_exited_service_require_the_stopped_flag(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let err = cluster
        .service_logs("failing-config", false)
        .expect_err("not running");
    assert!(matches!(err, HarnessError::ServiceNotRunning { .. }), "got {err}");
    assert!(cluster.service_logs("zookeeper", false).is_ok());
}

#[rstest]
fn broadcast_skips_services_that_are_not_running(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let outputs = cluster
        .run_command_on_all(&ContainerCommand::new("hostname"))
        .expect("broadcast");
    let services: Vec<&str> = outputs.keys().map(String::as_str).collect();
    assert_eq!(services, ["default-config", "zookeeper"]);
    assert_eq!(
        outputs.get("zookeeper").map(String::as_str),
        Some("zookeeper: hostname\n")
    );
}

#[rstest]
fn service_state_reports_removed_containers(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        running: ["zookeeper"].into_iter().collect(),
        ..Script::default()
    });
    cluster.start().expect("start");
    assert_eq!(
        cluster.service_state("default-config").expect("state"),
        ServiceState::Removed
    );
    assert_eq!(
        cluster.service_state("zookeeper").expect("state"),
        ServiceState::Running
    );
}

#[rstest]
fn is_running_tracks_the_group_lifecycle(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    assert!(!cluster.is_running(), "not started yet");
    cluster.start().expect("start");
    assert!(cluster.is_running());
    cluster.shutdown();
    assert!(!cluster.is_running(), "shut down");
}

#[rstest]
fn is_running_is_false_when_every_container_exited(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        exited: ["failing-config"].into_iter().collect(),
        ..Script::default()
    });
    cluster.start().expect("start");
    assert!(!cluster.is_running());
}

#[rstest]
fn shutdown_is_idempotent(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    cluster.shutdown();
    cluster.shutdown();
    drop(cluster);

    let journal = harness.journal();
    assert_eq!(journal.count("down"), 1);
    let down = journal.last("down").expect("down issued");
    assert_eq!(trailing_after(down, "down"), ["--volumes", "--remove-orphans"]);
}

#[rstest]
fn shutdown_failure_is_swallowed(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        fail_down: true,
        ..healthy()
    });
    cluster.start().expect("start");
    cluster.shutdown();
    assert!(
        cluster
            .services()
            .all(|handle| handle.state() == ServiceState::Removed)
    );
}

#[rstest]
fn dropping_a_started_cluster_tears_it_down(harness: Harness) {
    {
        let mut cluster = harness.cluster(healthy());
        cluster.start().expect("start");
    }
    assert_eq!(harness.journal().count("down"), 1);
}

#[rstest]
fn dropping_an_unstarted_cluster_does_nothing(harness: Harness) {
    drop(harness.cluster(healthy()));
    assert!(harness.journal().calls.is_empty());
}

#[rstest]
fn host_directories_live_exactly_as_long_as_the_group(harness: Harness) {
    let scratch = TempDir::new().expect("temp dir");
    let root = scratch.path().join("kafka-config-kitchen-sink-test");
    let data = root.join("data");
    let definition = harness
        .definition()
        .with_host_directory(HostDirectory::new(&data).removing(&root));

    let mut cluster = harness.cluster_for(definition, healthy());
    assert!(!data.exists(), "created lazily on start");
    cluster.start().expect("start");
    assert!(data.is_dir());
    cluster.shutdown();
    assert!(!root.exists(), "removed on shutdown");
}

#[rstest]
fn wait_until_ready_retries_failed_probes(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        probe_failures: 2,
        ..healthy()
    });
    cluster.start().expect("start");
    let probe = ContainerCommand::shell("cub zk-ready localhost:2181 10 10 2 && echo PASS || echo FAIL");
    let attempts = cluster
        .wait_until_ready("zookeeper", &probe, &ReadinessPoller::new(5, Duration::ZERO))
        .expect("ready");
    assert_eq!(attempts, 3);
}

#[rstest]
fn wait_until_ready_times_out(harness: Harness) {
    let mut cluster = harness.cluster(Script {
        probe_failures: u32::MAX,
        ..healthy()
    });
    cluster.start().expect("start");
    let probe = ContainerCommand::shell("cub kafka-ready 1 10 && echo PASS || echo FAIL");
    let err = cluster
        .wait_until_ready("default-config", &probe, &ReadinessPoller::new(2, Duration::ZERO))
        .expect_err("never ready");
    assert!(
        matches!(err, HarnessError::ReadinessTimeout { attempts: 2, .. }),
        "got {err}"
    );
}

#[rstest]
fn wait_until_ready_on_exited_service_fails_fast(harness: Harness) {
    let mut cluster = harness.cluster(healthy());
    cluster.start().expect("start");
    let probe = ContainerCommand::shell("echo PASS");
    let err = cluster
        .wait_until_ready("failing-config", &probe, &ReadinessPoller::new(5, Duration::ZERO))
        .expect_err("not running");
    assert!(matches!(err, HarnessError::ServiceNotRunning { .. }), "got {err}");
    assert_eq!(harness.journal().probes, 0);
}
