//! Unit tests for run supervision.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use phasor_config::{Config, SettingLocation};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::errors::RunRequestError;
use crate::resolver::Probe;
use crate::sink::{MemorySink, SinkEntry};
use crate::tests::support::{
    RecordingLookup, RecordingNotifier, SHELL, script_invocation, shell_config,
};

struct Harness {
    dir: TempDir,
    sink: Arc<MemorySink>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn supervisor(&self) -> RunSupervisor<RecordingLookup> {
        self.supervisor_with(Probe::Found)
    }

    fn supervisor_with(&self, answer: Probe) -> RunSupervisor<RecordingLookup> {
        RunSupervisor::new(
            Resolver::new(RecordingLookup::answering(answer)),
            self.sink.clone(),
            self.notifier.clone(),
        )
    }

    fn shell(&self, script: &str) -> RunInvocation {
        script_invocation(SHELL, script, self.dir.path())
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        dir: TempDir::new().expect("temp dir"),
        sink: Arc::new(MemorySink::new()),
        notifier: Arc::new(RecordingNotifier::default()),
    }
}

fn header(invocation: &RunInvocation) -> Vec<String> {
    vec![
        String::from("Running: main.phs"),
        format!("Command: {}", invocation.command_line().display()),
        String::from(SEPARATOR),
    ]
}

fn expected_lines(invocation: &RunInvocation, tail: &[&str]) -> Vec<String> {
    let mut lines = header(invocation);
    lines.extend(tail.iter().map(|line| (*line).to_owned()));
    lines
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn successful_runs_report_output_then_the_success_marker(harness: Harness) {
    let invocation = script_invocation("sh", "echo hello", harness.dir.path());
    let supervisor = harness.supervisor();

    let outcome = supervisor.run(&invocation).await.expect("sh resolves");

    assert!(outcome.is_success());
    assert_eq!(
        harness.sink.lines(),
        expected_lines(&invocation, &["hello", SEPARATOR, SUCCESS_MARKER])
    );
    assert_eq!(
        harness.sink.entries().first(),
        Some(&SinkEntry::Cleared),
        "the sink is cleared before the header"
    );
    assert!(harness
        .sink
        .entries()
        .contains(&SinkEntry::Shown { bring_to_front: false }));
    assert!(harness.notifier.is_silent());
    assert_eq!(
        supervisor.resolver.lookup().calls(),
        vec![(HostPlatform::current(), String::from("sh"))]
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn failing_runs_report_stderr_and_the_exit_code(harness: Harness) {
    let invocation = harness.shell("echo 'parse error' >&2; exit 2");

    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("shell path resolves");

    assert!(matches!(outcome, RunOutcome::FailedWithExitCode { code: 2, .. }));
    assert_eq!(
        harness.sink.lines(),
        expected_lines(
            &invocation,
            &[
                ERROR_OUTPUT_MARKER,
                "parse error",
                SEPARATOR,
                "Program exited with code: 2",
            ]
        )
    );
    assert_eq!(
        harness.notifier.errors(),
        vec![String::from(
            "Phasor execution failed: process exited with code 2"
        )]
    );
    assert!(harness.notifier.actions().is_empty());
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn stdout_precedes_stderr_when_both_are_written(harness: Harness) {
    let invocation = harness.shell("echo err >&2; echo out; exit 3");

    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("shell path resolves");

    assert_eq!(
        outcome.output(),
        Some(&CapturedOutput {
            stdout: String::from("out"),
            stderr: String::from("err"),
        })
    );
    assert_eq!(
        harness.sink.lines(),
        expected_lines(
            &invocation,
            &[
                "out",
                ERROR_OUTPUT_MARKER,
                "err",
                SEPARATOR,
                "Program exited with code: 3",
            ]
        )
    );
}

#[rstest]
#[tokio::test]
async fn missing_path_executables_never_touch_the_sink(harness: Harness) {
    let invocation = script_invocation("/no/such/phasor", "true", harness.dir.path());

    let error = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect_err("path does not exist");

    assert_eq!(
        error,
        ConfigurationError::not_found(ExecutableRole::Jit, ExecutableSpec::new("/no/such/phasor"))
    );
    assert!(harness.sink.is_untouched());
    assert!(harness.notifier.errors().is_empty());
    assert_eq!(
        harness.notifier.actions(),
        vec![(
            String::from(
                "Phasor JIT not found at \"/no/such/phasor\". Please configure jit_path in settings."
            ),
            NotificationAction::OpenSettings(SettingLocation::JIT_PATH),
        )]
    );
}

#[rstest]
#[case(Probe::Absent)]
#[case(Probe::LookupFailed { reason: String::from("which: not installed") })]
#[tokio::test]
async fn unresolved_bare_names_are_configuration_errors(harness: Harness, #[case] answer: Probe) {
    let invocation = script_invocation("phasor", "true", harness.dir.path());
    let supervisor = harness.supervisor_with(answer);

    let result = supervisor.run(&invocation).await;

    assert!(matches!(
        result,
        Err(ConfigurationError::ExecutableNotFound {
            role: ExecutableRole::Jit,
            ..
        })
    ));
    assert_eq!(supervisor.resolver.lookup().calls().len(), 1);
    assert!(harness.sink.is_untouched());
    assert_eq!(harness.notifier.actions().len(), 1);
}

#[cfg(unix)]
#[rstest]
#[case(true, false)]
#[case(false, true)]
#[tokio::test]
async fn clearing_follows_the_setting(
    harness: Harness,
    #[case] clear: bool,
    #[case] keeps_previous: bool,
) {
    harness.sink.append_line("previous run");
    let invocation = harness.shell("true");

    harness
        .supervisor()
        .clear_before_run(clear)
        .run(&invocation)
        .await
        .expect("shell path resolves");

    let lines = harness.sink.lines();
    assert_eq!(lines.first() == Some(&String::from("previous run")), keeps_previous);
    assert_eq!(lines.last(), Some(&String::from(SUCCESS_MARKER)));
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn unlaunchable_files_report_a_launch_failure(harness: Harness) {
    let fake = harness.dir.path().join("phasor");
    std::fs::write(&fake, "not a program").expect("write fake executable");
    let invocation = RunInvocation::new(
        ExecutableSpec::new(fake.to_string_lossy()),
        Vec::new(),
        harness.dir.path().join("main.phs"),
        harness.dir.path().to_path_buf(),
    );

    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("file exists so it resolves");

    assert!(matches!(outcome, RunOutcome::LaunchFailed { .. }));
    let lines = harness.sink.lines();
    assert_eq!(lines.get(3), Some(&String::from(SEPARATOR)));
    assert!(
        lines
            .last()
            .is_some_and(|line| line.starts_with("Program failed to start: ")),
        "unexpected terminal line in {lines:?}"
    );
    let errors = harness.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.iter().all(|error| error.starts_with("Phasor execution failed: ")));
}

#[cfg(unix)]
#[rstest]
#[case("printf 'line\\n'", "line")]
#[case("printf 'line\\r\\n'", "line")]
#[case("printf 'first\\n\\n'", "first\n")]
#[case("printf 'bare'", "bare")]
#[tokio::test]
async fn one_trailing_line_break_is_trimmed(
    harness: Harness,
    #[case] script: &str,
    #[case] expected: &str,
) {
    let outcome = harness
        .supervisor()
        .run(&harness.shell(script))
        .await
        .expect("shell path resolves");

    assert_eq!(
        outcome.output().map(|output| output.stdout.as_str()),
        Some(expected)
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn runs_start_in_the_working_directory(harness: Harness) {
    let expected = harness.dir.path().canonicalize().expect("canonical dir");

    let outcome = harness
        .supervisor()
        .run(&harness.shell("pwd -P"))
        .await
        .expect("shell path resolves");

    assert_eq!(
        outcome.output().map(|output| PathBuf::from(&output.stdout)),
        Some(expected)
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn the_target_file_is_the_last_argument(harness: Harness) {
    let invocation = harness.shell("echo \"$1\"");

    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("shell path resolves");

    assert_eq!(
        outcome.output().map(|output| PathBuf::from(&output.stdout)),
        Some(harness.dir.path().join("main.phs"))
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn signalled_children_report_an_unknown_exit_code(harness: Harness) {
    let outcome = harness
        .supervisor()
        .run(&harness.shell("kill -9 $$"))
        .await
        .expect("shell path resolves");

    assert!(matches!(
        outcome,
        RunOutcome::FailedWithExitCode {
            code: UNKNOWN_EXIT_CODE,
            ..
        }
    ));
    assert_eq!(
        harness.sink.lines().last(),
        Some(&String::from("Program exited with code: -1"))
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn concurrent_runs_each_report_one_outcome(harness: Harness) {
    let supervisor = harness.supervisor().clear_before_run(false);
    let invocations: Vec<RunInvocation> = (1..=3)
        .map(|index| harness.shell(&format!("echo run-{index}")))
        .collect();

    let outcomes =
        futures::future::join_all(invocations.iter().map(|invocation| supervisor.run(invocation)))
            .await;

    let stdout: Vec<String> = outcomes
        .into_iter()
        .map(|outcome| {
            outcome
                .expect("shell path resolves")
                .output()
                .map(|output| output.stdout.clone())
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(stdout, vec!["run-1", "run-2", "run-3"]);
    let markers = harness
        .sink
        .entries()
        .into_iter()
        .filter(|entry| *entry == SinkEntry::Line(String::from(SUCCESS_MARKER)))
        .count();
    assert_eq!(markers, 3);
    assert!(harness.notifier.is_silent());
}

#[rstest]
#[case("/work/main.phs", "/work")]
#[case("/work/nested/dir/lib.phs", "/work/nested/dir")]
fn invocations_run_in_the_file_directory(#[case] file: &str, #[case] expected_dir: &str) {
    let config = Config {
        jit_args: vec![String::from("--opt")],
        ..Config::default()
    };

    let invocation = RunInvocation::for_file(&config, file).expect("phasor source");

    assert_eq!(invocation.executable().as_str(), "phasor");
    assert_eq!(invocation.arguments(), ["--opt"]);
    assert_eq!(invocation.target_file(), Path::new(file));
    assert_eq!(invocation.working_directory(), Path::new(expected_dir));
}

#[rstest]
#[case("main.phs")]
#[case("scripts/main.phs")]
fn relative_targets_are_anchored_to_the_current_directory(#[case] file: &str) {
    let cwd = std::env::current_dir().expect("current dir");

    let invocation = RunInvocation::for_file(&Config::default(), file).expect("phasor source");

    assert_eq!(invocation.target_file(), cwd.join(file));
    assert_eq!(
        Some(invocation.working_directory()),
        invocation.target_file().parent()
    );
}

/// Scratch directory under the current directory, reachable by relative path.
fn relative_workspace() -> TempDir {
    tempfile::Builder::new()
        .prefix("phasor-run-")
        .tempdir_in(".")
        .expect("workspace dir")
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn relative_targets_reach_the_child_as_existing_files(harness: Harness) {
    let workspace = relative_workspace();
    let scripts = workspace.path().join("scripts");
    std::fs::create_dir(&scripts).expect("scripts dir");
    let file = scripts.join("main.phs");
    std::fs::write(&file, "").expect("source file");
    assert!(file.is_relative());
    let config = shell_config("[ -f \"$1\" ] || { echo \"missing $1 in $(pwd)\"; exit 3; }; echo found");

    let invocation = RunInvocation::for_file(&config, &file).expect("phasor source");
    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("shell resolves");

    assert!(outcome.is_success(), "{:?}", harness.sink.lines());
    assert!(harness.sink.lines().iter().any(|line| line == "found"));
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn relative_executables_resolve_and_spawn_the_same_file(harness: Harness) {
    use std::os::unix::fs::PermissionsExt;

    let workspace = relative_workspace();
    let bin = workspace.path().join("bin");
    std::fs::create_dir(&bin).expect("bin dir");
    let jit = bin.join("jit");
    std::fs::write(&jit, "#!/bin/sh\necho \"ran $1\"\n").expect("jit script");
    std::fs::set_permissions(&jit, std::fs::Permissions::from_mode(0o755))
        .expect("executable bit");
    let source = harness.dir.path().join("main.phs");
    std::fs::write(&source, "").expect("source file");
    let config = Config {
        jit_path: jit.to_str().expect("utf8 path").to_owned(),
        ..Config::default()
    };

    let invocation = RunInvocation::for_file(&config, &source).expect("phasor source");
    let outcome = harness
        .supervisor()
        .run(&invocation)
        .await
        .expect("jit resolves");

    assert!(invocation.executable().as_path().is_absolute());
    assert!(outcome.is_success(), "{:?}", harness.sink.lines());
    let expected = format!("ran {}", source.display());
    assert!(harness.sink.lines().contains(&expected));
}

#[rstest]
#[case("/work/notes.txt")]
#[case("/work/main")]
#[case("/work/main.phs.bak")]
fn invocations_require_phasor_sources(#[case] file: &str) {
    let result = RunInvocation::for_file(&Config::default(), file);

    assert_eq!(
        result,
        Err(RunRequestError::NotPhasorSource {
            path: PathBuf::from(file)
        })
    );
}

#[rstest]
fn outcome_lines_describe_each_terminal_state() {
    let failed = RunOutcome::FailedWithExitCode {
        code: 7,
        output: CapturedOutput::default(),
    };
    let unlaunched = RunOutcome::LaunchFailed {
        reason: String::from("denied"),
    };

    assert_eq!(failed.terminal_line(), "Program exited with code: 7");
    assert_eq!(unlaunched.terminal_line(), "Program failed to start: denied");
    assert_eq!(
        unlaunched.failure_message().as_deref(),
        Some("Phasor execution failed: denied")
    );
    assert_eq!(
        RunOutcome::Succeeded {
            output: CapturedOutput::default()
        }
        .failure_message(),
        None
    );
}
