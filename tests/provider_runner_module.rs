use adw::provider::runner::{binary_reachable, run_agent_process};
use adw::provider::{InvocationSpec, ProviderError};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn path_env() -> BTreeMap<String, String> {
    std::env::var("PATH")
        .map(|path| BTreeMap::from([("PATH".to_string(), path)]))
        .unwrap_or_default()
}

fn spec(bin: &Path) -> InvocationSpec {
    InvocationSpec {
        binary: bin.display().to_string(),
        args: vec!["-p".to_string(), "/implement plan.md".to_string()],
    }
}

#[test]
fn runner_module_streams_stdout_into_the_sink() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("agent");
    write_script(&bin, "#!/bin/sh\necho \"$2\"\necho 'warn' 1>&2\n");
    let sink = dir.path().join("out/raw_output.jsonl");

    let outcome = run_agent_process(
        &spec(&bin),
        &path_env(),
        dir.path(),
        &sink,
        Duration::from_secs(5),
        Duration::from_millis(200),
    )
    .expect("run");

    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stderr.trim(), "warn");
    assert_eq!(fs::read_to_string(&sink).expect("sink").trim(), "/implement plan.md");
}

#[test]
fn runner_module_runs_with_a_reduced_environment() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("agent");
    write_script(&bin, "#!/bin/sh\necho \"${ADW_TEST_SECRET:-unset} ${KEPT:-missing}\"\n");
    let sink = dir.path().join("raw_output.jsonl");
    let mut env = path_env();
    env.insert("KEPT".to_string(), "kept".to_string());

    std::env::set_var("ADW_TEST_SECRET", "leaked");
    let outcome = run_agent_process(
        &spec(&bin),
        &env,
        dir.path(),
        &sink,
        Duration::from_secs(5),
        Duration::from_millis(200),
    )
    .expect("run");

    assert!(outcome.success);
    assert_eq!(fs::read_to_string(&sink).expect("sink").trim(), "unset kept");
}

#[test]
fn runner_module_kills_agents_that_ignore_sigterm() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("stubborn");
    write_script(
        &bin,
        "#!/bin/sh\ntrap '' TERM\nwhile true; do sleep 0.1; done\n",
    );
    let sink = dir.path().join("raw_output.jsonl");

    let started = Instant::now();
    let err = run_agent_process(
        &spec(&bin),
        &path_env(),
        dir.path(),
        &sink,
        Duration::from_secs(1),
        Duration::from_millis(300),
    )
    .expect_err("timeout");

    assert!(matches!(err, ProviderError::Timeout { timeout_ms: 1000 }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn runner_module_reports_sub_second_timeouts_in_millis() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("sleepy");
    write_script(&bin, "#!/bin/sh\nexec sleep 30\n");
    let sink = dir.path().join("raw_output.jsonl");

    let err = run_agent_process(
        &spec(&bin),
        &path_env(),
        dir.path(),
        &sink,
        Duration::from_millis(300),
        Duration::from_millis(200),
    )
    .expect_err("timeout");

    assert!(matches!(err, ProviderError::Timeout { timeout_ms: 300 }));
    assert_eq!(err.to_string(), "agent command timed out after 300ms");
}

#[test]
fn runner_module_detects_unreachable_binaries() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("versioned");
    write_script(&bin, "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\nexit 1\n");
    assert!(binary_reachable(&bin.display().to_string(), &path_env()));
    assert!(!binary_reachable(
        &dir.path().join("missing").display().to_string(),
        &path_env()
    ));

    let err = run_agent_process(
        &spec(&dir.path().join("missing")),
        &path_env(),
        dir.path(),
        &dir.path().join("raw_output.jsonl"),
        Duration::from_secs(1),
        Duration::from_millis(100),
    )
    .expect_err("missing");
    assert!(matches!(err, ProviderError::MissingBinary { .. }));
}
