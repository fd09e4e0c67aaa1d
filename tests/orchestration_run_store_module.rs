use adw::orchestration::run_store::{StateUpdate, TaskStatus, WorkflowStateStore};
use adw::shared::{RunId, RunLogger, TaskId};
use chrono::{TimeZone, Utc};
use std::fs::{self, File};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn run_id(raw: &str) -> RunId {
    RunId::parse(raw).expect("run id")
}

fn task_id(raw: &str) -> TaskId {
    TaskId::parse(raw).expect("task id")
}

fn set_mtime(path: &std::path::Path, age_secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)))
        .expect("set mtime");
}

#[test]
fn run_store_module_round_trips_every_field() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path());
    let logger = RunLogger::disabled();

    let mut state = store.create(run_id("run-1"));
    assert_eq!(state.status, TaskStatus::Pending);
    assert!(state.dependencies_met);

    state.update(StateUpdate {
        task_id: Some(task_id("2.6")),
        task_name: Some("search_api".to_string()),
        phase: Some(2),
        plan_file: Some(PathBuf::from("docs/implementation/02_06_search_api.md")),
        current_step: Some(1),
        total_steps: Some(4),
        issue_number: Some(17),
        dependencies: Some(vec![task_id("2.5"), task_id("1.4")]),
        dependencies_met: Some(true),
        error_message: None,
        resumed_from: Some(run_id("run-0")),
    });
    let started = Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts");
    state
        .set_status(TaskStatus::InProgress, started)
        .expect("start");
    state
        .set_status(TaskStatus::Failed, started + chrono::Duration::seconds(30))
        .expect("fail");
    state.append_validation_result("npm test", false, None, Some("1 failing".to_string()));

    let path = store.save(&state, &logger).expect("save");
    assert_eq!(path, temp.path().join("agents/run-1/adw_state.json"));

    let loaded = store
        .load_by_run_id(&run_id("run-1"), &logger)
        .expect("load")
        .expect("present");
    assert_eq!(loaded, state);

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(raw["status"], "failed");
    assert_eq!(raw["task_id"], "02_06");
}

#[test]
fn run_store_module_reports_missing_and_corrupt_records_as_absent() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path());
    let logger = RunLogger::disabled();

    assert!(store
        .load_by_run_id(&run_id("run-missing"), &logger)
        .expect("load")
        .is_none());

    let corrupt = store.state_path(&run_id("run-bad"));
    fs::create_dir_all(corrupt.parent().expect("parent")).expect("mkdir");
    fs::write(&corrupt, "{ not json").expect("write");
    assert!(store
        .load_by_run_id(&run_id("run-bad"), &logger)
        .expect("load")
        .is_none());
}

#[test]
fn run_store_module_treats_non_utf8_record_as_absent() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path());
    let logger = RunLogger::open(temp.path(), "run-load", "run_task", false);

    let torn = store.state_path(&run_id("run-torn"));
    fs::create_dir_all(torn.parent().expect("parent")).expect("mkdir");
    fs::write(&torn, [b'{', 0xff, 0xfe, b'"']).expect("write");

    assert!(store
        .load_by_run_id(&run_id("run-torn"), &logger)
        .expect("load")
        .is_none());
    assert!(store
        .load_by_task_id(&task_id("1.1"), &logger)
        .expect("scan")
        .is_none());
    let log = fs::read_to_string(logger.path().expect("path")).expect("log");
    assert_eq!(log.matches("\"event\":\"state.corrupt\"").count(), 2);
}

#[test]
fn run_store_module_loads_latest_modified_record_for_task() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path());
    let logger = RunLogger::disabled();

    for (raw_run, age) in [("run-b", 300), ("run-a", 10), ("run-c", 120)] {
        let mut state = store.create(run_id(raw_run));
        state.update(StateUpdate {
            task_id: Some(task_id("1.1")),
            ..StateUpdate::default()
        });
        let path = store.save(&state, &logger).expect("save");
        set_mtime(&path, age);
    }
    let mut other = store.create(run_id("run-z"));
    other.update(StateUpdate {
        task_id: Some(task_id("1.2")),
        ..StateUpdate::default()
    });
    store.save(&other, &logger).expect("save other");

    let corrupt = store.state_path(&run_id("run-broken"));
    fs::create_dir_all(corrupt.parent().expect("parent")).expect("mkdir");
    fs::write(&corrupt, "[]").expect("write");

    let latest = store
        .load_by_task_id(&task_id("01_01"), &logger)
        .expect("scan")
        .expect("record");
    assert_eq!(latest.run_id.as_str(), "run-a");

    let by_task = store.latest_by_task(&logger).expect("latest by task");
    assert_eq!(by_task.len(), 2);
    assert_eq!(by_task[&task_id("1.1")].run_id.as_str(), "run-a");
    assert_eq!(by_task[&task_id("1.2")].run_id.as_str(), "run-z");

    assert!(store
        .load_by_task_id(&task_id("9.9"), &logger)
        .expect("scan")
        .is_none());
}

#[test]
fn run_store_module_scan_tolerates_missing_agents_dir() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path().join("nowhere"));
    let logger = RunLogger::disabled();
    assert!(store
        .load_by_task_id(&task_id("1.1"), &logger)
        .expect("scan")
        .is_none());
    assert!(store.latest_by_task(&logger).expect("scan").is_empty());
}

#[test]
fn run_store_module_warns_about_corrupt_records() {
    let temp = tempdir().expect("tempdir");
    let store = WorkflowStateStore::new(temp.path());
    let logger = RunLogger::open(temp.path(), "run-scan", "run_task", false);

    let corrupt = store.state_path(&run_id("run-broken"));
    fs::create_dir_all(corrupt.parent().expect("parent")).expect("mkdir");
    fs::write(&corrupt, "{").expect("write");

    assert!(store
        .load_by_task_id(&task_id("1.1"), &logger)
        .expect("scan")
        .is_none());
    let log = fs::read_to_string(logger.path().expect("path")).expect("log");
    assert!(log.contains("\"event\":\"state.corrupt\""));
}
