use adw::config::{load_settings, resolve_settings_path, ConfigError, Settings};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn config_settings_resolve_state_root_next_to_the_file() {
    let temp = tempdir().expect("tempdir");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("mkdir");
    let path = project.join("adw.yaml");
    fs::write(
        &path,
        r#"
state_root: workspace
tasks:
  - id: "1.1"
    name: database_schema
    plan_file: docs/implementation/01_01_database_schema.md
"#,
    )
    .expect("write settings");

    let settings = Settings::from_path(&path).expect("parse");
    assert_eq!(settings.state_root, project.join("workspace"));
    assert_eq!(settings.agents_dir(), project.join("workspace/agents"));
    assert_eq!(settings.agent.default_model, "sonnet");
    assert_eq!(settings.agent.timeout_secs, 300);
}

#[test]
fn config_settings_explicit_path_wins() {
    assert_eq!(
        resolve_settings_path(Some(Path::new("/etc/adw/custom.yaml"))),
        Path::new("/etc/adw/custom.yaml")
    );
}

#[test]
fn config_settings_report_read_and_parse_failures() {
    let temp = tempdir().expect("tempdir");
    let missing = temp.path().join("absent.yaml");
    assert!(matches!(
        load_settings(Some(&missing)),
        Err(ConfigError::Read { .. })
    ));

    let broken = temp.path().join("broken.yaml");
    fs::write(&broken, "tasks: [\n").expect("write");
    assert!(matches!(
        load_settings(Some(&broken)),
        Err(ConfigError::Parse { .. })
    ));

    let bad_id = temp.path().join("bad_id.yaml");
    fs::write(
        &bad_id,
        "tasks:\n  - { id: \"phase-one\", name: a, plan_file: a.md }\n",
    )
    .expect("write");
    let err = load_settings(Some(&bad_id)).expect_err("bad id");
    assert!(err.to_string().contains("bad_id.yaml"));
}

#[test]
fn config_settings_reject_self_dependencies_and_bad_command_keys() {
    let self_dep: Settings = serde_yaml::from_str(
        "tasks:\n  - { id: \"1.1\", name: a, plan_file: a.md, depends_on: [\"01_01\"] }\n",
    )
    .expect("parse");
    assert!(matches!(self_dep.validate(), Err(ConfigError::Task { .. })));

    let bad_key: Settings =
        serde_yaml::from_str("agent:\n  command_models:\n    implement: opus\n").expect("parse");
    assert!(matches!(bad_key.validate(), Err(ConfigError::Settings(_))));
}

#[test]
fn config_settings_example_file_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("adw.example.yaml");
    let settings = Settings::from_path(&path).expect("parse example");
    settings.validate().expect("valid example");
    assert_eq!(settings.tasks.len(), 3);
    assert_eq!(settings.phase_name(2), "Backend API (Edge Functions)");
    assert_eq!(settings.tasks[2].depends_on.len(), 2);
}
