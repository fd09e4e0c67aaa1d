use crate::orchestration::error::StateError;
use crate::shared::fs_atomic::atomic_write_json;
use crate::shared::{RunId, RunLogger, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const STATE_FILE_NAME: &str = "adw_state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Blocked
        )
    }

    /// Terminal states never reopen; a retry is a new run.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next
            || matches!(
                (self, next),
                (TaskStatus::Pending, TaskStatus::InProgress)
                    | (TaskStatus::Pending, TaskStatus::Blocked)
                    | (TaskStatus::Pending, TaskStatus::Failed)
                    | (TaskStatus::InProgress, TaskStatus::Completed)
                    | (TaskStatus::InProgress, TaskStatus::Failed)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub command: String,
    pub passed: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunState {
    pub run_id: RunId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub phase: Option<u32>,
    #[serde(default)]
    pub plan_file: Option<PathBuf>,
    pub status: TaskStatus,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub validation_results: Vec<ValidationResult>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default = "default_dependencies_met")]
    pub dependencies_met: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub resumed_from: Option<RunId>,
}

fn default_dependencies_met() -> bool {
    true
}

/// Partial update. Status and timestamps only move through
/// [`WorkflowRunState::set_status`]; validation results only through
/// [`WorkflowRunState::append_validation_result`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub task_id: Option<TaskId>,
    pub task_name: Option<String>,
    pub phase: Option<u32>,
    pub plan_file: Option<PathBuf>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub issue_number: Option<u64>,
    pub dependencies: Option<Vec<TaskId>>,
    pub dependencies_met: Option<bool>,
    pub error_message: Option<String>,
    pub resumed_from: Option<RunId>,
}

impl WorkflowRunState {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            task_id: None,
            task_name: None,
            phase: None,
            plan_file: None,
            status: TaskStatus::Pending,
            current_step: 0,
            total_steps: 0,
            started_at: None,
            completed_at: None,
            issue_number: None,
            validation_results: Vec::new(),
            dependencies: Vec::new(),
            dependencies_met: true,
            error_message: None,
            resumed_from: None,
        }
    }

    pub fn update(&mut self, changes: StateUpdate) {
        let StateUpdate {
            task_id,
            task_name,
            phase,
            plan_file,
            current_step,
            total_steps,
            issue_number,
            dependencies,
            dependencies_met,
            error_message,
            resumed_from,
        } = changes;

        if let Some(value) = task_id {
            self.task_id = Some(value);
        }
        if let Some(value) = task_name {
            self.task_name = Some(value);
        }
        if let Some(value) = phase {
            self.phase = Some(value);
        }
        if let Some(value) = plan_file {
            self.plan_file = Some(value);
        }
        if let Some(value) = current_step {
            self.current_step = value;
        }
        if let Some(value) = total_steps {
            self.total_steps = value;
        }
        if let Some(value) = issue_number {
            self.issue_number = Some(value);
        }
        if let Some(value) = dependencies {
            self.dependencies = value;
        }
        if let Some(value) = dependencies_met {
            self.dependencies_met = value;
        }
        if let Some(value) = error_message {
            self.error_message = Some(value);
        }
        if let Some(value) = resumed_from {
            self.resumed_from = Some(value);
        }
    }

    /// `started_at` is stamped on the first entry into `in_progress`,
    /// `completed_at` on the first entry into a terminal status.
    pub fn set_status(&mut self, next: TaskStatus, now: DateTime<Utc>) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn append_validation_result(
        &mut self,
        command: impl Into<String>,
        passed: bool,
        output: Option<String>,
        error: Option<String>,
    ) {
        self.validation_results.push(ValidationResult {
            command: command.into(),
            passed,
            output,
            error,
        });
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowStateStore {
    state_root: PathBuf,
}

impl WorkflowStateStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    pub fn create(&self, run_id: RunId) -> WorkflowRunState {
        WorkflowRunState::new(run_id)
    }

    pub fn state_path(&self, run_id: &RunId) -> PathBuf {
        self.agents_dir().join(run_id.as_str()).join(STATE_FILE_NAME)
    }

    fn agents_dir(&self) -> PathBuf {
        self.state_root.join("agents")
    }

    /// Whole-record overwrite keyed by run id.
    pub fn save(&self, state: &WorkflowRunState, logger: &RunLogger) -> Result<PathBuf, StateError> {
        let path = self.state_path(&state.run_id);
        atomic_write_json(&path, state).map_err(|source| io_error(&path, source))?;
        logger.debug(
            "state.saved",
            &format!("saved state ({}) to {}", state.status, path.display()),
        );
        Ok(path)
    }

    /// A corrupted record is reported as absent.
    pub fn load_by_run_id(
        &self,
        run_id: &RunId,
        logger: &RunLogger,
    ) -> Result<Option<WorkflowRunState>, StateError> {
        let path = self.state_path(run_id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        match serde_json::from_slice(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                logger.warn(
                    "state.corrupt",
                    &format!("ignoring unreadable state {}: {err}", path.display()),
                );
                Ok(None)
            }
        }
    }

    /// Most recently modified record for `task_id`.
    pub fn load_by_task_id(
        &self,
        task_id: &TaskId,
        logger: &RunLogger,
    ) -> Result<Option<WorkflowRunState>, StateError> {
        let found = self
            .scan(logger)?
            .into_iter()
            .filter(|(_, state)| state.task_id.as_ref() == Some(task_id))
            .max_by(|(a_time, a), (b_time, b)| a_time.cmp(b_time).then(a.run_id.cmp(&b.run_id)))
            .map(|(_, state)| state);
        if let Some(state) = found.as_ref() {
            logger.debug(
                "state.found",
                &format!("found existing state for task {task_id}: {}", state.run_id),
            );
        }
        Ok(found)
    }

    /// Current (latest) record per task id.
    pub fn latest_by_task(
        &self,
        logger: &RunLogger,
    ) -> Result<BTreeMap<TaskId, WorkflowRunState>, StateError> {
        let mut latest: BTreeMap<TaskId, (SystemTime, WorkflowRunState)> = BTreeMap::new();
        for (modified, state) in self.scan(logger)? {
            let Some(task_id) = state.task_id.clone() else {
                continue;
            };
            let replace = latest
                .get(&task_id)
                .map(|(current_time, current)| {
                    (modified, &state.run_id) > (*current_time, &current.run_id)
                })
                .unwrap_or(true);
            if replace {
                latest.insert(task_id, (modified, state));
            }
        }
        Ok(latest
            .into_iter()
            .map(|(task_id, (_, state))| (task_id, state))
            .collect())
    }

    fn scan(&self, logger: &RunLogger) -> Result<Vec<(SystemTime, WorkflowRunState)>, StateError> {
        let agents_dir = self.agents_dir();
        let entries = match fs::read_dir(&agents_dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&agents_dir, source)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&agents_dir, source))?;
            let path = entry.path().join(STATE_FILE_NAME);
            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(source) if source.kind() == ErrorKind::NotFound => continue,
                Err(source) => {
                    logger.warn(
                        "state.unreadable",
                        &format!("skipping {}: {source}", path.display()),
                    );
                    continue;
                }
            };
            let parsed = fs::read(&path)
                .map_err(|err| err.to_string())
                .and_then(|raw| {
                    serde_json::from_slice::<WorkflowRunState>(&raw).map_err(|err| err.to_string())
                });
            match parsed {
                Ok(state) => records.push((modified, state)),
                Err(reason) => logger.warn(
                    "state.corrupt",
                    &format!("skipping corrupted state {}: {reason}", path.display()),
                ),
            }
        }
        Ok(records)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("timestamp")
    }

    fn fresh() -> WorkflowRunState {
        WorkflowRunState::new(RunId::parse("run-1").expect("run id"))
    }

    #[test]
    fn started_at_is_stamped_once() {
        let mut state = fresh();
        state.set_status(TaskStatus::InProgress, at(10)).expect("start");
        state.set_status(TaskStatus::InProgress, at(20)).expect("re-enter");
        assert_eq!(state.started_at, Some(at(10)));
        assert!(state.completed_at.is_none());
    }

    #[test]
    fn completed_at_is_stamped_on_first_terminal_transition() {
        let mut state = fresh();
        state.set_status(TaskStatus::InProgress, at(10)).expect("start");
        state.set_status(TaskStatus::Completed, at(30)).expect("complete");
        state.set_status(TaskStatus::Completed, at(40)).expect("same status");
        assert_eq!(state.completed_at, Some(at(30)));
    }

    #[test]
    fn terminal_states_never_reopen() {
        let mut state = fresh();
        state.set_status(TaskStatus::Blocked, at(5)).expect("block");
        let err = state
            .set_status(TaskStatus::InProgress, at(6))
            .expect_err("reopen");
        assert!(matches!(
            err,
            StateError::InvalidStatusTransition {
                from: TaskStatus::Blocked,
                to: TaskStatus::InProgress
            }
        ));
        assert_eq!(state.completed_at, Some(at(5)));
        assert!(state.started_at.is_none());
    }

    #[test]
    fn update_only_touches_supplied_fields() {
        let mut state = fresh();
        state.update(StateUpdate {
            task_name: Some("ocr_extract".to_string()),
            total_steps: Some(5),
            ..StateUpdate::default()
        });
        state.update(StateUpdate {
            current_step: Some(2),
            ..StateUpdate::default()
        });
        assert_eq!(state.task_name.as_deref(), Some("ocr_extract"));
        assert_eq!(state.total_steps, 5);
        assert_eq!(state.current_step, 2);
        assert_eq!(state.status, TaskStatus::Pending);
    }

    #[test]
    fn validation_results_append_in_order() {
        let mut state = fresh();
        state.append_validation_result("npm test", true, Some("ok".to_string()), None);
        state.append_validation_result("npm run lint", false, None, Some("2 errors".to_string()));
        assert_eq!(state.validation_results.len(), 2);
        assert_eq!(state.validation_results[0].command, "npm test");
        assert!(!state.validation_results[1].passed);
    }

    #[test]
    fn status_serializes_snake_case() {
        let raw = serde_json::to_string(&TaskStatus::InProgress).expect("encode");
        assert_eq!(raw, "\"in_progress\"");
    }
}
