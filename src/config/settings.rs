use super::ConfigError;
use crate::provider::model_map::validate_model;
use crate::shared::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Project root; run records and logs live under `<state_root>/agents`.
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
    #[serde(default)]
    pub agent: AgentSettings,
    /// Tasks finished outside this tool that still count for gating.
    #[serde(default)]
    pub completed_tasks: Vec<TaskId>,
    #[serde(default)]
    pub phases: BTreeMap<u32, String>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_binary")]
    pub binary: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_terminate_grace_secs")]
    pub terminate_grace_secs: u64,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub command_models: BTreeMap<String, String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: default_agent_binary(),
            timeout_secs: default_timeout_secs(),
            terminate_grace_secs: default_terminate_grace_secs(),
            default_model: default_model(),
            command_models: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    pub id: TaskId,
    pub name: String,
    pub plan_file: PathBuf,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub validation_commands: Vec<String>,
}

fn default_state_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_agent_binary() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_terminate_grace_secs() -> u64 {
    5
}

fn default_model() -> String {
    "sonnet".to_string()
}

impl Settings {
    /// Parses the file; a relative `state_root` is resolved against the
    /// directory holding the file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if settings.state_root.is_relative() {
            let base = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            settings.state_root = base.join(&settings.state_root);
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.binary.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`agent.binary` must be non-empty".to_string(),
            ));
        }
        if self.agent.timeout_secs == 0 {
            return Err(ConfigError::Settings(
                "`agent.timeout_secs` must be greater than zero".to_string(),
            ));
        }
        validate_model(&self.agent.default_model)
            .map_err(|err| ConfigError::Settings(err.to_string()))?;
        for (command, model) in &self.agent.command_models {
            if !command.starts_with('/') {
                return Err(ConfigError::Settings(format!(
                    "command model key `{command}` must start with `/`"
                )));
            }
            validate_model(model).map_err(|err| ConfigError::Settings(err.to_string()))?;
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.clone()) {
                return Err(ConfigError::Task {
                    task_id: task.id.to_string(),
                    reason: "declared more than once".to_string(),
                });
            }
            if task.name.trim().is_empty() {
                return Err(ConfigError::Task {
                    task_id: task.id.to_string(),
                    reason: "`name` must be non-empty".to_string(),
                });
            }
            if task.depends_on.contains(&task.id) {
                return Err(ConfigError::Task {
                    task_id: task.id.to_string(),
                    reason: "task depends on itself".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn phase_name(&self, phase: u32) -> &str {
        self.phases
            .get(&phase)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}
