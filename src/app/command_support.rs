use crate::config::{self, ConfigError, Settings};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::registry::TaskRegistry;
use crate::orchestration::run_store::WorkflowStateStore;
use crate::provider::{safe_subprocess_env, ClaudeGateway, GatewayConfig};
use crate::shared::{RunLogger, TaskId};
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;

/// Everything a command needs to drive runs for one settings file.
pub struct CommandContext {
    pub settings: Settings,
    pub registry: TaskRegistry,
    pub store: WorkflowStateStore,
    pub gateway: ClaudeGateway,
}

impl CommandContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self, String> {
        let settings = load_settings(config_path)?;
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Settings) -> Self {
        let registry = TaskRegistry::from_settings(&settings);
        let store = WorkflowStateStore::new(settings.state_root.clone());
        let gateway = build_gateway(&settings);
        Self {
            settings,
            registry,
            store,
            gateway,
        }
    }
}

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn map_orchestrator_err(err: OrchestratorError) -> String {
    err.to_string()
}

pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, String> {
    config::load_settings(config_path).map_err(map_config_err)
}

pub fn build_gateway(settings: &Settings) -> ClaudeGateway {
    ClaudeGateway::new(GatewayConfig {
        binary: settings.agent.binary.clone(),
        state_root: settings.state_root.clone(),
        timeout: Duration::from_secs(settings.agent.timeout_secs),
        terminate_grace: Duration::from_secs(settings.agent.terminate_grace_secs),
        env: safe_subprocess_env(),
    })
}

pub fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse(raw)
}

pub fn console_logger(quiet: bool) -> RunLogger {
    RunLogger::detached(!quiet)
}

pub fn execution_log_hint(log_id: &str, trigger: &str) -> String {
    format!("agents/{log_id}/{trigger}/execution.log")
}

/// Prints `prompt` and reads one answer from stdin; only `y`/`yes` confirm.
pub fn prompt_confirmation(prompt: &str) -> Result<bool, String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}").map_err(|e| format!("failed to write prompt: {e}"))?;
    stdout
        .flush()
        .map_err(|e| format!("failed to write prompt: {e}"))?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| format!("failed to read confirmation: {e}"))?;
    Ok(is_confirmation(&answer))
}

pub fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
