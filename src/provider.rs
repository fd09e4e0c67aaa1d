use crate::shared::{AgentName, RunId, RunLogger};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod gateway;
pub mod invocation;
pub mod model_map;
pub mod output_parse;
pub mod prompt_files;
pub mod runner;

pub use gateway::ClaudeGateway;
pub use invocation::{build_invocation, safe_subprocess_env};
pub use model_map::{model_for_command, validate_model};
pub use output_parse::{parse_stream_events, response_from_stream, terminal_result_event};
pub use prompt_files::{save_prompt, slash_command_name};
pub use runner::{run_agent_process, ProcessOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported model `{0}`")]
    UnsupportedModel(String),
    #[error("agent CLI is not installed. Expected at: {binary}")]
    MissingBinary { binary: String },
    #[error("agent process failed with exit code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },
    #[error("agent command timed out after {}", describe_timeout(*.timeout_ms))]
    Timeout { timeout_ms: u64 },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One call into the external agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub directive: String,
    pub run_id: RunId,
    pub agent_name: AgentName,
    pub model: String,
    pub skip_permissions: bool,
    /// Sink for the raw line-delimited event stream.
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub output: String,
    pub success: bool,
    /// Correlation token reported by the agent, if any.
    pub session_id: Option<String>,
}

impl AgentResponse {
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            session_id: None,
        }
    }
}

impl From<ProviderError> for AgentResponse {
    fn from(err: ProviderError) -> Self {
        Self::failure(format!("Error: {err}"))
    }
}

/// Seam between the run controller and whatever actually runs the agent.
pub trait AgentInvoker {
    fn invoke(&self, request: &AgentRequest, logger: &RunLogger) -> AgentResponse;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub binary: String,
    pub state_root: PathBuf,
    pub timeout: Duration,
    pub terminate_grace: Duration,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub binary: String,
    pub args: Vec<String>,
}

impl InvocationSpec {
    pub fn command_form(&self) -> String {
        format!("{} {}", self.binary, self.args.join(" "))
    }
}

/// `agents/<run_id>/<agent_name>`
pub fn agent_dir(state_root: &Path, run_id: &RunId, agent_name: &AgentName) -> PathBuf {
    state_root
        .join("agents")
        .join(run_id.as_str())
        .join(agent_name.as_str())
}

fn describe_timeout(timeout_ms: u64) -> String {
    if timeout_ms % 1000 == 0 {
        format!("{} seconds", timeout_ms / 1000)
    } else {
        format!("{timeout_ms}ms")
    }
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> ProviderError {
    ProviderError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_become_failed_responses_without_token() {
        let response = AgentResponse::from(ProviderError::Timeout {
            timeout_ms: 300_000,
        });
        assert!(!response.success);
        assert!(response.session_id.is_none());
        assert_eq!(
            response.output,
            "Error: agent command timed out after 300 seconds"
        );

        let short = ProviderError::Timeout { timeout_ms: 250 };
        assert_eq!(short.to_string(), "agent command timed out after 250ms");
    }

    #[test]
    fn agent_dir_is_keyed_by_run_and_role() {
        let run_id = RunId::parse("run-1").expect("run id");
        let agent = AgentName::parse("implementor").expect("agent");
        assert_eq!(
            agent_dir(Path::new("/tmp/root"), &run_id, &agent),
            PathBuf::from("/tmp/root/agents/run-1/implementor")
        );
    }
}
