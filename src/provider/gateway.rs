use crate::provider::output_parse::{parse_stream_events, response_from_stream};
use crate::provider::runner::{binary_reachable, run_agent_process};
use crate::provider::{
    build_invocation, io_error, save_prompt, AgentInvoker, AgentRequest, AgentResponse,
    GatewayConfig, ProviderError,
};
use crate::shared::fs_atomic::atomic_write_json;
use crate::shared::RunLogger;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Gateway to the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeGateway {
    config: GatewayConfig,
}

impl ClaudeGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn run(&self, request: &AgentRequest, logger: &RunLogger) -> Result<AgentResponse, ProviderError> {
        if !binary_reachable(&self.config.binary, &self.config.env) {
            return Err(ProviderError::MissingBinary {
                binary: self.config.binary.clone(),
            });
        }

        match save_prompt(
            &self.config.state_root,
            &request.run_id,
            &request.agent_name,
            &request.directive,
        ) {
            Ok(Some(path)) => logger.debug(
                "agent.prompt_saved",
                &format!("saved prompt to {}", path.display()),
            ),
            Ok(None) => {}
            Err(err) => logger.warn("agent.prompt_save_failed", &err.to_string()),
        }

        let spec = build_invocation(request, &self.config.binary);
        logger.debug("agent.invoke", &spec.command_form());
        let outcome = run_agent_process(
            &spec,
            &self.config.env,
            &self.config.state_root,
            &request.output_file,
            self.config.timeout,
            self.config.terminate_grace,
        )?;

        let raw = fs::read_to_string(&request.output_file)
            .map_err(|err| io_error(&request.output_file, err));
        if let Ok(raw) = raw.as_ref() {
            let events = parse_stream_events(raw);
            match write_event_array(&request.output_file, &events) {
                Ok(path) => logger.debug(
                    "agent.events_saved",
                    &format!("created json file {}", path.display()),
                ),
                Err(err) => logger.warn("agent.events_save_failed", &err.to_string()),
            }
        }

        if !outcome.success {
            return Err(ProviderError::NonZeroExit {
                exit_code: outcome.exit_code.unwrap_or(-1),
                stderr: outcome.stderr.trim().to_string(),
            });
        }
        logger.info(
            "agent.output_saved",
            &format!("output saved to {}", request.output_file.display()),
        );
        let raw = raw?;
        Ok(response_from_stream(&raw))
    }
}

impl AgentInvoker for ClaudeGateway {
    fn invoke(&self, request: &AgentRequest, logger: &RunLogger) -> AgentResponse {
        match self.run(request, logger) {
            Ok(response) => response,
            Err(err) => {
                logger.error("agent.failed", &err.to_string());
                AgentResponse::from(err)
            }
        }
    }
}

/// `raw_output.jsonl` -> `raw_output.json`, holding the events as one array.
pub fn event_array_path(output_file: &Path) -> PathBuf {
    output_file.with_extension("json")
}

fn write_event_array(output_file: &Path, events: &[Value]) -> Result<PathBuf, ProviderError> {
    let path = event_array_path(output_file);
    atomic_write_json(&path, &events).map_err(|err| io_error(&path, err))?;
    Ok(path)
}
