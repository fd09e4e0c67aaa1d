use crate::provider::{agent_dir, io_error, ProviderError};
use crate::shared::{AgentName, RunId};
use std::fs;
use std::path::{Path, PathBuf};

/// `/implement docs/x.md` -> `implement`.
pub fn slash_command_name(directive: &str) -> Option<&str> {
    let rest = directive.strip_prefix('/')?;
    let end = rest
        .char_indices()
        .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

/// Writes the directive to `agents/<run>/<agent>/prompts/<command>.txt`.
/// Directives that are not slash commands are not persisted.
pub fn save_prompt(
    state_root: &Path,
    run_id: &RunId,
    agent_name: &AgentName,
    directive: &str,
) -> Result<Option<PathBuf>, ProviderError> {
    let Some(command) = slash_command_name(directive) else {
        return Ok(None);
    };
    let prompt_dir = agent_dir(state_root, run_id, agent_name).join("prompts");
    fs::create_dir_all(&prompt_dir).map_err(|err| io_error(&prompt_dir, err))?;

    let prompt_file = prompt_dir.join(format!("{command}.txt"));
    fs::write(&prompt_file, directive).map_err(|err| io_error(&prompt_file, err))?;
    Ok(Some(prompt_file))
}
