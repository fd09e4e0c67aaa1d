use crate::provider::ProviderError;
use std::collections::BTreeMap;

const KNOWN_ALIASES: [&str; 3] = ["sonnet", "opus", "haiku"];

/// Built-in slash command to model routing; heavier commands get `opus`.
const COMMAND_MODELS: [(&str, &str); 6] = [
    ("/implement", "opus"),
    ("/validate", "sonnet"),
    ("/commit", "sonnet"),
    ("/pull_request", "sonnet"),
    ("/bug", "opus"),
    ("/feature", "opus"),
];

pub fn validate_model(model: &str) -> Result<(), ProviderError> {
    let model = model.trim();
    if KNOWN_ALIASES.contains(&model) || model.starts_with("claude-") {
        return Ok(());
    }
    Err(ProviderError::UnsupportedModel(model.to_string()))
}

/// Configured overrides first, then the built-in table, then `default`.
pub fn model_for_command(
    command: &str,
    overrides: &BTreeMap<String, String>,
    default: &str,
) -> String {
    if let Some(model) = overrides.get(command) {
        return model.clone();
    }
    COMMAND_MODELS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, model)| (*model).to_string())
        .unwrap_or_else(|| default.to_string())
}
