use super::{resolve_settings_path, ConfigError, Settings, AGENT_BINARY_ENV};
use std::path::Path;

/// Reads, env-adjusts and validates the settings file.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = resolve_settings_path(explicit);
    let mut settings = Settings::from_path(&path)?;
    if let Some(binary) = std::env::var_os(AGENT_BINARY_ENV) {
        if !binary.is_empty() {
            settings.agent.binary = binary.to_string_lossy().into_owned();
        }
    }
    settings.validate()?;
    Ok(settings)
}
