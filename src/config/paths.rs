use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE_NAME: &str = "adw.yaml";
pub const CONFIG_PATH_ENV: &str = "ADW_CONFIG";
pub const AGENT_BINARY_ENV: &str = "CLAUDE_CODE_PATH";

/// `--config` wins, then `ADW_CONFIG`, then `./adw.yaml`.
pub fn resolve_settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_SETTINGS_FILE_NAME),
    }
}
