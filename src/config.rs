pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::load_settings;
pub use paths::{
    resolve_settings_path, AGENT_BINARY_ENV, CONFIG_PATH_ENV, DEFAULT_SETTINGS_FILE_NAME,
};
pub use settings::{AgentSettings, Settings, TaskConfig};
