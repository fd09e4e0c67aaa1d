pub mod fs_atomic;
pub mod ids;
pub mod logging;

pub use ids::{AgentName, RunId, TaskId};
pub use logging::{LogLevel, RunLogger};
