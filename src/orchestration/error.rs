use crate::orchestration::run_store::TaskStatus;
use crate::shared::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("task status transition `{from}` -> `{to}` is invalid")]
    InvalidStatusTransition { from: TaskStatus, to: TaskStatus },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unresolvable dependency cycle among tasks: {}", .tasks.join(", "))]
    Cycle { tasks: Vec<TaskId> },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("task `{task_id}` is not declared in the task registry")]
    UnknownTask { task_id: String },
    #[error("invalid identifier: {0}")]
    Identifier(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
