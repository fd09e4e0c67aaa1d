pub mod controller;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod run_store;
pub mod validation;

pub use controller::{
    BatchPolicy, BatchReport, DryRunPlan, RunController, TaskOutcome, TaskRunOptions,
};
pub use error::{OrchestratorError, ResolveError, StateError};
pub use registry::{TaskDescriptor, TaskRegistry};
pub use run_store::{
    StateUpdate, TaskStatus, ValidationResult, WorkflowRunState, WorkflowStateStore,
};
