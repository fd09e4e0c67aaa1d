use crate::config::Settings;
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::registry::{TaskDescriptor, TaskRegistry};
use crate::orchestration::resolver::{check_satisfied, order};
use crate::orchestration::run_store::{StateUpdate, TaskStatus, WorkflowRunState, WorkflowStateStore};
use crate::orchestration::validation::{run_validation_command, truncate_chars};
use crate::provider::{agent_dir, model_for_command, AgentInvoker, AgentRequest};
use crate::shared::{AgentName, RunId, RunLogger, TaskId};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const IMPLEMENTOR_AGENT: &str = "implementor";
pub const IMPLEMENT_COMMAND: &str = "/implement";
pub const RUN_TASK_TRIGGER: &str = "run_task";
pub const RAW_OUTPUT_FILE_NAME: &str = "raw_output.jsonl";
/// Cap on the failure text stored in a run record.
pub const ERROR_MESSAGE_LIMIT: usize = 1000;
const LOG_EXCERPT_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRunOptions {
    /// Start a new attempt for a task even if it already completed, carrying
    /// over the previous attempt's progress.
    pub resume: bool,
    pub skip_deps: bool,
    pub dry_run: bool,
    pub validate: bool,
    pub issue_number: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    #[default]
    StopOnFailure,
    ContinueOnFailure,
}

/// What a run would do, computed without invoking the agent or persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunPlan {
    pub task_id: TaskId,
    pub task_name: String,
    pub phase: u32,
    pub plan_file: PathBuf,
    pub dependencies: Vec<TaskId>,
    /// Dependencies that would block the run; empty when gating is skipped.
    pub missing: Vec<TaskId>,
    pub directive: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed {
        run_id: RunId,
        session_id: Option<String>,
    },
    Failed {
        run_id: RunId,
        error: String,
    },
    Blocked {
        run_id: RunId,
        missing: Vec<TaskId>,
    },
    AlreadyCompleted,
    DryRun(DryRunPlan),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            TaskOutcome::Failed { .. } | TaskOutcome::Blocked { .. }
        )
    }

    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            TaskOutcome::Completed { run_id, .. }
            | TaskOutcome::Failed { run_id, .. }
            | TaskOutcome::Blocked { run_id, .. } => Some(run_id),
            TaskOutcome::AlreadyCompleted | TaskOutcome::DryRun(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub order: Vec<TaskId>,
    /// One entry per task attempted, in execution order.
    pub results: Vec<(TaskId, TaskOutcome)>,
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TaskId> {
        self.results
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(task_id, _)| task_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&TaskId, &TaskOutcome)> {
        self.results
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(task_id, outcome)| (task_id, outcome))
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, outcome)| outcome.is_success())
    }
}

/// Drives task attempts through gating, invocation and persistence. Each
/// attempt gets its own run id and an execution log under `run_task`.
pub struct RunController<'a, G: AgentInvoker + ?Sized> {
    settings: &'a Settings,
    registry: &'a TaskRegistry,
    store: &'a WorkflowStateStore,
    gateway: &'a G,
}

impl<'a, G: AgentInvoker + ?Sized> RunController<'a, G> {
    pub fn new(
        settings: &'a Settings,
        registry: &'a TaskRegistry,
        store: &'a WorkflowStateStore,
        gateway: &'a G,
    ) -> Self {
        Self {
            settings,
            registry,
            store,
            gateway,
        }
    }

    /// Tasks listed as done in settings plus every task whose latest run
    /// record is `completed`.
    pub fn completed_tasks(&self, logger: &RunLogger) -> Result<BTreeSet<TaskId>, OrchestratorError> {
        let mut completed: BTreeSet<TaskId> = self.settings.completed_tasks.iter().cloned().collect();
        for (task_id, state) in self.store.latest_by_task(logger)? {
            if state.status == TaskStatus::Completed {
                completed.insert(task_id);
            }
        }
        Ok(completed)
    }

    pub fn run_task(
        &self,
        task_id: &TaskId,
        options: &TaskRunOptions,
        logger: &RunLogger,
    ) -> Result<TaskOutcome, OrchestratorError> {
        self.run_task_assuming(task_id, options, &BTreeSet::new(), logger)
    }

    /// Runs `tasks` in dependency order. Gating is re-checked against the
    /// live completed set before every task, so a task finished earlier in
    /// the batch unblocks its dependents.
    pub fn run_batch(
        &self,
        tasks: &BTreeSet<TaskId>,
        policy: BatchPolicy,
        options: &TaskRunOptions,
        logger: &RunLogger,
    ) -> Result<BatchReport, OrchestratorError> {
        if let Some(unknown) = tasks.iter().find(|task_id| !self.registry.contains(task_id)) {
            return Err(OrchestratorError::UnknownTask {
                task_id: unknown.to_string(),
            });
        }
        let ordered = order(tasks, &self.registry.dependency_map())?;
        logger.debug(
            "batch.order",
            &format!("execution order: {}", ordered.join(", ")),
        );

        let mut report = BatchReport {
            order: ordered.clone(),
            results: Vec::with_capacity(ordered.len()),
            stopped_early: false,
        };
        // Dry runs complete nothing, so earlier tasks count as done for the
        // ones after them.
        let mut planned = BTreeSet::new();

        for (index, task_id) in ordered.iter().enumerate() {
            logger.debug(
                "batch.task",
                &format!("running task {}/{}: {task_id}", index + 1, ordered.len()),
            );
            let outcome = self.run_task_assuming(task_id, options, &planned, logger)?;
            if options.dry_run {
                planned.insert(task_id.clone());
            }

            match &outcome {
                TaskOutcome::Failed { error, .. } => logger.error(
                    "batch.task_failed",
                    &format!(
                        "task {task_id} failed: {}",
                        truncate_chars(error, LOG_EXCERPT_LIMIT)
                    ),
                ),
                TaskOutcome::Blocked { missing, .. } => logger.warn(
                    "batch.task_blocked",
                    &format!(
                        "skipping {task_id}: dependencies not met: {}",
                        missing.join(", ")
                    ),
                ),
                _ => logger.debug("batch.task_done", &format!("task {task_id} finished")),
            }

            let failed = !outcome.is_success();
            report.results.push((task_id.clone(), outcome));
            if failed && policy == BatchPolicy::StopOnFailure {
                report.stopped_early = true;
                logger.warn(
                    "batch.stopped",
                    &format!("task {task_id} did not complete; stopping batch"),
                );
                break;
            }
        }
        Ok(report)
    }

    fn run_task_assuming(
        &self,
        task_id: &TaskId,
        options: &TaskRunOptions,
        assumed_completed: &BTreeSet<TaskId>,
        logger: &RunLogger,
    ) -> Result<TaskOutcome, OrchestratorError> {
        let task = self
            .registry
            .describe(task_id)
            .ok_or_else(|| OrchestratorError::UnknownTask {
                task_id: task_id.to_string(),
            })?;

        let mut completed = self.completed_tasks(logger)?;
        if completed.contains(task_id) && !options.resume {
            logger.info(
                "task.already_completed",
                &format!("task {task_id} is already completed"),
            );
            return Ok(TaskOutcome::AlreadyCompleted);
        }
        completed.extend(assumed_completed.iter().cloned());

        let missing = if options.skip_deps {
            Vec::new()
        } else {
            check_satisfied(self.registry, task_id, &completed).missing
        };

        if options.dry_run {
            return Ok(TaskOutcome::DryRun(self.plan(task, missing)));
        }

        let run_id = RunId::generate_under(self.store.state_root(), Utc::now().timestamp())
            .map_err(OrchestratorError::Identifier)?;
        let run_logger = RunLogger::open(
            self.store.state_root(),
            run_id.as_str(),
            RUN_TASK_TRIGGER,
            logger.console(),
        );
        logger.debug(
            "task.run_id",
            &format!("task {task_id} assigned run id {run_id}"),
        );

        let mut state = self.store.create(run_id.clone());
        state.update(StateUpdate {
            task_id: Some(task.id.clone()),
            task_name: Some(task.name.clone()),
            phase: Some(task.phase),
            plan_file: Some(task.plan_file.clone()),
            total_steps: Some(task.total_steps),
            issue_number: options.issue_number,
            dependencies: Some(task.depends_on.clone()),
            dependencies_met: Some(missing.is_empty()),
            ..StateUpdate::default()
        });

        if !missing.is_empty() {
            let joined = missing.join(", ");
            state.update(StateUpdate {
                error_message: Some(format!("dependencies not met: {joined}")),
                ..StateUpdate::default()
            });
            state.set_status(TaskStatus::Blocked, Utc::now())?;
            self.store.save(&state, &run_logger)?;
            run_logger.warn(
                "task.blocked",
                &format!("dependencies not met for task {task_id}: {joined}"),
            );
            return Ok(TaskOutcome::Blocked { run_id, missing });
        }

        if options.resume {
            self.inherit_prior_attempt(&mut state, task_id, &run_logger)?;
        }
        self.execute(task, state, options, &run_logger)
    }

    fn inherit_prior_attempt(
        &self,
        state: &mut WorkflowRunState,
        task_id: &TaskId,
        logger: &RunLogger,
    ) -> Result<(), OrchestratorError> {
        match self.store.load_by_task_id(task_id, logger)? {
            Some(prior) => {
                logger.info(
                    "task.resume",
                    &format!("resuming task {task_id} from run {}", prior.run_id),
                );
                let issue_number = match state.issue_number {
                    Some(_) => None,
                    None => prior.issue_number,
                };
                state.update(StateUpdate {
                    current_step: Some(prior.current_step),
                    issue_number,
                    resumed_from: Some(prior.run_id),
                    ..StateUpdate::default()
                });
            }
            None => logger.info(
                "task.resume",
                &format!("no previous state found for task {task_id}, starting fresh"),
            ),
        }
        Ok(())
    }

    fn execute(
        &self,
        task: &TaskDescriptor,
        mut state: WorkflowRunState,
        options: &TaskRunOptions,
        logger: &RunLogger,
    ) -> Result<TaskOutcome, OrchestratorError> {
        let run_id = state.run_id.clone();
        logger.info(
            "task.start",
            &format!("starting task {} ({})", task.id, task.name),
        );
        logger.info("task.run_id", &format!("run id: {run_id}"));
        logger.info(
            "task.plan_file",
            &format!("plan file: {}", task.plan_file.display()),
        );

        state.set_status(TaskStatus::InProgress, Utc::now())?;
        self.store.save(&state, logger)?;

        let request = self.implement_request(task, &run_id)?;
        logger.info(
            "task.implement",
            &format!("executing {IMPLEMENT_COMMAND} with model {}", request.model),
        );
        let response = self.gateway.invoke(&request, logger);

        if !response.success {
            logger.error(
                "task.failed",
                &format!(
                    "implementation failed: {}",
                    truncate_chars(&response.output, LOG_EXCERPT_LIMIT)
                ),
            );
            return self.fail(state, &response.output, logger);
        }

        if options.validate {
            if let Some(command) = self.run_validations(task, &mut state, logger) {
                return self.fail(state, &format!("validation failed: {command}"), logger);
            }
        }

        state.update(StateUpdate {
            current_step: Some(task.total_steps),
            ..StateUpdate::default()
        });
        state.set_status(TaskStatus::Completed, Utc::now())?;
        self.store.save(&state, logger)?;
        logger.info(
            "task.completed",
            &format!("task {} completed successfully", task.id),
        );
        Ok(TaskOutcome::Completed {
            run_id,
            session_id: response.session_id,
        })
    }

    fn fail(
        &self,
        mut state: WorkflowRunState,
        error: &str,
        logger: &RunLogger,
    ) -> Result<TaskOutcome, OrchestratorError> {
        let error = truncate_chars(error, ERROR_MESSAGE_LIMIT);
        state.update(StateUpdate {
            error_message: Some(error.clone()),
            ..StateUpdate::default()
        });
        state.set_status(TaskStatus::Failed, Utc::now())?;
        self.store.save(&state, logger)?;
        Ok(TaskOutcome::Failed {
            run_id: state.run_id,
            error,
        })
    }

    /// Runs every configured command and records each outcome; returns the
    /// first command that failed.
    fn run_validations(
        &self,
        task: &TaskDescriptor,
        state: &mut WorkflowRunState,
        logger: &RunLogger,
    ) -> Option<String> {
        let mut first_failure = None;
        for command in &task.validation_commands {
            let result = run_validation_command(command, self.store.state_root());
            if result.passed {
                logger.info("validation.passed", &format!("validation passed: {command}"));
            } else {
                logger.warn(
                    "validation.failed",
                    &format!(
                        "validation failed: {command}: {}",
                        result.error.as_deref().unwrap_or("")
                    ),
                );
                if first_failure.is_none() {
                    first_failure = Some(command.clone());
                }
            }
            state.append_validation_result(result.command, result.passed, result.output, result.error);
        }
        first_failure
    }

    fn implement_request(
        &self,
        task: &TaskDescriptor,
        run_id: &RunId,
    ) -> Result<AgentRequest, OrchestratorError> {
        let agent_name =
            AgentName::parse(IMPLEMENTOR_AGENT).map_err(OrchestratorError::Identifier)?;
        let output_file =
            agent_dir(self.store.state_root(), run_id, &agent_name).join(RAW_OUTPUT_FILE_NAME);
        Ok(AgentRequest {
            directive: implement_directive(task),
            run_id: run_id.clone(),
            agent_name,
            model: self.implement_model(),
            skip_permissions: true,
            output_file,
        })
    }

    fn implement_model(&self) -> String {
        model_for_command(
            IMPLEMENT_COMMAND,
            &self.settings.agent.command_models,
            &self.settings.agent.default_model,
        )
    }

    fn plan(&self, task: &TaskDescriptor, missing: Vec<TaskId>) -> DryRunPlan {
        DryRunPlan {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            phase: task.phase,
            plan_file: task.plan_file.clone(),
            dependencies: task.depends_on.clone(),
            missing,
            directive: implement_directive(task),
            model: self.implement_model(),
        }
    }
}

pub fn implement_directive(task: &TaskDescriptor) -> String {
    format!("{IMPLEMENT_COMMAND} {}", task.plan_file.display())
}
