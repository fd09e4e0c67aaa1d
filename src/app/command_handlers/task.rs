use crate::app::cli::TaskArgs;
use crate::app::command_support::{
    execution_log_hint, map_orchestrator_err, parse_task_id, CommandContext,
};
use crate::orchestration::controller::{DryRunPlan, RunController, TaskOutcome, RUN_TASK_TRIGGER};
use crate::shared::{RunLogger, TaskId};

pub fn cmd_task(
    context: &CommandContext,
    args: &TaskArgs,
    logger: &RunLogger,
) -> Result<String, String> {
    let task_id = parse_task_id(&args.task_id)?;
    let controller = RunController::new(
        &context.settings,
        &context.registry,
        &context.store,
        &context.gateway,
    );
    let outcome = controller
        .run_task(&task_id, &args.options(), logger)
        .map_err(map_orchestrator_err)?;

    match outcome {
        TaskOutcome::Completed { run_id, session_id } => {
            let mut lines = vec![
                format!("Task {task_id} completed successfully!"),
                format!("Run ID: {run_id}"),
            ];
            if let Some(session_id) = session_id {
                lines.push(format!("Session: {session_id}"));
            }
            lines.push(format!(
                "Logs: {}",
                execution_log_hint(run_id.as_str(), RUN_TASK_TRIGGER)
            ));
            Ok(lines.join("\n"))
        }
        TaskOutcome::Failed { run_id, error } => Err(format!(
            "Task {task_id} failed: {error}\nSee logs at: {}",
            execution_log_hint(run_id.as_str(), RUN_TASK_TRIGGER)
        )),
        TaskOutcome::Blocked { missing, .. } => Err(format!(
            "Dependencies not met for task {task_id}\nMissing: {}\nRun the missing tasks first, or use --skip-deps to bypass.",
            missing.join(", ")
        )),
        TaskOutcome::AlreadyCompleted => Ok(format!(
            "Task {task_id} is already completed.\nUse --resume to run it again."
        )),
        TaskOutcome::DryRun(plan) => Ok(render_dry_run(&plan)),
    }
}

pub(crate) fn render_dry_run(plan: &DryRunPlan) -> String {
    let mut lines = vec![
        "=== DRY RUN ===".to_string(),
        format!("Task ID: {}", plan.task_id),
        format!("Task Name: {}", plan.task_name),
        format!("Phase: {}", plan.phase),
        format!("Plan File: {}", plan.plan_file.display()),
        format!("Dependencies: {}", list_or_none(&plan.dependencies)),
    ];
    if !plan.missing.is_empty() {
        lines.push(format!("Missing: {}", plan.missing.join(", ")));
    }
    lines.push(format!("Model: {}", plan.model));
    lines.push(format!("Would execute: {}", plan.directive));
    lines.push("===============".to_string());
    lines.join("\n")
}

pub(crate) fn list_or_none(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}
