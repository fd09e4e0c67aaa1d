use crate::app::cli::PhaseArgs;
use crate::app::command_handlers::task::render_dry_run;
use crate::app::command_support::{execution_log_hint, map_orchestrator_err, CommandContext};
use crate::orchestration::controller::{BatchPolicy, BatchReport, RunController, TaskOutcome};
use crate::orchestration::resolver::order;
use crate::shared::{RunId, RunLogger, TaskId};
use chrono::Utc;
use std::collections::BTreeSet;

const RULE_WIDTH: usize = 60;

pub fn cmd_phase(
    context: &CommandContext,
    args: &PhaseArgs,
    logger: &RunLogger,
    confirm: &mut dyn FnMut(&str) -> Result<bool, String>,
) -> Result<String, String> {
    let phase = args.phase;
    let controller = RunController::new(
        &context.settings,
        &context.registry,
        &context.store,
        &context.gateway,
    );
    let completed = controller
        .completed_tasks(logger)
        .map_err(map_orchestrator_err)?;

    let mut tasks: BTreeSet<TaskId> = context
        .registry
        .tasks_in_phase(phase)
        .into_iter()
        .map(|task| task.id.clone())
        .collect();
    if tasks.is_empty() {
        return Err(format!("no tasks configured for phase {phase}"));
    }

    let mut lines = Vec::new();
    if args.skip_completed {
        let before = tasks.len();
        tasks.retain(|task_id| !completed.contains(task_id));
        let skipped = before - tasks.len();
        if skipped > 0 {
            lines.push(format!("Skipping {skipped} already completed tasks"));
        }
        if tasks.is_empty() {
            lines.push(format!("All tasks in Phase {phase} are already completed!"));
            return Ok(lines.join("\n"));
        }
    }

    let ordered = order(&tasks, &context.registry.dependency_map()).map_err(|e| e.to_string())?;
    lines.extend(phase_listing(context, phase, &ordered, &completed));

    let policy = if args.continue_on_error {
        BatchPolicy::ContinueOnFailure
    } else {
        BatchPolicy::StopOnFailure
    };
    let options = args.options();

    if args.dry_run {
        lines.push(String::new());
        lines.push("DRY RUN - No tasks will be executed".to_string());
        let report = controller
            .run_batch(&tasks, policy, &options, logger)
            .map_err(map_orchestrator_err)?;
        for (_, outcome) in &report.results {
            if let TaskOutcome::DryRun(plan) = outcome {
                lines.push(render_dry_run(plan));
            }
        }
        return Ok(lines.join("\n"));
    }

    if !args.yes {
        let prompt = format!(
            "{}\n\nThis will run {} tasks.\nContinue? [y/N] ",
            lines.join("\n"),
            ordered.len()
        );
        if !confirm(&prompt)? {
            return Ok("Aborted.".to_string());
        }
        lines.clear();
    }

    let state_root = &context.settings.state_root;
    let phase_run_id = RunId::generate_under(state_root, Utc::now().timestamp())?;
    let trigger = format!("run_phase_{phase}");
    let phase_logger = RunLogger::open(
        state_root,
        phase_run_id.as_str(),
        &trigger,
        logger.console(),
    );
    phase_logger.info(
        "phase.start",
        &format!("starting phase {phase} with {} tasks", ordered.len()),
    );

    let report = controller
        .run_batch(&tasks, policy, &options, &phase_logger)
        .map_err(map_orchestrator_err)?;
    phase_logger.info(
        "phase.finished",
        &format!(
            "phase {phase} finished: {} succeeded, {} failed",
            report.succeeded().count(),
            report.failed().count()
        ),
    );

    lines.extend(phase_summary(phase, &report));
    lines.push(format!(
        "Logs: {}",
        execution_log_hint(phase_run_id.as_str(), &trigger)
    ));
    if report.all_succeeded() {
        Ok(lines.join("\n"))
    } else {
        Err(lines.join("\n"))
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn phase_listing(
    context: &CommandContext,
    phase: u32,
    ordered: &[TaskId],
    completed: &BTreeSet<TaskId>,
) -> Vec<String> {
    let mut lines = vec![
        rule(),
        format!("Phase {phase} - {} tasks to run", ordered.len()),
        rule(),
        format!("Phase: {}", context.settings.phase_name(phase)),
        String::new(),
        "Tasks in execution order:".to_string(),
    ];
    for (index, task_id) in ordered.iter().enumerate() {
        let name = context
            .registry
            .describe(task_id)
            .map(|task| task.name.as_str())
            .unwrap_or("");
        let status = if completed.contains(task_id) {
            "COMPLETED"
        } else {
            "PENDING"
        };
        let deps = context.registry.dependencies_of(task_id);
        let deps = if deps.is_empty() {
            String::new()
        } else {
            format!(" (deps: {})", deps.join(", "))
        };
        lines.push(format!(
            "  {}. {task_id} - {name} [{status}]{deps}",
            index + 1
        ));
    }
    lines
}

fn phase_summary(phase: u32, report: &BatchReport) -> Vec<String> {
    let succeeded: Vec<&TaskId> = report.succeeded().collect();
    let failed: Vec<(&TaskId, &TaskOutcome)> = report.failed().collect();
    let mut lines = vec![
        rule(),
        format!("Phase {phase} Summary"),
        rule(),
        format!("Successful: {}", succeeded.len()),
        format!("Failed: {}", failed.len()),
    ];
    if !succeeded.is_empty() {
        lines.push(String::new());
        lines.push("Completed tasks:".to_string());
        lines.extend(succeeded.iter().map(|task_id| format!("  - {task_id}")));
    }
    if !failed.is_empty() {
        lines.push(String::new());
        lines.push("Failed tasks:".to_string());
        lines.extend(failed.iter().map(|(task_id, outcome)| {
            let reason = match outcome {
                TaskOutcome::Blocked { .. } => "Dependencies not met",
                _ => "Execution failed",
            };
            format!("  - {task_id}: {reason}")
        }));
    }
    if report.stopped_early {
        lines.push(String::new());
        lines.push("Stopped after the first failure. Use --continue to run the remaining tasks.".to_string());
    }
    lines
}
