use crate::app::cli::StatusArgs;
use crate::app::command_handlers::task::list_or_none;
use crate::app::command_support::{parse_task_id, CommandContext};
use crate::shared::RunLogger;
use chrono::{DateTime, SecondsFormat, Utc};

pub fn cmd_status(
    context: &CommandContext,
    args: &StatusArgs,
    logger: &RunLogger,
) -> Result<String, String> {
    let task_id = parse_task_id(&args.task_id)?;
    let Some(state) = context
        .store
        .load_by_task_id(&task_id, logger)
        .map_err(|e| e.to_string())?
    else {
        return Ok(format!("No runs recorded for task {task_id}"));
    };

    if args.json {
        return serde_json::to_string_pretty(&state)
            .map_err(|e| format!("failed to encode run state: {e}"));
    }

    let mut lines = vec![
        format!(
            "Task: {task_id} ({})",
            state.task_name.as_deref().unwrap_or("unnamed")
        ),
        format!("Run ID: {}", state.run_id),
        format!("Status: {}", state.status),
        format!("Steps: {}/{}", state.current_step, state.total_steps),
        format!("Started: {}", timestamp_or_dash(state.started_at)),
        format!("Finished: {}", timestamp_or_dash(state.completed_at)),
        format!("Dependencies: {}", list_or_none(&state.dependencies)),
        format!("Dependencies met: {}", state.dependencies_met),
    ];
    if let Some(issue) = state.issue_number {
        lines.push(format!("Issue: #{issue}"));
    }
    if let Some(previous) = state.resumed_from.as_ref() {
        lines.push(format!("Resumed from: {previous}"));
    }
    if let Some(error) = state.error_message.as_deref() {
        lines.push(format!("Error: {error}"));
    }
    for result in &state.validation_results {
        let verdict = if result.passed { "passed" } else { "failed" };
        lines.push(format!("Validation {verdict}: {}", result.command));
    }
    Ok(lines.join("\n"))
}

fn timestamp_or_dash(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}
