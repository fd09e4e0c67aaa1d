use crate::config::CONFIG_PATH_ENV;
use crate::orchestration::controller::TaskRunOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "adw",
    version,
    about = "Run implementation tasks through the agent CLI in dependency order"
)]
pub struct Cli {
    /// Settings file (defaults to ./adw.yaml)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print the final summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a single task
    Task(TaskArgs),
    /// Run every task of a phase in dependency order
    Phase(PhaseArgs),
    /// Show the latest recorded run for a task
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Task id, e.g. 02_06 or 2.6
    pub task_id: String,

    /// Run again even if completed, continuing from the latest attempt
    #[arg(long)]
    pub resume: bool,

    /// Show what would run without invoking the agent
    #[arg(long)]
    pub dry_run: bool,

    /// Run even if dependencies are not completed
    #[arg(long)]
    pub skip_deps: bool,

    /// Issue number to record on the run
    #[arg(long, value_name = "N")]
    pub issue: Option<u64>,

    /// Run the task's validation commands after the agent succeeds
    #[arg(long)]
    pub validate: bool,
}

impl TaskArgs {
    pub fn options(&self) -> TaskRunOptions {
        TaskRunOptions {
            resume: self.resume,
            skip_deps: self.skip_deps,
            dry_run: self.dry_run,
            validate: self.validate,
            issue_number: self.issue,
        }
    }
}

#[derive(Debug, Args)]
pub struct PhaseArgs {
    pub phase: u32,

    #[arg(long)]
    pub dry_run: bool,

    /// Leave out tasks that are already completed
    #[arg(long)]
    pub skip_completed: bool,

    /// Keep going after a task fails or is blocked
    #[arg(long = "continue")]
    pub continue_on_error: bool,

    #[arg(long)]
    pub skip_deps: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    #[arg(long)]
    pub validate: bool,
}

impl PhaseArgs {
    pub fn options(&self) -> TaskRunOptions {
        TaskRunOptions {
            resume: false,
            skip_deps: self.skip_deps,
            dry_run: self.dry_run,
            validate: self.validate,
            issue_number: None,
        }
    }
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    pub task_id: String,

    /// Print the raw run record
    #[arg(long)]
    pub json: bool,
}
