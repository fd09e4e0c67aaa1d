use crate::app::cli::{Cli, CliCommand};
use crate::app::command_support::{console_logger, prompt_confirmation, CommandContext};
use clap::error::ErrorKind;
use clap::Parser;

pub mod phase;
pub mod status;
pub mod task;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    run_cli_with(args, &mut prompt_confirmation)
}

/// `confirm` answers the phase confirmation prompt.
pub fn run_cli_with(
    args: Vec<String>,
    confirm: &mut dyn FnMut(&str) -> Result<bool, String>,
) -> Result<String, String> {
    let cli = match Cli::try_parse_from(std::iter::once("adw".to_string()).chain(args)) {
        Ok(cli) => cli,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    Ok(err.render().to_string())
                }
                _ => Err(err.render().to_string()),
            };
        }
    };

    let context = CommandContext::load(cli.config.as_deref())?;
    let logger = console_logger(cli.quiet);
    match &cli.command {
        CliCommand::Task(args) => task::cmd_task(&context, args, &logger),
        CliCommand::Phase(args) => phase::cmd_phase(&context, args, &logger, confirm),
        CliCommand::Status(args) => status::cmd_status(&context, args, &logger),
    }
}
