pub mod args;
pub mod control;

pub use args::{Cli, CliCommand, ControlCliArgs, VisitCliArgs};

use anyhow::Result;

/// Dispatch the control-API subcommands.
pub async fn handle_control_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Status(args) => control::show_status(args).await,
        CliCommand::Mic(args) => control::toggle_microphone(args).await,
        CliCommand::Video(args) => control::toggle_video(args).await,
        CliCommand::End(args) => control::end_visit(args).await,
        CliCommand::Visit(_) | CliCommand::Version => Ok(()),
    }
}
