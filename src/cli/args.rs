use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::gateway::Role;

#[derive(Parser, Debug)]
#[command(name = "televisit")]
#[command(about = "Telemedicine visit session host", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Create the meeting for an appointment, join it and stay until ended
    Visit(VisitCliArgs),
    /// Show the state of the running visit
    Status(ControlCliArgs),
    /// Toggle microphone mute on the running visit
    Mic(ControlCliArgs),
    /// Toggle the camera on the running visit
    Video(ControlCliArgs),
    /// End the running visit
    End(ControlCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct VisitCliArgs {
    /// Appointment to open the video visit for
    #[arg(short, long)]
    pub appointment: String,
    /// Which side of the visit this host is
    #[arg(short, long, value_enum)]
    pub role: Role,
    /// Bearer token for the clinic backend (default: $TELEVISIT_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
    /// Render target for the local preview
    #[arg(long)]
    pub local_target: Option<String>,
    /// Render target for the remote participant
    #[arg(long)]
    pub remote_target: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct ControlCliArgs {
    /// Control API port (default: from config)
    #[arg(long)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_visit_command() {
        let cli = Cli::try_parse_from([
            "televisit",
            "visit",
            "--appointment",
            "appt-42",
            "--role",
            "doctor",
            "--local-target",
            "self-view",
        ])
        .unwrap();

        match cli.command {
            CliCommand::Visit(args) => {
                assert_eq!(args.appointment, "appt-42");
                assert_eq!(args.role, Role::Doctor);
                assert_eq!(args.local_target.as_deref(), Some("self-view"));
                assert!(args.token.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_role() {
        assert!(Cli::try_parse_from(["televisit", "visit", "-a", "x", "-r", "nurse"]).is_err());
    }

    #[test]
    fn test_parse_control_command_with_port() {
        let cli = Cli::try_parse_from(["televisit", "-v", "end", "--port", "4000"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, CliCommand::End(ControlCliArgs { port: Some(4000) })));
    }
}
