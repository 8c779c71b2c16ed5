use crate::commands::{run_replay, run_schedule_next, ReplayArgs, ScheduleNextArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ivi_alerts::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "IVI Risk Alerts",
    about = "Detect IVI risk transitions and deliver alert notifications on a schedule",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and scheduler driver (default command)
    Serve(ServeArgs),
    /// Feed a CSV of score snapshots through the recompute trigger
    Replay(ReplayArgs),
    /// Inspect delivery schedules without a running service
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ScheduleCommand {
    /// Print the next run time for a delivery window
    Next(ScheduleNextArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Replay(args) => run_replay(args).await,
        Command::Schedule {
            command: ScheduleCommand::Next(args),
        } => {
            run_schedule_next(args);
            Ok(())
        }
    }
}
