pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cadence",
    about = "Cadence operator CLI",
    long_about = "Operate cadence migrations, demo data, config inspection, and an \
                  interactive text-channel chat loop.",
    after_help = "Examples:\n  cadence doctor --json\n  cadence migrate\n  cadence chat --lead-id 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo lead dataset")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with secret redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Interactive text-channel conversation against the live turn controller")]
    Chat {
        #[arg(long, help = "Lead id to attach to the conversation")]
        lead_id: Option<i64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat { lead_id } => commands::chat::run(lead_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
