pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "carebook",
    about = "Carebook operator CLI",
    long_about = "Prepare the clinic database, load demo data, inspect configuration, and check runtime readiness.",
    after_help = "Examples:\n  carebook migrate\n  carebook seed\n  carebook check --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo clinic (doctors, weekly schedules, a patient account)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database schema, demo data, and collaborator wiring")]
    Check {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Check { json } => commands::check::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
