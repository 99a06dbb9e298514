pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Inspect configuration, apply migrations and reset stored conversation windows.",
    after_help = "Examples:\n  concierge config\n  concierge migrate\n  concierge clear-conversation 15551234567"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Delete the stored conversation window for one customer")]
    ClearConversation {
        #[arg(help = "Conversation key, usually the customer's phone number")]
        key: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::ClearConversation { key } => commands::clear_conversation::run(&key),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
