pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chatorder_core::menu::DEFAULT_TOP_K;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chatorder",
    about = "Chat order intake operator CLI",
    long_about = "Apply migrations, inspect effective configuration, and try menu retrieval offline.",
    after_help = "Examples:\n  chatorder migrate\n  chatorder config --json\n  chatorder retrieve --menu menu.json \"iki adana bir ayran\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate {
        #[arg(long, help = "Database URL to migrate instead of the configured one")]
        database_url: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config {
        #[arg(long, help = "Emit the redacted configuration as JSON")]
        json: bool,
    },
    #[command(about = "Rank menu candidates for an utterance against a canonical menu export")]
    Retrieve {
        #[arg(long, help = "Path to a canonical menu export (JSON)")]
        menu: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_K, help = "Maximum number of candidates")]
        top_k: usize,
        #[arg(help = "Customer utterance to match")]
        utterance: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { database_url } => commands::migrate::run(database_url),
        Command::Config { json } => commands::config::run(json),
        Command::Retrieve { menu, top_k, utterance } => {
            commands::retrieve::run(&menu, &utterance, top_k)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
