pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "orderdesk",
    about = "Orderdesk operator CLI",
    long_about = "Prepare order stores, inspect configuration, and drive a conversational order session.",
    after_help = "Examples:\n  orderdesk migrate\n  orderdesk seed\n  orderdesk orders --customer U1\n  orderdesk chat --user U1"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to an orderdesk.toml file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override store.url (sqlite://… or csv://…)")]
    pub store_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending SQLite migrations, or create an empty CSV order file")]
    Migrate,
    #[command(about = "Load the deterministic demo order dataset (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "List a customer's orders in priority order")]
    Orders {
        #[arg(long, help = "Customer identifier")]
        customer: String,
    },
    #[command(about = "Run a line-oriented order conversation over stdin")]
    Chat {
        #[arg(long, help = "User identifier the session belongs to")]
        user: String,
        #[arg(long, default_value = "transaction", help = "Intent label sent with every line")]
        intent: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&global),
        Command::Seed => commands::seed::run(&global),
        Command::Config => commands::config::run(&global),
        Command::Orders { customer } => commands::orders::run(&global, &customer),
        Command::Chat { user, intent } => commands::chat::run(&global, &user, &intent),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
