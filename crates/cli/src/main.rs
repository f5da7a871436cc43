//! `sessionforge` — a thin clap-based command surface over
//! `sessionforge_core`: session lifecycle, change-proposal lifecycle,
//! legacy-layout migration, and store diagnostics.

mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};

use commands::{changeset, config, doctor, migrate, session};
use context::CliContext;

#[derive(Parser)]
#[command(
    name = "sessionforge",
    about = "Task-scoped development session manager and changeset CLI",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list, inspect, and delete sessions.
    Session(session::SessionArgs),
    /// Drive a session's change-proposal lifecycle.
    Changeset(changeset::ChangesetArgs),
    /// Migrate sessions from the legacy per-repo layout.
    Migrate(migrate::MigrateArgs),
    /// Check the session store file for corruption.
    Doctor(doctor::DoctorArgs),
    /// Inspect the effective configuration.
    Config(config::ConfigArgs),
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::load().await?;

    match cli.command {
        Commands::Session(args) => session::run(&ctx, args).await,
        Commands::Changeset(args) => changeset::run(&ctx, args).await,
        Commands::Migrate(args) => migrate::run(&ctx, args).await,
        Commands::Doctor(args) => doctor::run(&ctx, args).await,
        Commands::Config(args) => config::run(&ctx, args).await,
    }
}
