//! `sessionforge config show` — print the fully-layered effective
//! configuration (defaults -> global -> project -> environment).

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::context::CliContext;
use crate::output;

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct ConfigView {
    base_dir: std::path::PathBuf,
    default_backend: String,
    storage_kind: String,
    storage_location: String,
    git_timeout_secs: u64,
}

pub async fn run(ctx: &CliContext, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show { json } => show(ctx, json),
    }
}

fn show(ctx: &CliContext, json: bool) -> Result<()> {
    let view = ConfigView {
        base_dir: ctx.config.base_dir.clone(),
        default_backend: ctx.config.default_backend.to_string(),
        storage_kind: format!("{:?}", ctx.config.storage_kind).to_lowercase(),
        storage_location: ctx.config.storage_location.clone(),
        git_timeout_secs: ctx.config.git_timeout.as_secs(),
    };
    output::emit(&view, json, |view| {
        println!("base_dir: {}", view.base_dir.display());
        println!("default_backend: {}", view.default_backend);
        println!("storage_kind: {}", view.storage_kind);
        println!("storage_location: {}", view.storage_location);
        println!("git_timeout_secs: {}", view.git_timeout_secs);
    })
}
