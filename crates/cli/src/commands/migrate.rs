//! `sessionforge migrate` — move sessions out of the legacy
//! `<base>/git/<repoName>/sessions/<id>` layout into the flat
//! `<base>/sessions/<id>` layout.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use sessionforge_core::migrate;

use crate::context::CliContext;
use crate::output;

/// `migrate::LegacySession` has no `Serialize` impl in the core crate — it
/// isn't part of the persisted protocol — so the `--json` view is built
/// from this local mirror, the same pattern `doctor.rs` and `status.rs`
/// style commands use for a non-serializable core type.
#[derive(Debug, Serialize)]
struct LegacySessionView {
    repo_name: String,
    session_id: String,
    source: std::path::PathBuf,
}

impl From<&migrate::LegacySession> for LegacySessionView {
    fn from(session: &migrate::LegacySession) -> Self {
        Self {
            repo_name: session.repo_name.clone(),
            session_id: session.session_id.clone(),
            source: session.source.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FailedSessionView {
    session_id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct MigrationReportView {
    success: bool,
    migrated_sessions: Vec<String>,
    failed_sessions: Vec<FailedSessionView>,
    backup_path: Option<std::path::PathBuf>,
    total_processed: usize,
}

impl From<&migrate::MigrationReport> for MigrationReportView {
    fn from(report: &migrate::MigrationReport) -> Self {
        Self {
            success: report.success,
            migrated_sessions: report.migrated_sessions.clone(),
            failed_sessions: report
                .failed_sessions
                .iter()
                .map(|f| FailedSessionView {
                    session_id: f.session_id.clone(),
                    error: f.error.clone(),
                })
                .collect(),
            backup_path: report.backup_path.clone(),
            total_processed: report.total_processed,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub action: MigrateAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum MigrateAction {
    /// List sessions still living under the legacy layout.
    Detect {
        #[arg(long)]
        json: bool,
    },
    /// Run the migration, backing up the legacy tree first unless `--no-backup`.
    Run {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        no_backup: bool,
        #[arg(long)]
        json: bool,
    },
    /// Restore the legacy layout from a prior migration's backup directory.
    Rollback {
        backup_dir: std::path::PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Remove the legacy tree after a successful migration.
    Cleanup {
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ctx: &CliContext, args: MigrateArgs) -> Result<()> {
    match args.action {
        MigrateAction::Detect { json } => detect(ctx, json).await,
        MigrateAction::Run {
            dry_run,
            no_backup,
            json,
        } => run_migration(ctx, dry_run, no_backup, json).await,
        MigrateAction::Rollback { backup_dir, json } => rollback(ctx, backup_dir, json).await,
        MigrateAction::Cleanup { json } => cleanup(ctx, json).await,
    }
}

async fn detect(ctx: &CliContext, json: bool) -> Result<()> {
    let sessions = migrate::detect(&ctx.config.base_dir).await.context("detect legacy sessions")?;
    let views: Vec<LegacySessionView> = sessions.iter().map(LegacySessionView::from).collect();
    output::emit(&views, json, |views| {
        if views.is_empty() {
            println!("no legacy sessions found");
        }
        for session in views {
            println!("{}/{}\t{}", session.repo_name, session.session_id, session.source.display());
        }
    })
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

async fn run_migration(ctx: &CliContext, dry_run: bool, no_backup: bool, json: bool) -> Result<()> {
    let sessions = migrate::detect(&ctx.config.base_dir).await.context("detect legacy sessions")?;
    let timestamp = timestamp();
    let migration_plan = migrate::plan(&ctx.config.base_dir, sessions, &timestamp);

    let backup_path = if dry_run || no_backup {
        None
    } else {
        migrate::backup(&ctx.config.base_dir, &migration_plan, &timestamp)
            .await
            .context("back up legacy tree")?;
        Some(migration_plan.backup_dir.clone())
    };

    let report = migrate::migrate(&migration_plan, dry_run, backup_path).await;
    let view = MigrationReportView::from(&report);
    output::emit(&view, json, |view| {
        println!(
            "migrated {}/{} session(s){}",
            view.migrated_sessions.len(),
            view.total_processed,
            if dry_run { " (dry run)" } else { "" }
        );
        for failed in &view.failed_sessions {
            println!("  failed: {} ({})", failed.session_id, failed.error);
        }
    })?;

    if !report.success {
        anyhow::bail!("migration completed with failures");
    }
    Ok(())
}

async fn rollback(ctx: &CliContext, backup_dir: std::path::PathBuf, json: bool) -> Result<()> {
    migrate::rollback(&ctx.config.base_dir, &backup_dir)
        .await
        .context("roll back migration")?;
    output::emit_line(format!("rolled back from {}", backup_dir.display()), json, "message")
}

async fn cleanup(ctx: &CliContext, json: bool) -> Result<()> {
    migrate::cleanup(&ctx.config.base_dir).await.context("clean up legacy tree")?;
    output::emit_line("removed legacy tree", json, "message")
}
