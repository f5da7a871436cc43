//! `sessionforge doctor` — read-only integrity check over the configured
//! session store file.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sessionforge_core::config::StorageKind;
use sessionforge_core::integrity::{self, StoreFormat};

use crate::context::CliContext;
use crate::output;

#[derive(Debug, Clone, Args)]
pub struct DoctorArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SuggestedActionView {
    kind: &'static str,
    description: String,
    command: Option<String>,
    priority: u8,
    auto_executable: bool,
}

#[derive(Debug, Serialize)]
struct IntegrityReportView {
    is_valid: bool,
    actual_format: &'static str,
    issues: Vec<String>,
    warnings: Vec<String>,
    backups_found: Vec<std::path::PathBuf>,
    suggested_actions: Vec<SuggestedActionView>,
}

fn format_name(format: StoreFormat) -> &'static str {
    match format {
        StoreFormat::Json => "json",
        StoreFormat::Sqlite => "sqlite",
        StoreFormat::Empty => "empty",
        StoreFormat::Unknown => "unknown",
    }
}

fn action_kind_name(kind: integrity::ActionKind) -> &'static str {
    match kind {
        integrity::ActionKind::Migrate => "migrate",
        integrity::ActionKind::Restore => "restore",
        integrity::ActionKind::Repair => "repair",
        integrity::ActionKind::Create => "create",
        integrity::ActionKind::Warning => "warning",
    }
}

impl From<&integrity::IntegrityReport> for IntegrityReportView {
    fn from(report: &integrity::IntegrityReport) -> Self {
        Self {
            is_valid: report.is_valid,
            actual_format: format_name(report.actual_format),
            issues: report.issues.clone(),
            warnings: report.warnings.clone(),
            backups_found: report.backups_found.clone(),
            suggested_actions: report
                .suggested_actions
                .iter()
                .map(|action| SuggestedActionView {
                    kind: action_kind_name(action.kind),
                    description: action.description.clone(),
                    command: action.command.clone(),
                    priority: action.priority,
                    auto_executable: action.auto_executable,
                })
                .collect(),
        }
    }
}

pub async fn run(ctx: &CliContext, args: DoctorArgs) -> Result<()> {
    let expected_format = match ctx.config.storage_kind {
        StorageKind::Json => StoreFormat::Json,
        StorageKind::Sqlite => StoreFormat::Sqlite,
        StorageKind::Postgres => StoreFormat::Unknown,
    };
    let path = ctx.config.base_dir.join(&ctx.config.storage_location);

    let report = integrity::check_integrity(expected_format, &path)
        .await
        .context("check store integrity")?;
    let view = IntegrityReportView::from(&report);

    output::emit(&view, args.json, |view| {
        println!("format: {} (valid: {})", view.actual_format, view.is_valid);
        for issue in &view.issues {
            println!("  issue: {issue}");
        }
        for warning in &view.warnings {
            println!("  warning: {warning}");
        }
        for action in &view.suggested_actions {
            println!(
                "  suggested: {} - {} (priority {})",
                action.kind, action.description, action.priority
            );
        }
    })
}
