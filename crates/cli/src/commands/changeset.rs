//! `sessionforge changeset` — the change-proposal lifecycle for a session:
//! create, approve, merge, and read back via the platform-agnostic view.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use sessionforge_core::approval::CreateOptions;
use sessionforge_core::backend::select_backend;
use sessionforge_core::changeset_adapter::select_adapter;
use sessionforge_core::domain::session::SessionName;

use crate::context::CliContext;
use crate::output;

#[derive(Debug, Clone, Args)]
pub struct ChangesetArgs {
    #[command(subcommand)]
    pub action: ChangesetAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ChangesetAction {
    /// Prepare a change proposal from the session's current branch.
    Create {
        session: String,
        #[arg(long, default_value = "main")]
        target_branch: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Skip the TODO -> IN-REVIEW task transition.
        #[arg(long)]
        skip_task_transition: bool,
        #[arg(long)]
        json: bool,
    },
    /// Record approval for a session's change proposal.
    Approve {
        session: String,
        #[arg(long)]
        json: bool,
    },
    /// Merge an approved change proposal. Fails closed if unapproved.
    Merge {
        session: String,
        #[arg(long)]
        json: bool,
    },
    /// List every changeset visible through the session's adapter.
    List {
        session: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the unified diff for a session's change proposal.
    Diff {
        session: String,
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ctx: &CliContext, args: ChangesetArgs) -> Result<()> {
    match args.action {
        ChangesetAction::Create {
            session,
            target_branch,
            title,
            description,
            skip_task_transition,
            json,
        } => create(ctx, session, target_branch, title, description, skip_task_transition, json).await,
        ChangesetAction::Approve { session, json } => approve(ctx, session, json).await,
        ChangesetAction::Merge { session, json } => merge(ctx, session, json).await,
        ChangesetAction::List { session, json } => list(ctx, session, json).await,
        ChangesetAction::Diff { session, json } => diff(ctx, session, json).await,
    }
}

async fn require_record(
    ctx: &CliContext,
    session: &str,
) -> Result<(SessionName, sessionforge_core::domain::session::SessionRecord)> {
    let name = SessionName::parse(session).context("invalid session name")?;
    let Some(record) = ctx.store.get(&name).await.context("look up session")? else {
        bail!("session not found: {name}");
    };
    Ok((name, record))
}

#[allow(clippy::too_many_arguments)]
async fn create(
    ctx: &CliContext,
    session: String,
    target_branch: String,
    title: String,
    description: String,
    skip_task_transition: bool,
    json: bool,
) -> Result<()> {
    let (name, record) = require_record(ctx, &session).await?;
    let backend = select_backend(&record.repo_url, ctx.store.base_dir().clone())
        .context("select repository backend")?;
    let pr_branch = format!("pr/{name}");

    let updated = ctx
        .approval
        .create(
            &name,
            backend.as_ref(),
            pr_branch,
            title,
            description,
            target_branch,
            CreateOptions {
                skip_task_transition,
            },
        )
        .await
        .context("create change proposal")?;

    output::emit(&updated, json, |record| {
        println!(
            "created proposal {} for session {}",
            record.pr_branch.as_deref().unwrap_or("-"),
            record.session
        );
    })
}

async fn approve(ctx: &CliContext, session: String, json: bool) -> Result<()> {
    let (name, record) = require_record(ctx, &session).await?;
    let backend = select_backend(&record.repo_url, ctx.store.base_dir().clone())
        .context("select repository backend")?;
    let updated = ctx
        .approval
        .approve(&name, backend.as_ref())
        .await
        .context("approve change proposal")?;
    output::emit(&updated, json, |record| {
        println!("approved proposal for session {}", record.session);
    })
}

async fn merge(ctx: &CliContext, session: String, json: bool) -> Result<()> {
    let (name, record) = require_record(ctx, &session).await?;
    let backend = select_backend(&record.repo_url, ctx.store.base_dir().clone())
        .context("select repository backend")?;
    let updated = ctx
        .approval
        .merge(&name, backend.as_ref())
        .await
        .context("merge change proposal")?;
    output::emit(&updated, json, |record| {
        let commit = record
            .pr_state
            .as_ref()
            .and_then(|s| s.commit_hash.as_deref())
            .unwrap_or("-");
        println!("merged proposal for session {} ({commit})", record.session);
    })
}

async fn list(ctx: &CliContext, session: String, json: bool) -> Result<()> {
    let (_, record) = require_record(ctx, &session).await?;
    let workdir = ctx.store.get_repo_path(&record);
    let adapter =
        select_adapter(&record.repo_url, workdir).context("select changeset adapter")?;
    let changesets = adapter.list(None).await.context("list changesets")?;
    output::emit(&changesets, json, |changesets| {
        if changesets.is_empty() {
            println!("no changesets");
        }
        for changeset in changesets {
            println!(
                "{}\t{:?}\t{} -> {}",
                changeset.id, changeset.status, changeset.source_branch.as_deref().unwrap_or("-"),
                changeset.target_branch
            );
        }
    })
}

async fn diff(ctx: &CliContext, session: String, json: bool) -> Result<()> {
    let (name, record) = require_record(ctx, &session).await?;
    let backend = select_backend(&record.repo_url, ctx.store.base_dir().clone())
        .context("select repository backend")?;
    let diff = backend
        .get_pull_request_diff(&record)
        .await
        .with_context(|| format!("get diff for session {name}"))?;
    output::emit_line(diff, json, "diff")
}
