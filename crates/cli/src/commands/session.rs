//! `sessionforge session` — create, list, inspect, and delete sessions.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use sessionforge_core::domain::session::SessionName;
use sessionforge_core::git_process::run_git;
use sessionforge_core::task::TaskId;

use crate::context::CliContext;
use crate::output;

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SessionAction {
    /// Clone `repo` into the session's canonical workspace and register it.
    Create {
        /// Session name (must start with a letter).
        name: String,
        /// Repository reference — any form the URI normalizer accepts.
        repo: String,
        /// Associate this session with a task id (e.g. `#123`, `md#123`).
        #[arg(long)]
        task_id: Option<String>,
        /// Working branch to check out after cloning.
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List every registered session.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one session's record.
    Get {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove a session's record (the workspace on disk is left alone).
    Delete {
        name: String,
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ctx: &CliContext, args: SessionArgs) -> Result<()> {
    match args.action {
        SessionAction::Create {
            name,
            repo,
            task_id,
            branch,
            json,
        } => create(ctx, name, repo, task_id, branch, json).await,
        SessionAction::List { json } => list(ctx, json).await,
        SessionAction::Get { name, json } => get(ctx, name, json).await,
        SessionAction::Delete { name, json } => delete(ctx, name, json).await,
    }
}

async fn create(
    ctx: &CliContext,
    name: String,
    repo: String,
    task_id: Option<String>,
    branch: Option<String>,
    json: bool,
) -> Result<()> {
    let session_name = SessionName::parse(name).context("invalid session name")?;
    let uri = sessionforge_core::uri::parse(&repo);

    let mut record = sessionforge_core::domain::session::SessionRecord::new(
        session_name.clone(),
        uri.normalized.clone(),
        repo.clone(),
    );
    if let Some(task_id) = task_id {
        record.task_id = Some(TaskId::parse(&task_id).context("invalid task id")?);
    }
    record.branch = branch.clone();

    let workdir = ctx.store.get_repo_path(&record);
    if let Some(parent) = workdir.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    run_git(
        parent_or_self(&workdir),
        ["clone", repo.as_str(), workdir.to_string_lossy().as_ref()],
        None,
    )
    .await
    .with_context(|| format!("clone {repo} into {}", workdir.display()))?;

    if let Some(branch) = &branch {
        run_git(&workdir, ["checkout", "-b", branch], None)
            .await
            .with_context(|| format!("create branch {branch}"))?;
    }

    ctx.store.add(record.clone()).await.context("register session")?;

    output::emit(&record, json, |record| {
        println!("created session {} at {}", record.session, workdir.display());
    })
}

fn parent_or_self(path: &std::path::Path) -> &std::path::Path {
    path.parent().unwrap_or(path)
}

async fn list(ctx: &CliContext, json: bool) -> Result<()> {
    let sessions = ctx.store.list().await.context("list sessions")?;
    output::emit(&sessions, json, |sessions| {
        if sessions.is_empty() {
            println!("no sessions");
        }
        for record in sessions {
            println!(
                "{}\t{}\t{}",
                record.session,
                record.repo_name,
                record.branch.as_deref().unwrap_or("-")
            );
        }
    })
}

async fn get(ctx: &CliContext, name: String, json: bool) -> Result<()> {
    let session_name = SessionName::parse(name).context("invalid session name")?;
    let Some(record) = ctx.store.get(&session_name).await.context("look up session")? else {
        bail!("session not found: {session_name}");
    };
    output::emit(&record, json, |record| {
        println!("{record:#?}");
    })
}

async fn delete(ctx: &CliContext, name: String, json: bool) -> Result<()> {
    let session_name = SessionName::parse(name).context("invalid session name")?;
    let removed = ctx.store.delete(&session_name).await.context("delete session")?;
    if !removed {
        bail!("session not found: {session_name}");
    }
    output::emit_line(format!("deleted session {session_name}"), json, "message")
}
