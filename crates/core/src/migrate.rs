//! Session Migrator: moves sessions from the legacy per-repo layout
//! (`<base>/git/<repoName>/sessions/<id>`) to the canonical layout
//! (`<base>/sessions/<id>`), in phases that can be run independently.
//!
//! Follows a read-metadata/verify-checksum/copy shape, generalized from a
//! single database file to a tree of git checkouts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One legacy session directory discovered under `<base>/git/<repoName>/sessions/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySession {
    pub repo_name: String,
    pub session_id: String,
    pub source: PathBuf,
}

/// **Detect**: enumerate legacy repo directories under `base/git`, and
/// within each, every child of its `sessions/` directory that contains a
/// `.git` entry (directories without one are skipped, not reported as
/// sessions).
pub async fn detect(base_dir: &Path) -> Result<Vec<LegacySession>> {
    let git_root = base_dir.join("git");
    let mut found = Vec::new();

    let Ok(mut repo_entries) = tokio::fs::read_dir(&git_root).await else {
        return Ok(found);
    };

    while let Some(repo_entry) = repo_entries.next_entry().await? {
        if !repo_entry.file_type().await?.is_dir() {
            continue;
        }
        let repo_name = repo_entry.file_name().to_string_lossy().to_string();
        let sessions_dir = repo_entry.path().join("sessions");
        let Ok(mut session_entries) = tokio::fs::read_dir(&sessions_dir).await else {
            continue;
        };
        while let Some(session_entry) = session_entries.next_entry().await? {
            if !session_entry.file_type().await?.is_dir() {
                continue;
            }
            if tokio::fs::metadata(session_entry.path().join(".git"))
                .await
                .is_err()
            {
                continue;
            }
            found.push(LegacySession {
                repo_name: repo_name.clone(),
                session_id: session_entry.file_name().to_string_lossy().to_string(),
                source: session_entry.path(),
            });
        }
    }

    Ok(found)
}

/// One planned move, from a legacy path to its canonical destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub session: LegacySession,
    pub destination: PathBuf,
}

/// A migration plan: the moves to perform and the backup directory they'll
/// be staged under (timestamp-suffixed so repeated runs never collide).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub moves: Vec<PlannedMove>,
    pub backup_dir: PathBuf,
}

/// **Plan**: compute destinations and a timestamp-suffixed backup directory
/// name. `timestamp` is injected by the caller (this module does not call
/// the system clock) so plans are reproducible in tests.
#[must_use]
pub fn plan(base_dir: &Path, sessions: Vec<LegacySession>, timestamp: &str) -> MigrationPlan {
    let backup_dir = base_dir.join(format!("migration-backup-{timestamp}"));
    let moves = sessions
        .into_iter()
        .map(|session| {
            let destination = base_dir.join("sessions").join(&session.session_id);
            PlannedMove {
                session,
                destination,
            }
        })
        .collect();
    MigrationPlan { moves, backup_dir }
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupMetadata {
    origin: PathBuf,
    destination: PathBuf,
    created_at: String,
}

/// **Backup** (optional): copy the legacy git tree and any pre-existing
/// `base/sessions` tree into `plan.backup_dir`, alongside a metadata file.
pub async fn backup(base_dir: &Path, plan: &MigrationPlan, timestamp: &str) -> Result<()> {
    tokio::fs::create_dir_all(&plan.backup_dir).await?;

    let git_src = base_dir.join("git");
    if tokio::fs::metadata(&git_src).await.is_ok() {
        copy_tree(&git_src, &plan.backup_dir.join("git")).await?;
    }
    let sessions_src = base_dir.join("sessions");
    if tokio::fs::metadata(&sessions_src).await.is_ok() {
        copy_tree(&sessions_src, &plan.backup_dir.join("sessions")).await?;
    }

    let metadata = BackupMetadata {
        origin: git_src,
        destination: base_dir.join("sessions"),
        created_at: timestamp.to_string(),
    };
    let json = serde_json::to_vec_pretty(&metadata)?;
    tokio::fs::write(plan.backup_dir.join("backup-metadata.json"), json).await?;
    Ok(())
}

/// One session's migration outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSession {
    pub session_id: String,
    pub error: String,
}

/// **Report**: the outcome of a [`migrate`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub success: bool,
    pub migrated_sessions: Vec<String>,
    pub failed_sessions: Vec<FailedSession>,
    pub backup_path: Option<PathBuf>,
    pub total_processed: usize,
}

/// **Migrate**: execute `plan`'s moves. In `dry_run` mode this only logs
/// what would happen and performs no filesystem writes.
///
/// `backup_path` is caller-supplied (typically `Some(plan.backup_dir)` once
/// [`backup`] has succeeded, or `None` if the caller skipped that phase)
/// and is carried through into the report verbatim.
///
/// A failure migrating one session does not abort the batch; `success` is
/// `true` iff every session in the plan succeeded.
pub async fn migrate(
    plan: &MigrationPlan,
    dry_run: bool,
    backup_path: Option<PathBuf>,
) -> MigrationReport {
    let mut migrated = Vec::new();
    let mut failed = Vec::new();

    for planned in &plan.moves {
        if dry_run {
            tracing::info!(
                session = %planned.session.session_id,
                from = %planned.session.source.display(),
                to = %planned.destination.display(),
                "dry-run: would migrate session"
            );
            migrated.push(planned.session.session_id.clone());
            continue;
        }

        match migrate_one(planned).await {
            Ok(()) => migrated.push(planned.session.session_id.clone()),
            Err(err) => failed.push(FailedSession {
                session_id: planned.session.session_id.clone(),
                error: err.to_string(),
            }),
        }
    }

    MigrationReport {
        success: failed.is_empty(),
        total_processed: plan.moves.len(),
        migrated_sessions: migrated,
        failed_sessions: failed,
        backup_path,
    }
}

async fn migrate_one(planned: &PlannedMove) -> Result<()> {
    if tokio::fs::metadata(&planned.destination).await.is_ok() {
        return Err(Error::Conflict(format!(
            "destination already exists: {}",
            planned.destination.display()
        )));
    }
    if let Some(parent) = planned.destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Copy-then-verify must leave the destination truly absent on any
    // failure, not a half-copied or unverified tree: per spec, a failed
    // migration means the destination is considered absent, and a
    // present-but-invalid destination would also wedge every re-run behind
    // the `already exists` guard above.
    if let Err(err) = copy_and_verify(planned).await {
        let _ = tokio::fs::remove_dir_all(&planned.destination).await;
        return Err(err);
    }
    Ok(())
}

async fn copy_and_verify(planned: &PlannedMove) -> Result<()> {
    copy_tree(&planned.session.source, &planned.destination).await?;

    if tokio::fs::metadata(planned.destination.join(".git")).await.is_err() {
        return Err(Error::Corruption {
            path: planned.destination.clone(),
            detail: "migrated session is missing .git after copy".to_string(),
        });
    }
    let mut entries = tokio::fs::read_dir(&planned.destination).await?;
    if entries.next_entry().await?.is_none() {
        return Err(Error::Corruption {
            path: planned.destination.clone(),
            detail: "migrated session directory is empty after copy".to_string(),
        });
    }
    Ok(())
}

/// **Rollback**: given a backup directory, restore the legacy tree from it,
/// removing whatever new-layout tree now exists.
pub async fn rollback(base_dir: &Path, backup_dir: &Path) -> Result<()> {
    let metadata_path = backup_dir.join("backup-metadata.json");
    let metadata_bytes = tokio::fs::read(&metadata_path).await?;
    let metadata: BackupMetadata = serde_json::from_slice(&metadata_bytes)?;

    let sessions_dir = base_dir.join("sessions");
    if tokio::fs::metadata(&sessions_dir).await.is_ok() {
        tokio::fs::remove_dir_all(&sessions_dir).await?;
    }
    // `backup()` saves any pre-existing `base/sessions` tree alongside the
    // legacy `git` tree; restore it too, or a rollback silently destroys
    // sessions that were already in the flat layout before migration ran.
    let sessions_backup = backup_dir.join("sessions");
    if tokio::fs::metadata(&sessions_backup).await.is_ok() {
        copy_tree(&sessions_backup, &sessions_dir).await?;
    }

    let git_backup = backup_dir.join("git");
    if tokio::fs::metadata(&git_backup).await.is_ok() {
        if tokio::fs::metadata(&metadata.origin).await.is_ok() {
            tokio::fs::remove_dir_all(&metadata.origin).await?;
        }
        copy_tree(&git_backup, &metadata.origin).await?;
    }
    Ok(())
}

/// **Cleanup**: remove the legacy `base/git` tree after a confirmed
/// successful migration.
pub async fn cleanup(base_dir: &Path) -> Result<()> {
    let git_root = base_dir.join("git");
    if tokio::fs::metadata(&git_root).await.is_ok() {
        tokio::fs::remove_dir_all(&git_root).await?;
    }
    Ok(())
}

/// Recursively copy a directory tree, depth-first, since a session
/// checkout is a tree rather than a single file.
///
/// Manually boxed rather than `#[async_recursion]`: an `async fn` cannot
/// call itself directly because its future would have infinite size.
fn copy_tree<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let dst_path = dst.join(entry.file_name());
            if file_type.is_dir() {
                copy_tree(&entry.path(), &dst_path).await?;
            } else if file_type.is_symlink() {
                let target = tokio::fs::read_link(entry.path()).await?;
                #[cfg(unix)]
                tokio::fs::symlink(target, &dst_path).await?;
                #[cfg(not(unix))]
                tokio::fs::copy(entry.path(), &dst_path).await.map(|_| ())?;
            } else {
                tokio::fs::copy(entry.path(), &dst_path).await?;
            }
        }
        Ok(())
    })
}
