//! Shared subprocess `git` wrapper.
//!
//! Centralizes every git invocation behind one async call so the Local
//! repository backend and the Local changeset adapter don't each grow their
//! own `Command` plumbing. The git CLI is preferred over an embedded library
//! for the same reason vibe-kanban's `git_cli` module gives: the CLI's
//! working-tree safety checks (refusing to clobber uncommitted changes on
//! checkout/merge) are exactly the behavior a session workspace wants, and
//! re-implementing them against a library is how that safety gets lost.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Default timeout for a git subprocess invocation, overridable per call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GitProcessError {
    #[error("git executable not found on PATH")]
    NotAvailable,
    #[error("git command timed out after {0:?}")]
    TimedOut(Duration),
    #[error("git command failed: {0}")]
    CommandFailed(String),
}

impl From<GitProcessError> for crate::error::Error {
    fn from(err: GitProcessError) -> Self {
        match err {
            GitProcessError::NotAvailable => Self::BackendUnavailable(err.to_string()),
            GitProcessError::TimedOut(_) => Self::TransientIo(err.to_string()),
            GitProcessError::CommandFailed(msg) => Self::TransientIo(msg),
        }
    }
}

/// Run `git -C <workdir> <args...>` with `timeout` (default
/// [`DEFAULT_TIMEOUT`]), returning trimmed stdout on success.
///
/// Output is tolerant of trailing CR and blank lines, which git emits on
/// some platforms/configurations; both are stripped before returning.
pub async fn run_git<I, S>(
    workdir: &Path,
    args: I,
    timeout: Option<Duration>,
) -> Result<String, GitProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    which::which("git").map_err(|_| GitProcessError::NotAvailable)?;

    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(workdir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd.kill_on_drop(true);

    let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| GitProcessError::TimedOut(timeout))?
        .map_err(|e| GitProcessError::CommandFailed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(GitProcessError::CommandFailed(stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string())
}

/// Same as [`run_git`], but splits stdout into non-empty trimmed lines —
/// the shape most ref/log enumeration callers want.
pub async fn run_git_lines<I, S>(
    workdir: &Path,
    args: I,
    timeout: Option<Duration>,
) -> Result<Vec<String>, GitProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_git(workdir, args, timeout).await?;
    Ok(output
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .filter(|l| !l.is_empty())
        .collect())
}
