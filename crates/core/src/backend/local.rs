//! Local repository backend: every operation is a `git` invocation against
//! the session's own workspace, never a network call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{
    BackendKind, CreatePullRequestOptions, MergeOutcome, PullRequestHandle, PullRequestStatus,
    RemoteStatus, RepositoryBackend, UpdatePullRequestOptions,
};
use crate::domain::session::SessionRecord;
use crate::error::{Error, Result};
use crate::git_process::run_git;
use crate::store::path::session_path;

/// The branch every local changeset targets. The local backend has no
/// per-session notion of a target branch distinct from this — mirrors
/// `changeset_adapter::local::DEFAULT_TARGET_BRANCH`.
const DEFAULT_TARGET_BRANCH: &str = "main";

/// Operates purely via `git` in `<base_dir>/sessions/<session>`.
pub struct LocalBackend {
    base_dir: PathBuf,
    timeout: Option<Duration>,
}

impl LocalBackend {
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn workdir(&self, session: &SessionRecord) -> PathBuf {
        session_path(&self.base_dir, session.session.as_str())
    }

    fn pr_branch_name(session: &SessionRecord) -> String {
        format!("pr/{}", session.session)
    }

    async fn git<I, S>(&self, workdir: &Path, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        run_git(workdir, args, self.timeout).await.map_err(Into::into)
    }
}

#[async_trait]
impl RepositoryBackend for LocalBackend {
    fn get_type(&self) -> BackendKind {
        BackendKind::Local
    }

    /// Creates `pr/<session>` at the workspace's current `HEAD`. The actual
    /// merge commit is prepared lazily by `merge_pull_request`, since a
    /// merge commit computed here would go stale the moment the session
    /// branch gains another commit.
    async fn create_pull_request(
        &self,
        session: &SessionRecord,
        _opts: CreatePullRequestOptions,
    ) -> Result<PullRequestHandle> {
        let workdir = self.workdir(session);
        let branch = Self::pr_branch_name(session);
        self.git(&workdir, ["branch", &branch, "HEAD"]).await?;
        Ok(PullRequestHandle {
            id: branch,
            url: None,
        })
    }

    /// Local PRs carry no editable title/description distinct from the
    /// branch's commits; there is nothing to update.
    async fn update_pull_request(
        &self,
        _session: &SessionRecord,
        _opts: UpdatePullRequestOptions,
    ) -> Result<()> {
        Ok(())
    }

    /// Checks out `target_branch`, merges `pr/<session>` with `--no-ff`, and
    /// reports the resulting merge commit.
    async fn merge_pull_request(&self, session: &SessionRecord) -> Result<MergeOutcome> {
        let workdir = self.workdir(session);
        let branch = Self::pr_branch_name(session);
        let target = DEFAULT_TARGET_BRANCH;
        self.git(&workdir, ["checkout", target]).await?;
        self.git(
            &workdir,
            ["merge", "--no-ff", "-m", &format!("Merge {branch} into {target}"), &branch],
        )
        .await?;
        let commit_hash = self.git(&workdir, ["rev-parse", "HEAD"]).await?;
        Ok(MergeOutcome {
            commit_hash: Some(commit_hash),
        })
    }

    /// No remote state to flip — approval for a local backend lives
    /// entirely on the session record, owned by the Approval/Merge Engine.
    async fn approve_pull_request(&self, _session: &SessionRecord) -> Result<()> {
        Ok(())
    }

    async fn get_pull_request_diff(&self, session: &SessionRecord) -> Result<String> {
        let workdir = self.workdir(session);
        let branch = Self::pr_branch_name(session);
        let target = DEFAULT_TARGET_BRANCH;
        self.git(&workdir, ["diff", &format!("{target}...{branch}")]).await
    }

    async fn get_status(&self, session: &SessionRecord) -> Result<PullRequestStatus> {
        let workdir = self.workdir(session);
        let branch = Self::pr_branch_name(session);
        let target = DEFAULT_TARGET_BRANCH;

        let merge_base = self
            .git(&workdir, ["merge-base", target, &branch])
            .await?;
        let branch_tip = self.git(&workdir, ["rev-parse", &branch]).await.map_err(|e| {
            if matches!(e, Error::TransientIo(_)) {
                Error::not_found("pull request", branch.clone())
            } else {
                e
            }
        })?;

        let status = if merge_base == branch_tip {
            RemoteStatus::Merged
        } else {
            RemoteStatus::Open
        };

        Ok(PullRequestStatus {
            status,
            approved: session.pr_approved.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionName;

    async fn init_repo(path: &Path) {
        run_git(path, ["init", "-q", "-b", "main"], None).await.expect("init");
        run_git(path, ["config", "user.email", "t@example.com"], None)
            .await
            .expect("email");
        run_git(path, ["config", "user.name", "Test"], None).await.expect("name");
        tokio::fs::write(path.join("a.txt"), b"base").await.expect("write");
        run_git(path, ["add", "."], None).await.expect("add");
        run_git(path, ["commit", "-m", "initial"], None).await.expect("commit");
    }

    fn record() -> SessionRecord {
        let mut record = SessionRecord::new(
            SessionName::parse("s1").expect("valid"),
            "org/repo".into(),
            "https://example.com/org/repo".into(),
        );
        record.pr_branch = Some("pr/s1".to_string());
        record
    }

    #[tokio::test]
    async fn create_then_merge_round_trip() {
        let base = tempfile::tempdir().expect("tempdir");
        let workdir = base.path().join("sessions/s1");
        tokio::fs::create_dir_all(&workdir).await.expect("mkdir");
        init_repo(&workdir).await;
        tokio::fs::write(workdir.join("feature.txt"), b"feature")
            .await
            .expect("write feature file");
        run_git(&workdir, ["add", "."], None).await.expect("add");
        run_git(&workdir, ["commit", "-m", "feature work"], None)
            .await
            .expect("commit");

        let backend = LocalBackend::new(base.path().to_path_buf());
        let session = record();
        let handle = backend
            .create_pull_request(&session, CreatePullRequestOptions::default())
            .await
            .expect("create ok");
        assert_eq!(handle.id, "pr/s1");

        let status_before = backend.get_status(&session).await.expect("status ok");
        assert_eq!(status_before.status, RemoteStatus::Open);

        let outcome = backend.merge_pull_request(&session).await.expect("merge ok");
        assert!(outcome.commit_hash.is_some());

        let status_after = backend.get_status(&session).await.expect("status ok");
        assert_eq!(status_after.status, RemoteStatus::Merged);
    }
}
