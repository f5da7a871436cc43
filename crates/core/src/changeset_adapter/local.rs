//! Local changeset adapter: derives a [`Changeset`] view purely from `git`
//! ref/log state in the session workdir, with no external service.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::changeset_adapter::{
    ChangesetAdapter, ChangesetFilter, CreateChangesetOptions, Feature, MergeOptions, SearchScope,
    UpdateChangesetOptions,
};
use crate::domain::changeset::{Author, Changeset, ChangesetMetadata, ChangesetStatus, Commit};
use crate::error::{Error, Result};
use crate::git_process::{run_git, run_git_lines};

const DEFAULT_TARGET_BRANCH: &str = "main";

pub struct LocalChangesetAdapter {
    workdir: PathBuf,
}

impl LocalChangesetAdapter {
    #[must_use]
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    async fn commits_for(&self, branch: &str, target: &str) -> Result<Vec<Commit>> {
        let range = format!("{target}..{branch}");
        let lines = run_git_lines(
            &self.workdir,
            ["log", "--format=%H%x1f%s%x1f%an%x1f%ae%x1f%aI", &range],
            None,
        )
        .await
        .map_err(Error::from)?;

        lines
            .iter()
            .map(|line| {
                let mut fields = line.split('\x1f');
                let sha = fields.next().unwrap_or_default().to_string();
                let message = fields.next().unwrap_or_default().to_string();
                let author_name = fields.next().unwrap_or_default().to_string();
                let author_email = fields.next().unwrap_or_default().to_string();
                let authored_at = fields
                    .next()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);
                Commit {
                    sha,
                    message,
                    author: Author {
                        username: author_name,
                        email: Some(author_email),
                        display_name: None,
                    },
                    authored_at,
                }
            })
            .map(Ok)
            .collect()
    }

    /// Derives status by comparing `git merge-base <target> <branch>` to the
    /// branch's own tip — equal means the branch's history is already fully
    /// contained in target, i.e. merged.
    async fn status_for(&self, branch: &str, target: &str) -> Result<ChangesetStatus> {
        let merge_base = run_git(&self.workdir, ["merge-base", target, branch], None)
            .await
            .map_err(Error::from)?;
        let tip = run_git(&self.workdir, ["rev-parse", branch], None)
            .await
            .map_err(Error::from)?;
        Ok(if merge_base == tip {
            ChangesetStatus::Merged
        } else {
            ChangesetStatus::Open
        })
    }

    async fn changeset_for_branch(&self, branch: &str) -> Result<Changeset> {
        let target = DEFAULT_TARGET_BRANCH;
        let commits = self.commits_for(branch, target).await?;
        let status = self.status_for(branch, target).await?;
        let now = Utc::now();
        Ok(Changeset {
            id: branch.to_string(),
            platform: "local".to_string(),
            title: branch.trim_start_matches("pr/").to_string(),
            description: String::new(),
            author: Author {
                username: "local".to_string(),
                email: None,
                display_name: None,
            },
            status,
            target_branch: target.to_string(),
            source_branch: Some(branch.to_string()),
            commits,
            reviews: Vec::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: ChangesetMetadata::Local { merge_commit: None },
            session_name: None,
            task_id: None,
        })
    }
}

#[async_trait]
impl ChangesetAdapter for LocalChangesetAdapter {
    /// Enumerates refs whose names begin with `pr/`.
    async fn list(&self, filter: Option<&ChangesetFilter>) -> Result<Vec<Changeset>> {
        let branches = run_git_lines(
            &self.workdir,
            ["for-each-ref", "--format=%(refname:short)", "refs/heads/pr/*"],
            None,
        )
        .await
        .map_err(Error::from)?;

        let mut changesets = Vec::with_capacity(branches.len());
        for branch in branches {
            let changeset = self.changeset_for_branch(&branch).await?;
            if let Some(filter) = filter {
                if let Some(status) = filter.status {
                    if changeset.status != status {
                        continue;
                    }
                }
            }
            changesets.push(changeset);
        }
        Ok(changesets)
    }

    async fn get(&self, id: &str) -> Result<Option<Changeset>> {
        match self.changeset_for_branch(id).await {
            Ok(changeset) => Ok(Some(changeset)),
            Err(Error::TransientIo(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Post-list filter over title/commit messages; the local backend has
    /// no query language of its own to delegate to.
    async fn search(&self, query: &str, scope: &[SearchScope]) -> Result<Vec<Changeset>> {
        let all = self.list(None).await?;
        let query_lower = query.to_lowercase();
        Ok(all
            .into_iter()
            .filter(|c| {
                let title_match =
                    scope.contains(&SearchScope::Title) && c.title.to_lowercase().contains(&query_lower);
                let body_match = scope.contains(&SearchScope::Body)
                    && c.commits
                        .iter()
                        .any(|commit| commit.message.to_lowercase().contains(&query_lower));
                title_match || body_match
            })
            .collect())
    }

    async fn create(&self, opts: CreateChangesetOptions) -> Result<Changeset> {
        run_git(
            &self.workdir,
            ["branch", &opts.source_branch, "HEAD"],
            None,
        )
        .await
        .map_err(Error::from)?;
        let mut changeset = self.changeset_for_branch(&opts.source_branch).await?;
        changeset.title = opts.title;
        changeset.description = opts.description;
        changeset.target_branch = opts.target_branch;
        Ok(changeset)
    }

    /// Local changesets carry no remote metadata to patch; title/description
    /// only exist in the caller's own record of the changeset.
    async fn update(&self, id: &str, _patch: UpdateChangesetOptions) -> Result<Changeset> {
        self.changeset_for_branch(id).await
    }

    async fn merge(&self, id: &str, _opts: Option<MergeOptions>) -> Result<Changeset> {
        let target = DEFAULT_TARGET_BRANCH;
        run_git(&self.workdir, ["checkout", target], None)
            .await
            .map_err(Error::from)?;
        run_git(
            &self.workdir,
            ["merge", "--no-ff", "-m", &format!("Merge {id} into {target}"), id],
            None,
        )
        .await
        .map_err(Error::from)?;
        self.changeset_for_branch(id).await
    }

    async fn get_details(&self, id: &str) -> Result<Changeset> {
        self.changeset_for_branch(id).await
    }

    fn supports_feature(&self, feature: Feature) -> bool {
        matches!(feature, Feature::AutoMerge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(path: &std::path::Path) {
        run_git(path, ["init", "-q", "-b", "main"], None).await.expect("init");
        run_git(path, ["config", "user.email", "t@example.com"], None)
            .await
            .expect("email");
        run_git(path, ["config", "user.name", "Test"], None).await.expect("name");
        tokio::fs::write(path.join("a.txt"), b"base").await.expect("write");
        run_git(path, ["add", "."], None).await.expect("add");
        run_git(path, ["commit", "-m", "initial"], None).await.expect("commit");
    }

    #[tokio::test]
    async fn list_and_status_reflect_unmerged_branch() {
        let dir = tempfile::tempdir().expect("tempdir");
        init_repo(dir.path()).await;
        run_git(dir.path(), ["checkout", "-b", "pr/feature"], None)
            .await
            .expect("branch");
        tokio::fs::write(dir.path().join("feature.txt"), b"x")
            .await
            .expect("write");
        run_git(dir.path(), ["add", "."], None).await.expect("add");
        run_git(dir.path(), ["commit", "-m", "add feature"], None)
            .await
            .expect("commit");
        run_git(dir.path(), ["checkout", "main"], None).await.expect("checkout main");

        let adapter = LocalChangesetAdapter::new(dir.path().to_path_buf());
        let changesets = adapter.list(None).await.expect("list ok");
        assert_eq!(changesets.len(), 1);
        assert_eq!(changesets[0].status, ChangesetStatus::Open);
        assert_eq!(changesets[0].commits.len(), 1);
    }

    #[tokio::test]
    async fn merge_transitions_status_to_merged() {
        let dir = tempfile::tempdir().expect("tempdir");
        init_repo(dir.path()).await;
        run_git(dir.path(), ["checkout", "-b", "pr/feature"], None)
            .await
            .expect("branch");
        tokio::fs::write(dir.path().join("feature.txt"), b"x")
            .await
            .expect("write");
        run_git(dir.path(), ["add", "."], None).await.expect("add");
        run_git(dir.path(), ["commit", "-m", "add feature"], None)
            .await
            .expect("commit");

        let adapter = LocalChangesetAdapter::new(dir.path().to_path_buf());
        let merged = adapter.merge("pr/feature", None).await.expect("merge ok");
        assert_eq!(merged.status, ChangesetStatus::Merged);
    }

    #[tokio::test]
    async fn search_matches_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        init_repo(dir.path()).await;
        run_git(dir.path(), ["branch", "pr/fix-login", "HEAD"], None)
            .await
            .expect("branch");

        let adapter = LocalChangesetAdapter::new(dir.path().to_path_buf());
        let found = adapter
            .search("login", &[SearchScope::Title])
            .await
            .expect("search ok");
        assert_eq!(found.len(), 1);

        let missed = adapter
            .search("nonexistent", &[SearchScope::Title])
            .await
            .expect("search ok");
        assert!(missed.is_empty());
    }
}
