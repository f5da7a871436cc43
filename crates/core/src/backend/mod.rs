//! Repository Backend: the capability set a session's hosting platform
//! exposes, independent of how a changeset is ultimately represented there.
//!
//! [`crate::changeset_adapter`] is the caller-facing, platform-agnostic view
//! built on top of this trait; this module is the thin capability surface
//! each platform actually implements.

pub mod github;
pub mod local;
pub mod placeholder;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::session::SessionRecord;
use crate::error::Result;

/// Which concrete `RepositoryBackend` a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Forge,
    Placeholder,
}

#[derive(Debug, Clone, Default)]
pub struct CreatePullRequestOptions {
    pub title: String,
    pub description: String,
    pub target_branch: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePullRequestOptions {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestHandle {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub commit_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestStatus {
    pub status: RemoteStatus,
    pub approved: bool,
}

/// The capability set every repository backend implements: create, read,
/// approve, and merge a change-proposal against a session's branch.
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    fn get_type(&self) -> BackendKind;

    async fn create_pull_request(
        &self,
        session: &SessionRecord,
        opts: CreatePullRequestOptions,
    ) -> Result<PullRequestHandle>;

    async fn update_pull_request(
        &self,
        session: &SessionRecord,
        opts: UpdatePullRequestOptions,
    ) -> Result<()>;

    async fn merge_pull_request(&self, session: &SessionRecord) -> Result<MergeOutcome>;

    async fn approve_pull_request(&self, session: &SessionRecord) -> Result<()>;

    async fn get_pull_request_diff(&self, session: &SessionRecord) -> Result<String>;

    async fn get_status(&self, session: &SessionRecord) -> Result<PullRequestStatus>;
}

fn is_gitlab_marker(url: &str) -> bool {
    url.contains("gitlab.com") || url.contains("gitlab.")
}

/// Select the `RepositoryBackend` for a repo URL, using the same
/// dispatch rule as [`crate::changeset_adapter::select_adapter`]: a
/// `github.com` host gets the forge backend, a GitLab marker gets the
/// placeholder, anything else gets the local backend.
pub fn select_backend(repo_url: &str, base_dir: PathBuf) -> Result<Arc<dyn RepositoryBackend>> {
    let parsed = crate::uri::parse(repo_url);

    if parsed.host.as_deref().is_some_and(|h| h.contains("github.com")) {
        return Ok(Arc::new(github::GitHubBackend::from_env()?));
    }

    if is_gitlab_marker(repo_url) {
        return Ok(Arc::new(placeholder::PlaceholderBackend::new("gitlab")));
    }

    Ok(Arc::new(local::LocalBackend::new(base_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_url_selects_forge_backend() {
        std::env::set_var("GITHUB_TOKEN", "test-token");
        let backend = select_backend("https://github.com/org/repo", PathBuf::from("/base"))
            .expect("selects");
        assert_eq!(backend.get_type(), BackendKind::Forge);
        std::env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn gitlab_marker_selects_placeholder_backend() {
        let backend =
            select_backend("https://gitlab.com/org/repo", PathBuf::from("/base")).expect("selects");
        assert_eq!(backend.get_type(), BackendKind::Placeholder);
    }

    #[test]
    fn local_path_selects_local_backend() {
        let backend = select_backend("org/repo", PathBuf::from("/base")).expect("selects");
        assert_eq!(backend.get_type(), BackendKind::Local);
    }
}
