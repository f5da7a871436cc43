//! Changeset Adapter: the uniform, platform-agnostic view built on top of
//! [`crate::backend::RepositoryBackend`].
//!
//! Factory selection (`select_adapter`) is driven entirely by the
//! repository URL: a `github.com` host gets the forge adapter, a GitLab
//! marker gets the placeholder adapter, anything else gets the local
//! adapter. Every adapter answers [`ChangesetAdapter::supports_feature`]
//! statically — callers must not read that as a readiness signal for an
//! adapter whose operations are still `NotImplemented`.

pub mod forge;
pub mod local;
pub mod placeholder;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::github::GitHubBackend;
use crate::domain::changeset::{Changeset, ChangesetStatus};
use crate::error::Result;
use crate::uri;

/// The explicit feature enumeration every adapter answers statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    ApprovalWorkflow,
    DraftChangesets,
    FileComments,
    SuggestedChanges,
    AutoMerge,
    BranchProtection,
    StatusChecks,
    AssigneeManagement,
    LabelManagement,
    MilestoneTracking,
}

/// Scope for `search`'s query-language matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Title,
    Body,
    Comments,
}

#[derive(Debug, Clone, Default)]
pub struct ChangesetFilter {
    pub status: Option<ChangesetStatus>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateChangesetOptions {
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateChangesetOptions {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub commit_message: Option<String>,
}

/// The uniform interface every changeset adapter exposes over its
/// underlying [`crate::backend::RepositoryBackend`].
#[async_trait]
pub trait ChangesetAdapter: Send + Sync {
    async fn list(&self, filter: Option<&ChangesetFilter>) -> Result<Vec<Changeset>>;
    async fn get(&self, id: &str) -> Result<Option<Changeset>>;
    async fn search(&self, query: &str, scope: &[SearchScope]) -> Result<Vec<Changeset>>;
    async fn create(&self, opts: CreateChangesetOptions) -> Result<Changeset>;
    async fn update(&self, id: &str, patch: UpdateChangesetOptions) -> Result<Changeset>;
    async fn merge(&self, id: &str, opts: Option<MergeOptions>) -> Result<Changeset>;
    async fn get_details(&self, id: &str) -> Result<Changeset>;
    fn supports_feature(&self, feature: Feature) -> bool;
}

fn is_gitlab_marker(url: &str) -> bool {
    url.contains("gitlab.com") || url.contains("gitlab.")
}

/// `canHandle(url)`: host containing `github.com` selects the forge
/// adapter, a GitLab marker selects the placeholder adapter, anything
/// else selects the local adapter.
#[must_use]
pub fn select_adapter(repo_url: &str, base_dir: PathBuf) -> Result<Arc<dyn ChangesetAdapter>> {
    let parsed = uri::parse(repo_url);

    if parsed.host.as_deref().is_some_and(|h| h.contains("github.com")) {
        let backend = GitHubBackend::from_env()?;
        return Ok(Arc::new(forge::GitHubChangesetAdapter::new(backend, parsed)));
    }

    if is_gitlab_marker(repo_url) {
        return Ok(Arc::new(placeholder::PlaceholderChangesetAdapter::new("gitlab")));
    }

    Ok(Arc::new(local::LocalChangesetAdapter::new(base_dir)))
}
