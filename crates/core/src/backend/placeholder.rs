//! Placeholder repository backend for platforms whose integration is
//! advertised but not yet implemented (GitLab and similar forges).
//!
//! Exists so [`crate::changeset_adapter`]'s dispatch-by-URL can recognize a
//! platform and report a clean [`crate::error::Error::NotImplemented`]
//! instead of silently falling through to the Local backend.

use async_trait::async_trait;

use crate::backend::{
    BackendKind, CreatePullRequestOptions, MergeOutcome, PullRequestHandle, PullRequestStatus,
    RepositoryBackend, UpdatePullRequestOptions,
};
use crate::domain::session::SessionRecord;
use crate::error::{Error, Result};

pub struct PlaceholderBackend {
    platform: String,
}

impl PlaceholderBackend {
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    fn unimplemented(&self) -> Error {
        Error::NotImplemented(format!("{} repository backend", self.platform))
    }
}

#[async_trait]
impl RepositoryBackend for PlaceholderBackend {
    fn get_type(&self) -> BackendKind {
        BackendKind::Placeholder
    }

    async fn create_pull_request(
        &self,
        _session: &SessionRecord,
        _opts: CreatePullRequestOptions,
    ) -> Result<PullRequestHandle> {
        Err(self.unimplemented())
    }

    async fn update_pull_request(
        &self,
        _session: &SessionRecord,
        _opts: UpdatePullRequestOptions,
    ) -> Result<()> {
        Err(self.unimplemented())
    }

    async fn merge_pull_request(&self, _session: &SessionRecord) -> Result<MergeOutcome> {
        Err(self.unimplemented())
    }

    async fn approve_pull_request(&self, _session: &SessionRecord) -> Result<()> {
        Err(self.unimplemented())
    }

    async fn get_pull_request_diff(&self, _session: &SessionRecord) -> Result<String> {
        Err(self.unimplemented())
    }

    async fn get_status(&self, _session: &SessionRecord) -> Result<PullRequestStatus> {
        Err(self.unimplemented())
    }
}
