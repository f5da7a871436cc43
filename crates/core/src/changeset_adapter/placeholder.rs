//! Placeholder changeset adapter for forges recognized by URL (GitLab and
//! similar) but not yet integrated.
//!
//! This adapter advertises the full
//! feature matrix a mature forge integration would have, since the matrix
//! describes the platform's capabilities, not this crate's current
//! coverage of them. Callers must not treat `supports_feature` as a
//! readiness signal — every operation here fails with `NotImplemented`.

use async_trait::async_trait;

use crate::changeset_adapter::{
    ChangesetAdapter, ChangesetFilter, CreateChangesetOptions, Feature, MergeOptions, SearchScope,
    UpdateChangesetOptions,
};
use crate::domain::changeset::Changeset;
use crate::error::{Error, Result};

pub struct PlaceholderChangesetAdapter {
    platform: String,
}

impl PlaceholderChangesetAdapter {
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    fn unimplemented(&self) -> Error {
        Error::NotImplemented(format!("{} changeset adapter", self.platform))
    }
}

#[async_trait]
impl ChangesetAdapter for PlaceholderChangesetAdapter {
    async fn list(&self, _filter: Option<&ChangesetFilter>) -> Result<Vec<Changeset>> {
        Err(self.unimplemented())
    }

    async fn get(&self, _id: &str) -> Result<Option<Changeset>> {
        Err(self.unimplemented())
    }

    async fn search(&self, _query: &str, _scope: &[SearchScope]) -> Result<Vec<Changeset>> {
        Err(self.unimplemented())
    }

    async fn create(&self, _opts: CreateChangesetOptions) -> Result<Changeset> {
        Err(self.unimplemented())
    }

    async fn update(&self, _id: &str, _patch: UpdateChangesetOptions) -> Result<Changeset> {
        Err(self.unimplemented())
    }

    async fn merge(&self, _id: &str, _opts: Option<MergeOptions>) -> Result<Changeset> {
        Err(self.unimplemented())
    }

    async fn get_details(&self, _id: &str) -> Result<Changeset> {
        Err(self.unimplemented())
    }

    fn supports_feature(&self, _feature: Feature) -> bool {
        true
    }
}
