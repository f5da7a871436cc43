//! Forge repository backend: GitHub's REST API over `reqwest`.
//!
//! Credentials are read once at construction from `GITHUB_TOKEN` or, failing
//! that, `GH_TOKEN` — never re-read per call, so a backend instance has a
//! fixed identity for its whole lifetime.

use std::env;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{
    BackendKind, CreatePullRequestOptions, MergeOutcome, PullRequestHandle, PullRequestStatus,
    RemoteStatus, RepositoryBackend, UpdatePullRequestOptions,
};
use crate::domain::session::SessionRecord;
use crate::error::{Error, Result};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "sessionforge";

/// Reads `GITHUB_TOKEN`, falling back to `GH_TOKEN`.
///
/// # Errors
///
/// Returns [`Error::BackendUnavailable`] if neither variable is set.
pub fn read_token_from_env() -> Result<String> {
    env::var("GITHUB_TOKEN").or_else(|_| env::var("GH_TOKEN")).map_err(|_| {
        Error::BackendUnavailable(
            "no GitHub credential found in GITHUB_TOKEN or GH_TOKEN".to_string(),
        )
    })
}

pub struct GitHubBackend {
    client: reqwest::Client,
    token: String,
}

impl GitHubBackend {
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if no credential is configured.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(read_token_from_env()?))
    }

    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Exposes the underlying client/credential to
    /// [`crate::changeset_adapter::forge`], which issues its own requests
    /// against endpoints `RepositoryBackend` doesn't cover (search, reviews,
    /// comments, listing).
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Split `org/repo` into its two path segments.
    fn owner_and_repo(session: &SessionRecord) -> Result<(&str, &str)> {
        session.repo_name.split_once('/').ok_or_else(|| {
            Error::InvalidInput(format!(
                "repo_name {:?} is not in 'owner/repo' form",
                session.repo_name
            ))
        })
    }

    fn pr_number(session: &SessionRecord) -> Result<u64> {
        let pr = session
            .pull_request
            .as_ref()
            .ok_or_else(|| Error::not_found("pull request", session.session.to_string()))?;
        pr.id
            .parse::<u64>()
            .map_err(|_| Error::InvalidInput(format!("pull request id {:?} is not numeric", pr.id)))
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestDetail {
    merged: bool,
    state: String,
}

#[async_trait]
impl RepositoryBackend for GitHubBackend {
    fn get_type(&self) -> BackendKind {
        BackendKind::Forge
    }

    async fn create_pull_request(
        &self,
        session: &SessionRecord,
        opts: CreatePullRequestOptions,
    ) -> Result<PullRequestHandle> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let head = session
            .pr_branch
            .clone()
            .unwrap_or_else(|| format!("pr/{}", session.session));

        let response = self
            .client
            .post(format!("{API_BASE}/repos/{owner}/{repo}/pulls"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&serde_json::json!({
                "title": opts.title,
                "body": opts.description,
                "head": head,
                "base": opts.target_branch,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json::<PullRequestResponse>()
            .await?;

        Ok(PullRequestHandle {
            id: response.number.to_string(),
            url: Some(response.html_url),
        })
    }

    async fn update_pull_request(
        &self,
        session: &SessionRecord,
        opts: UpdatePullRequestOptions,
    ) -> Result<()> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let number = Self::pr_number(session)?;

        let mut body = serde_json::Map::new();
        if let Some(title) = opts.title {
            body.insert("title".to_string(), serde_json::Value::String(title));
        }
        if let Some(description) = opts.description {
            body.insert("body".to_string(), serde_json::Value::String(description));
        }

        self.client
            .patch(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{number}"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?;
        Ok(())
    }

    async fn merge_pull_request(&self, session: &SessionRecord) -> Result<MergeOutcome> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let number = Self::pr_number(session)?;

        #[derive(Deserialize)]
        struct MergeResponse {
            sha: String,
        }

        let response = self
            .client
            .put(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{number}/merge"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&serde_json::json!({ "merge_method": "merge" }))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json::<MergeResponse>()
            .await?;

        Ok(MergeOutcome {
            commit_hash: Some(response.sha),
        })
    }

    /// Submits a review of kind `"APPROVE"` on the pull request.
    async fn approve_pull_request(&self, session: &SessionRecord) -> Result<()> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let number = Self::pr_number(session)?;

        self.client
            .post(format!(
                "{API_BASE}/repos/{owner}/{repo}/pulls/{number}/reviews"
            ))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&serde_json::json!({ "event": "APPROVE" }))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?;
        Ok(())
    }

    async fn get_pull_request_diff(&self, session: &SessionRecord) -> Result<String> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let number = Self::pr_number(session)?;

        let diff = self
            .client
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{number}"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github.diff")
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .text()
            .await?;
        Ok(diff)
    }

    async fn get_status(&self, session: &SessionRecord) -> Result<PullRequestStatus> {
        let (owner, repo) = Self::owner_and_repo(session)?;
        let number = Self::pr_number(session)?;

        let detail = self
            .client
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{number}"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json::<PullRequestDetail>()
            .await?;

        let status = if detail.merged {
            RemoteStatus::Merged
        } else if detail.state == "closed" {
            RemoteStatus::Closed
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
    use crate::domain::session::{PullRequestRef, SessionName};

    fn session_with_repo(repo_name: &str) -> SessionRecord {
        SessionRecord::new(
            SessionName::parse("s1").expect("valid"),
            repo_name.to_string(),
            "https://example.com".to_string(),
        )
    }

    #[test]
    fn owner_and_repo_splits_on_slash() {
        let session = session_with_repo("octocat/hello-world");
        let (owner, repo) = GitHubBackend::owner_and_repo(&session).expect("split ok");
        assert_eq!(owner, "octocat");
        assert_eq!(repo, "hello-world");
    }

    #[test]
    fn owner_and_repo_rejects_missing_slash() {
        let session = session_with_repo("not-a-valid-repo-name");
        assert!(GitHubBackend::owner_and_repo(&session).is_err());
    }

    #[test]
    fn pr_number_requires_numeric_id() {
        let mut session = session_with_repo("octocat/hello-world");
        session.pull_request = Some(PullRequestRef {
            platform: "github".to_string(),
            id: "not-a-number".to_string(),
            url: None,
        });
        assert!(GitHubBackend::pr_number(&session).is_err());
    }

    #[test]
    fn pr_number_parses_valid_id() {
        let mut session = session_with_repo("octocat/hello-world");
        session.pull_request = Some(PullRequestRef {
            platform: "github".to_string(),
            id: "42".to_string(),
            url: None,
        });
        assert_eq!(GitHubBackend::pr_number(&session).expect("parses"), 42);
    }
}
