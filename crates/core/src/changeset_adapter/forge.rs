//! GitHub changeset adapter: projects the forge's pull-request resources
//! into the platform-agnostic [`Changeset`] shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::backend::github::GitHubBackend;
use crate::changeset_adapter::{
    ChangesetAdapter, ChangesetFilter, CreateChangesetOptions, Feature, MergeOptions, SearchScope,
    UpdateChangesetOptions,
};
use crate::domain::changeset::{
    Author, Changeset, ChangesetMetadata, ChangesetStatus, Comment, Commit, Review, ReviewStatus,
};
use crate::error::{Error, Result};
use crate::uri::RepositoryUri;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "sessionforge";

pub struct GitHubChangesetAdapter {
    backend: GitHubBackend,
    repo: RepositoryUri,
}

impl GitHubChangesetAdapter {
    #[must_use]
    pub fn new(backend: GitHubBackend, repo: RepositoryUri) -> Self {
        Self { backend, repo }
    }

    fn owner_repo(&self) -> Result<(&str, &str)> {
        match (&self.repo.owner, &self.repo.repo) {
            (Some(owner), Some(repo)) => Ok((owner.as_str(), repo.as_str())),
            _ => Err(Error::InvalidInput(format!(
                "{:?} does not resolve to an owner/repo pair",
                self.repo.original
            ))),
        }
    }

    fn client(&self) -> &reqwest::Client {
        self.backend.http_client()
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.backend.token())
    }
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    merged: Option<bool>,
    draft: bool,
    html_url: String,
    head: RawRef,
    base: RawRef,
    user: RawUser,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    node_id: String,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    message: String,
    author: RawCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct RawCommitAuthor {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    id: u64,
    user: RawUser,
    state: String,
    body: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    user: RawUser,
    body: String,
    created_at: DateTime<Utc>,
}

fn review_status(state: &str) -> ReviewStatus {
    match state {
        "APPROVED" => ReviewStatus::Approved,
        "CHANGES_REQUESTED" => ReviewStatus::ChangesRequested,
        "DISMISSED" => ReviewStatus::Dismissed,
        _ => ReviewStatus::Pending,
    }
}

impl RawPull {
    fn into_changeset(self, commits: Vec<Commit>, reviews: Vec<Review>, comments: Vec<Comment>) -> Changeset {
        let status = if self.merged.unwrap_or(false) {
            ChangesetStatus::Merged
        } else if self.draft {
            ChangesetStatus::Draft
        } else if self.state == "closed" {
            ChangesetStatus::Closed
        } else {
            ChangesetStatus::Open
        };

        Changeset {
            id: self.number.to_string(),
            platform: "github".to_string(),
            title: self.title,
            description: self.body.unwrap_or_default(),
            author: Author {
                username: self.user.login,
                email: None,
                display_name: None,
            },
            status,
            target_branch: self.base.reference,
            source_branch: Some(self.head.reference),
            commits,
            reviews,
            comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: ChangesetMetadata::GitHub {
                pr_number: self.number,
                node_id: self.node_id,
                html_url: self.html_url,
            },
            session_name: None,
            task_id: None,
        }
    }
}

#[async_trait]
impl ChangesetAdapter for GitHubChangesetAdapter {
    /// Pagination uses the forge default (GitHub's page size of 30).
    async fn list(&self, filter: Option<&ChangesetFilter>) -> Result<Vec<Changeset>> {
        let (owner, repo) = self.owner_repo()?;
        let raw: Vec<RawPull> = self
            .client()
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .query(&[("state", "all")])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json()
            .await?;

        let mut changesets = Vec::with_capacity(raw.len());
        for pull in raw {
            let changeset = pull.into_changeset(Vec::new(), Vec::new(), Vec::new());
            if let Some(filter) = filter {
                if let Some(status) = filter.status {
                    if changeset.status != status {
                        continue;
                    }
                }
                if let Some(author) = &filter.author {
                    if &changeset.author.username != author {
                        continue;
                    }
                }
            }
            changesets.push(changeset);
        }
        Ok(changesets)
    }

    async fn get(&self, id: &str) -> Result<Option<Changeset>> {
        match self.get_details(id).await {
            Ok(changeset) => Ok(Some(changeset)),
            Err(Error::BackendUnavailable(_) | Error::TransientIo(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Uses GitHub's search query language scoped to `in:title`/`in:body`/
    /// `in:comments` as requested.
    async fn search(&self, query: &str, scope: &[SearchScope]) -> Result<Vec<Changeset>> {
        let (owner, repo) = self.owner_repo()?;
        let scope_qualifiers: Vec<&str> = scope
            .iter()
            .map(|s| match s {
                SearchScope::Title => "in:title",
                SearchScope::Body => "in:body",
                SearchScope::Comments => "in:comments",
            })
            .collect();
        let full_query = format!(
            "repo:{owner}/{repo} type:pr {query} {}",
            scope_qualifiers.join(" ")
        );

        #[derive(Deserialize)]
        struct SearchResponse {
            items: Vec<RawPull>,
        }

        let response: SearchResponse = self
            .client()
            .get(format!("{API_BASE}/search/issues"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .query(&[("q", full_query.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json()
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|pull| pull.into_changeset(Vec::new(), Vec::new(), Vec::new()))
            .collect())
    }

    async fn create(&self, opts: CreateChangesetOptions) -> Result<Changeset> {
        let (owner, repo) = self.owner_repo()?;
        let pull: RawPull = self
            .client()
            .post(format!("{API_BASE}/repos/{owner}/{repo}/pulls"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&serde_json::json!({
                "title": opts.title,
                "body": opts.description,
                "head": opts.source_branch,
                "base": opts.target_branch,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json()
            .await?;
        Ok(pull.into_changeset(Vec::new(), Vec::new(), Vec::new()))
    }

    async fn update(&self, id: &str, patch: UpdateChangesetOptions) -> Result<Changeset> {
        let (owner, repo) = self.owner_repo()?;
        let mut body = serde_json::Map::new();
        if let Some(title) = patch.title {
            body.insert("title".to_string(), serde_json::Value::String(title));
        }
        if let Some(description) = patch.description {
            body.insert("body".to_string(), serde_json::Value::String(description));
        }

        let pull: RawPull = self
            .client()
            .patch(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{id}"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?
            .json()
            .await?;
        Ok(pull.into_changeset(Vec::new(), Vec::new(), Vec::new()))
    }

    async fn merge(&self, id: &str, opts: Option<MergeOptions>) -> Result<Changeset> {
        let (owner, repo) = self.owner_repo()?;
        let commit_message = opts.and_then(|o| o.commit_message).unwrap_or_default();

        self.client()
            .put(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{id}/merge"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .json(&serde_json::json!({
                "merge_method": "merge",
                "commit_message": commit_message,
            }))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::from)?;

        self.get_details(id).await
    }

    /// Reviews and commits are fetched in parallel.
    async fn get_details(&self, id: &str) -> Result<Changeset> {
        let (owner, repo) = self.owner_repo()?;

        let pull_request = self
            .client()
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{id}"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .send();
        let commits_request = self
            .client()
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{id}/commits"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .send();
        let reviews_request = self
            .client()
            .get(format!("{API_BASE}/repos/{owner}/{repo}/pulls/{id}/reviews"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .send();
        let comments_request = self
            .client()
            .get(format!("{API_BASE}/repos/{owner}/{repo}/issues/{id}/comments"))
            .header("Authorization", self.auth_header())
            .header("User-Agent", USER_AGENT)
            .send();

        let (pull_response, commits_response, reviews_response, comments_response) = tokio::try_join!(
            pull_request,
            commits_request,
            reviews_request,
            comments_request
        )?;

        let pull: RawPull = pull_response.error_for_status().map_err(Error::from)?.json().await?;
        let raw_commits: Vec<RawCommit> =
            commits_response.error_for_status().map_err(Error::from)?.json().await?;
        let raw_reviews: Vec<RawReview> =
            reviews_response.error_for_status().map_err(Error::from)?.json().await?;
        let raw_comments: Vec<RawComment> =
            comments_response.error_for_status().map_err(Error::from)?.json().await?;

        let commits = raw_commits
            .into_iter()
            .map(|c| Commit {
                sha: c.sha,
                message: c.commit.message,
                author: Author {
                    username: c.commit.author.name,
                    email: Some(c.commit.author.email),
                    display_name: None,
                },
                authored_at: c.commit.author.date,
            })
            .collect();

        let reviews = raw_reviews
            .into_iter()
            .map(|r| Review {
                id: r.id.to_string(),
                author: Author {
                    username: r.user.login,
                    email: None,
                    display_name: None,
                },
                status: review_status(&r.state),
                body: r.body,
                submitted_at: r.submitted_at.unwrap_or_else(Utc::now),
            })
            .collect();

        let comments = raw_comments
            .into_iter()
            .map(|c| Comment {
                id: c.id.to_string(),
                author: Author {
                    username: c.user.login,
                    email: None,
                    display_name: None,
                },
                body: c.body,
                created_at: c.created_at,
            })
            .collect();

        Ok(pull.into_changeset(commits, reviews, comments))
    }

    fn supports_feature(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::ApprovalWorkflow
                | Feature::DraftChangesets
                | Feature::FileComments
                | Feature::SuggestedChanges
                | Feature::AutoMerge
                | Feature::BranchProtection
                | Feature::StatusChecks
                | Feature::AssigneeManagement
                | Feature::LabelManagement
                | Feature::MilestoneTracking
        )
    }
}
