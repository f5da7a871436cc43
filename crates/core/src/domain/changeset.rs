//! The platform-agnostic changeset projection and its per-platform metadata.
//!
//! A [`Changeset`] is never persisted by this crate — it is computed on
//! demand from a [`crate::backend::RepositoryBackend`] by a
//! [`crate::changeset_adapter`]. The only state the core persists about a
//! changeset lives on the owning [`crate::domain::SessionRecord`]:
//! `pr_branch`, `pr_approved`, `pr_state`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionName;
use crate::task::TaskId;

/// Lifecycle state of a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangesetStatus {
    Open,
    Merged,
    Closed,
    Draft,
}

/// Lifecycle state of an individual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    ChangesRequested,
    Dismissed,
}

/// The author of a changeset or commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One commit on a changeset's source branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: Author,
    pub authored_at: DateTime<Utc>,
}

/// One review submitted against a changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: Author,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// One comment on a changeset (issue-level, not a file comment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Per-platform metadata, modeled as a tagged union keyed by platform so
/// each back-end carries its own struct without forcing every other
/// platform's fields to exist as `None` on every changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ChangesetMetadata {
    Local {
        #[serde(skip_serializing_if = "Option::is_none")]
        merge_commit: Option<String>,
    },
    #[serde(rename = "github")]
    GitHub {
        pr_number: u64,
        node_id: String,
        html_url: String,
    },
    #[serde(rename = "gitlab")]
    GitLab { mr_iid: u64, web_url: String },
}

impl ChangesetMetadata {
    #[must_use]
    pub const fn platform(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::GitHub { .. } => "github",
            Self::GitLab { .. } => "gitlab",
        }
    }
}

/// Platform-agnostic projection of a change-proposal (pull/merge request,
/// or — locally — a `pr/<session>` branch with a prepared merge commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub id: String,
    pub platform: String,
    pub title: String,
    pub description: String,
    pub author: Author,
    pub status: ChangesetStatus,
    pub target_branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    pub commits: Vec<Commit>,
    pub reviews: Vec<Review>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: ChangesetMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<SessionName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl Changeset {
    /// `true` once at least one review carries [`ReviewStatus::Approved`].
    #[must_use]
    pub fn has_approval(&self) -> bool {
        self.reviews
            .iter()
            .any(|r| r.status == ReviewStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_tag_round_trips() {
        let meta = ChangesetMetadata::GitHub {
            pr_number: 42,
            node_id: "PR_abc".into(),
            html_url: "https://github.com/org/repo/pull/42".into(),
        };
        let json = serde_json::to_string(&meta).expect("serializes");
        assert!(json.contains("\"platform\":\"github\""));
        let back: ChangesetMetadata = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, meta);
        assert_eq!(back.platform(), "github");
    }

    #[test]
    fn has_approval_detects_approved_review() {
        let author = Author {
            username: "alice".into(),
            email: None,
            display_name: None,
        };
        let mut changeset = Changeset {
            id: "1".into(),
            platform: "local".into(),
            title: "t".into(),
            description: String::new(),
            author: author.clone(),
            status: ChangesetStatus::Open,
            target_branch: "main".into(),
            source_branch: Some("pr/s1".into()),
            commits: vec![],
            reviews: vec![],
            comments: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: ChangesetMetadata::Local { merge_commit: None },
            session_name: None,
            task_id: None,
        };
        assert!(!changeset.has_approval());
        changeset.reviews.push(Review {
            id: "r1".into(),
            author,
            status: ReviewStatus::Approved,
            body: None,
            submitted_at: Utc::now(),
        });
        assert!(changeset.has_approval());
    }
}
