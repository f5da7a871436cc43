//! Session record: the persistent shape of a task-scoped workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// Errors from constructing a [`SessionName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionNameError {
    #[error("session name must not be empty")]
    Empty,
    #[error("session name must start with a letter")]
    MustStartWithLetter,
    #[error("session name must contain only alphanumeric characters, '-', or '_'")]
    InvalidCharacters,
    #[error("session name must be at most {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

const SESSION_NAME_MAX_LEN: usize = 64;

/// A validated session name: the primary key of a [`SessionRecord`].
///
/// Must start with a letter and contain only alphanumeric characters,
/// `-`, or `_`, up to 64 characters — parsed once at the boundary so the
/// rest of the core can treat it as already-valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionName(String);

impl SessionName {
    /// # Errors
    ///
    /// Returns [`SessionNameError`] if the name is empty, doesn't start
    /// with a letter, contains characters other than alphanumeric/`-`/`_`,
    /// or exceeds 64 characters.
    pub fn parse(input: impl Into<String>) -> Result<Self, SessionNameError> {
        let input = input.into();
        if input.is_empty() {
            return Err(SessionNameError::Empty);
        }
        if input.len() > SESSION_NAME_MAX_LEN {
            return Err(SessionNameError::TooLong {
                max: SESSION_NAME_MAX_LEN,
                actual: input.len(),
            });
        }
        let mut chars = input.chars();
        let first = chars.next().ok_or(SessionNameError::Empty)?;
        if !first.is_ascii_alphabetic() {
            return Err(SessionNameError::MustStartWithLetter);
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SessionNameError::InvalidCharacters);
        }
        Ok(Self(input))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionName {
    type Error = SessionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionName> for String {
    fn from(name: SessionName) -> Self {
        name.0
    }
}

/// Which hosting back-end a session's changeset lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Local,
    GitHub,
    GitLab,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::GitHub => write!(f, "github"),
            Self::GitLab => write!(f, "gitlab"),
        }
    }
}

/// The prepared-changeset-branch bookkeeping attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrState {
    pub branch_name: String,
    pub exists: bool,
    pub last_checked: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

/// A platform-specific pull/merge-request handle, opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub platform: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The persistent shape of a task-scoped session.
///
/// `session` is the primary key and is immutable after creation; every
/// other field is mutated only through the session store's `update`
/// operation, which refuses to rename `session` (see `store::SessionStore`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: SessionName,
    pub repo_name: String,
    pub repo_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_branch: Option<String>,
    /// Must be strictly `true` (not merely truthy) to permit merge; see
    /// the Approval/Merge Engine's guard 3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_state: Option<PrState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<BackendType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestRef>,
}

impl SessionRecord {
    /// Construct a freshly-created session record with no changeset yet.
    #[must_use]
    pub fn new(session: SessionName, repo_name: String, repo_url: String) -> Self {
        Self {
            session,
            repo_name,
            repo_url,
            created_at: Utc::now(),
            task_id: None,
            branch: None,
            pr_branch: None,
            pr_approved: None,
            pr_state: None,
            backend_type: None,
            pull_request: None,
        }
    }
}

/// The on-disk representation of the session store's state: the object
/// form the current backends always write, which readers accept alongside
/// the legacy bare-array form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDbState {
    pub sessions: Vec<SessionRecord>,
    pub base_dir: String,
}
