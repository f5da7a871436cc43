//! Task identifier canonicalization and the fixed task status vocabulary.
//!
//! This module is the shared vocabulary the rest of the core exchanges with
//! the external task-body backend (out of scope here, see
//! [`crate::task::TaskStore`]). It owns exactly two things: parsing/
//! normalizing a [`TaskId`] from any accepted textual form, and the fixed
//! [`TaskStatus`] enumeration with its markdown checkbox rendering.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur while parsing a [`TaskId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskIdError {
    #[error("task id must contain a decimal number: {0:?}")]
    NotANumber(String),
    #[error("task id is empty")]
    Empty,
}

/// A canonicalized task identifier: `"#" + digits`, with an optional
/// backend qualifier rendered as `"<backend>#<n>"`.
///
/// Normalization strips a leading `#`, parses the remainder as an integer
/// (which incidentally collapses leading zeros — `"023"` and `"23"` parse
/// to the same [`u64`]), and re-prefixes with `#`. Whether two `TaskId`s
/// with different backend qualifiers refer to the same logical task is a
/// decision left to the backend; this type only guarantees that
/// `"1"`, `"#1"`, `"#001"` and `" 1 "` all parse to an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    backend: Option<String>,
    number: u64,
}

impl TaskId {
    /// Construct a `TaskId` directly from a number, with no backend qualifier.
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self {
            backend: None,
            number,
        }
    }

    /// Construct a `TaskId` qualified by a backend (`"md#123"`).
    #[must_use]
    pub fn with_backend(backend: impl Into<String>, number: u64) -> Self {
        Self {
            backend: Some(backend.into()),
            number,
        }
    }

    /// Parse any of the accepted textual forms.
    ///
    /// # Errors
    ///
    /// Returns [`TaskIdError`] if the input is empty or contains no decimal
    /// number.
    pub fn parse(input: &str) -> Result<Self, TaskIdError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TaskIdError::Empty);
        }

        let (backend, number_part) = match trimmed.split_once('#') {
            Some((before, after)) if !before.is_empty() => (Some(before.to_string()), after),
            Some((_, after)) => (None, after),
            None => (None, trimmed),
        };

        let digits = number_part.trim_start_matches('#').trim();
        let number = digits
            .parse::<u64>()
            .map_err(|_| TaskIdError::NotANumber(trimmed.to_string()))?;

        Ok(Self { backend, number })
    }

    /// The backend qualifier, if any (e.g. `"md"` in `"md#123"`).
    #[must_use]
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// The numeric part of the identifier.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Canonical rendering used for lookups and display.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Some(backend) => write!(f, "{backend}#{}", self.number),
            None => write!(f, "#{}", self.number),
        }
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// The fixed task status enumeration.
///
/// Rendered in markdown checkboxes as documented per variant; `BLOCKED` and
/// `CLOSED` use custom markers since a two-state checkbox cannot represent
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Done,
    Blocked,
    Closed,
}

impl TaskStatus {
    /// The markdown checkbox marker for this status.
    #[must_use]
    pub const fn checkbox(self) -> &'static str {
        match self {
            Self::Todo => "[ ]",
            Self::InProgress => "[-]",
            Self::InReview => "[+]",
            Self::Done => "[x]",
            Self::Blocked => "[!]",
            Self::Closed => "[x]",
        }
    }

    /// Canonical wire name (`"TODO"`, `"IN-PROGRESS"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN-PROGRESS",
            Self::InReview => "IN-REVIEW",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as the external task-body backend would hand it to us.
///
/// The markdown task-body backend is out of scope for this crate; this
/// struct and the [`TaskStore`] trait exist only so the Approval/Merge
/// Engine's task-status coupling can be exercised against a real, if
/// minimal, collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
}

/// The external task-store collaborator. Interface only: no markdown-backed
/// implementation ships with this crate.
pub trait TaskStore: Send + Sync {
    fn get_task(&self, id: &TaskId) -> Option<Task>;
    fn get_task_status(&self, id: &TaskId) -> Option<TaskStatus>;
    /// Returns `true` if a task existed and its status was updated.
    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> bool;
}

/// A `TaskStore` that has no tasks and silently no-ops every write.
///
/// Used as the default collaborator so the Approval/Merge Engine can run
/// without a task backend configured; task-status coupling failures are
/// then surfaced only as a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTaskStore;

impl TaskStore for NullTaskStore {
    fn get_task(&self, _id: &TaskId) -> Option<Task> {
        None
    }

    fn get_task_status(&self, _id: &TaskId) -> Option<TaskStatus> {
        None
    }

    fn set_task_status(&self, _id: &TaskId, _status: TaskStatus) -> bool {
        false
    }
}

/// An in-memory `TaskStore`, useful for tests that need the coupling to
/// actually observe a transition.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: std::sync::Mutex<std::collections::HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).insert(task.id.clone(), task);
    }
}

impl TaskStore for InMemoryTaskStore {
    fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    fn get_task_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.get_task(id).map(|t| t.status)
    }

    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = tasks.get_mut(id) {
            task.status = status;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_forms_normalize_equal() {
        let forms = ["1", "#1", "md#001", "1 ", "#0000001"];
        let plain: Vec<_> = forms[..4]
            .iter()
            .filter(|f| !f.starts_with("md"))
            .map(|f| TaskId::parse(f).expect("parses"))
            .collect();
        for pair in plain.windows(2) {
            assert_eq!(pair[0].number(), pair[1].number());
        }
        let qualified = TaskId::parse("md#001").expect("parses");
        assert_eq!(qualified.number(), 1);
        assert_eq!(qualified.backend(), Some("md"));
    }

    #[test]
    fn idempotent_normalization() {
        for input in ["23", "#23", "#023", " #23 "] {
            let once = TaskId::parse(input).expect("parses");
            let twice = TaskId::parse(&once.canonical()).expect("parses");
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn canonical_rendering() {
        assert_eq!(TaskId::new(23).canonical(), "#23");
        assert_eq!(TaskId::with_backend("md", 23).canonical(), "md#23");
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(matches!(TaskId::parse("abc"), Err(TaskIdError::NotANumber(_))));
        assert!(matches!(TaskId::parse(""), Err(TaskIdError::Empty)));
    }

    #[test]
    fn checkbox_markers() {
        assert_eq!(TaskStatus::Todo.checkbox(), "[ ]");
        assert_eq!(TaskStatus::InProgress.checkbox(), "[-]");
        assert_eq!(TaskStatus::InReview.checkbox(), "[+]");
        assert_eq!(TaskStatus::Done.checkbox(), "[x]");
    }

    #[test]
    fn null_store_always_absent() {
        let store = NullTaskStore;
        assert!(store.get_task(&TaskId::new(1)).is_none());
        assert!(!store.set_task_status(&TaskId::new(1), TaskStatus::Done));
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryTaskStore::new();
        let id = TaskId::new(7);
        store.insert(Task {
            id: id.clone(),
            title: "do the thing".into(),
            status: TaskStatus::Todo,
        });
        assert!(store.set_task_status(&id, TaskStatus::InReview));
        assert_eq!(store.get_task_status(&id), Some(TaskStatus::InReview));
    }
}
