//! Session Store: a content-addressed mapping `session -> SessionRecord`
//! backed by a pluggable [`backend::StorageBackend`].
//!
//! The store itself holds no state beyond a backend handle and the base
//! directory used for path resolution — all persistence goes through the
//! backend, and all path computation goes through [`path::session_path`].

pub mod backend;
pub mod filter;
pub mod path;

use std::path::PathBuf;
use std::sync::Arc;

pub use backend::{StorageBackend, WriteReport};
pub use filter::SessionFilter;

use chrono::Utc;

use crate::domain::events::{DomainEvent, EventBus};
use crate::domain::session::{BackendType, PrState, PullRequestRef, SessionName, SessionRecord};
use crate::error::{Error, Result};
use crate::task::TaskId;

/// A partial update to a [`SessionRecord`]. `session` is deliberately
/// absent from this type — renaming a session's primary key through
/// `update` is structurally impossible, satisfying the invariant that
/// `update` never changes `get(s).session`.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub branch: Option<Option<String>>,
    pub pr_branch: Option<Option<String>>,
    pub pr_approved: Option<Option<bool>>,
    pub pr_state: Option<Option<PrState>>,
    pub backend_type: Option<Option<BackendType>>,
    pub pull_request: Option<Option<PullRequestRef>>,
    pub task_id: Option<Option<TaskId>>,
}

impl SessionPatch {
    /// Apply this patch to `record` in place. Fields left `None` in the
    /// patch are untouched on the record.
    pub fn apply(self, record: &mut SessionRecord) {
        if let Some(branch) = self.branch {
            record.branch = branch;
        }
        if let Some(pr_branch) = self.pr_branch {
            record.pr_branch = pr_branch;
        }
        if let Some(pr_approved) = self.pr_approved {
            record.pr_approved = pr_approved;
        }
        if let Some(pr_state) = self.pr_state {
            record.pr_state = pr_state;
        }
        if let Some(backend_type) = self.backend_type {
            record.backend_type = backend_type;
        }
        if let Some(pull_request) = self.pull_request {
            record.pull_request = pull_request;
        }
        if let Some(task_id) = self.task_id {
            record.task_id = task_id;
        }
    }
}

/// The Session Store: `session -> SessionRecord`, plus canonical workspace
/// path resolution.
///
/// `get_repo_path` is stable across process restarts for any persisted
/// session — it is a pure function of `base_dir` and the session name,
/// never of anything stored on the record itself.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    base_dir: PathBuf,
    events: EventBus,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, base_dir: PathBuf) -> Self {
        Self {
            backend,
            base_dir,
            events: EventBus::default(),
        }
    }

    /// Subscribe-able handle for session lifecycle events. Cloning the
    /// store's bus (rather than the store) is how a CLI/TUI would listen
    /// without holding a reference to the store itself.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Snapshot of every session. Iteration order is unspecified.
    pub async fn list(&self) -> Result<Vec<SessionRecord>> {
        self.backend.get_all(None).await
    }

    pub async fn get(&self, session: &SessionName) -> Result<Option<SessionRecord>> {
        self.backend.get(session).await
    }

    /// Find the record whose `task_id` normalizes to the same logical task
    /// as `task_id`, under any of the accepted textual forms.
    pub async fn get_by_task_id(&self, task_id: &TaskId) -> Result<Option<SessionRecord>> {
        let filter = SessionFilter {
            task_id: Some(task_id.clone()),
            ..SessionFilter::default()
        };
        Ok(self.backend.get_all(Some(&filter)).await?.into_iter().next())
    }

    /// Idempotent write of a new row. Fails on duplicate `session`.
    pub async fn add(&self, record: SessionRecord) -> Result<()> {
        if self.backend.exists(&record.session).await? {
            return Err(Error::Conflict(format!(
                "session already exists: {}",
                record.session
            )));
        }
        self.backend.create(&record).await?;
        self.events.publish(DomainEvent::SessionCreated {
            session: record.session,
            task_id: record.task_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Merge `patch` into the session's record. `session` is protected: no
    /// patch field can rename it. No-op (returns `Ok(None)`) if the session
    /// is absent.
    pub async fn update(
        &self,
        session: &SessionName,
        patch: SessionPatch,
    ) -> Result<Option<SessionRecord>> {
        self.backend.update(session, patch).await
    }

    /// Returns `true` iff a record was removed.
    pub async fn delete(&self, session: &SessionName) -> Result<bool> {
        let removed = self.backend.delete(session).await?;
        if removed {
            self.events.publish(DomainEvent::SessionDeleted {
                session: session.clone(),
                timestamp: Utc::now(),
            });
        }
        Ok(removed)
    }

    /// The canonical workspace path for `record`, independent of
    /// `record.repo_name` — see [`path::session_path`].
    #[must_use]
    pub fn get_repo_path(&self, record: &SessionRecord) -> PathBuf {
        path::session_path(&self.base_dir, record.session.as_str())
    }

    pub async fn get_session_workdir(&self, session: &SessionName) -> Result<Option<PathBuf>> {
        Ok(self.get(session).await?.map(|r| self.get_repo_path(&r)))
    }

    #[must_use]
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }
}
