//! Approval/Merge Engine: the core's one state machine.
//!
//! Virtual states, derived from the record rather than stored explicitly:
//! `NoPR -> PRCreated -> PRApproved -> PRMerged`, with `PRClosed` reachable
//! from any non-merged state (closing is the changeset adapter's concern,
//! not this engine's — see [`crate::changeset_adapter`]).
//!
//! Every caller that performs a merge goes through [`ApprovalEngine::merge`];
//! no adapter is allowed to short-circuit its guards. That is the single
//! most important invariant of the core.

use std::sync::Arc;

use chrono::Utc;

use crate::backend::{BackendKind, RepositoryBackend};
use crate::domain::events::{DomainEvent, EventBus};
use crate::domain::session::{PrState, SessionName, SessionRecord};
use crate::error::{Error, Result};
use crate::store::{SessionPatch, SessionStore};
use crate::task::{TaskStatus, TaskStore};

/// Narrow error taxonomy for the three merge guards and the create
/// precondition; converted into [`Error::ValidationFailure`] at the
/// module boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("session {0} already has an open change proposal")]
    ProposalAlreadyExists(SessionName),
    #[error("session {0} has no change proposal")]
    NoProposal(SessionName),
    #[error("session {0}'s change proposal is not approved")]
    NotApproved(SessionName),
    /// Reserved for a `prApproved` value that is truthy but not strictly
    /// `true`. Unreachable through this crate's typed `Option<bool>`
    /// record field — see DESIGN.md for why that's the deliberate,
    /// spec-endorsed outcome rather than a gap.
    #[error("session {0}'s approval flag is present but not strictly true")]
    InvalidApprovalState(SessionName),
}

impl From<ApprovalError> for Error {
    fn from(err: ApprovalError) -> Self {
        Self::ValidationFailure(err.to_string())
    }
}

/// Options for [`ApprovalEngine::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub skip_task_transition: bool,
}

/// Drives the approval/merge state machine against a [`SessionStore`] and
/// an external [`TaskStore`]; the caller supplies the [`RepositoryBackend`]
/// for each call, since which backend applies is a per-session fact the
/// engine itself has no opinion on.
pub struct ApprovalEngine {
    store: Arc<SessionStore>,
    task_store: Arc<dyn TaskStore>,
    events: EventBus,
}

impl ApprovalEngine {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, task_store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            task_store,
            events: EventBus::default(),
        }
    }

    /// Subscribe-able handle for proposal lifecycle events.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    async fn require_session(&self, session: &SessionName) -> Result<SessionRecord> {
        self.store
            .get(session)
            .await?
            .ok_or_else(|| Error::not_found("session", session.to_string()))
    }

    /// `create`: requires `prBranch` absent or `prState.exists = false`.
    pub async fn create(
        &self,
        session: &SessionName,
        backend: &dyn RepositoryBackend,
        pr_branch: String,
        title: String,
        description: String,
        target_branch: String,
        opts: CreateOptions,
    ) -> Result<SessionRecord> {
        let record = self.require_session(session).await?;
        let proposal_open = record.pr_branch.is_some()
            && record.pr_state.as_ref().is_some_and(|s| s.exists);
        if proposal_open {
            return Err(ApprovalError::ProposalAlreadyExists(session.clone()).into());
        }

        let handle = backend
            .create_pull_request(
                &record,
                crate::backend::CreatePullRequestOptions {
                    title,
                    description,
                    target_branch,
                },
            )
            .await?;

        let now = Utc::now();
        let patch = SessionPatch {
            pr_branch: Some(Some(pr_branch)),
            pr_approved: Some(Some(false)),
            pr_state: Some(Some(PrState {
                branch_name: handle.id,
                exists: true,
                last_checked: now,
                created_at: now,
                merged_at: None,
                commit_hash: None,
            })),
            ..SessionPatch::default()
        };

        let updated = self
            .store
            .update(session, patch)
            .await?
            .ok_or_else(|| Error::not_found("session", session.to_string()))?;

        if !opts.skip_task_transition {
            if let Some(task_id) = &updated.task_id {
                if !self.task_store.set_task_status(task_id, TaskStatus::InReview) {
                    tracing::warn!(
                        session = %session,
                        task_id = %task_id,
                        "task store did not accept TODO -> IN-REVIEW transition"
                    );
                }
            }
        }

        self.events.publish(DomainEvent::ProposalCreated {
            session: session.clone(),
            pr_branch: updated.pr_branch.clone().unwrap_or_default(),
            timestamp: now,
        });

        Ok(updated)
    }

    /// `approve`: requires `prBranch` present. On forge backends also
    /// submits an "approved" review.
    pub async fn approve(
        &self,
        session: &SessionName,
        backend: &dyn RepositoryBackend,
    ) -> Result<SessionRecord> {
        let record = self.require_session(session).await?;
        if record.pr_branch.is_none() {
            return Err(ApprovalError::NoProposal(session.clone()).into());
        }

        if backend.get_type() == BackendKind::Forge {
            backend.approve_pull_request(&record).await?;
        }

        let patch = SessionPatch {
            pr_approved: Some(Some(true)),
            ..SessionPatch::default()
        };
        let updated = self
            .store
            .update(session, patch)
            .await?
            .ok_or_else(|| Error::not_found("session", session.to_string()))?;

        self.events.publish(DomainEvent::ProposalApproved {
            session: session.clone(),
            timestamp: Utc::now(),
        });

        Ok(updated)
    }

    /// `merge`: three guards, evaluated in order, each failing closed.
    pub async fn merge(
        &self,
        session: &SessionName,
        backend: &dyn RepositoryBackend,
    ) -> Result<SessionRecord> {
        let record = self.require_session(session).await?;

        if record.pr_branch.is_none() {
            return Err(ApprovalError::NoProposal(session.clone()).into());
        }
        match record.pr_approved {
            Some(true) => {}
            Some(false) | None => return Err(ApprovalError::NotApproved(session.clone()).into()),
        }

        let outcome = backend.merge_pull_request(&record).await?;

        let now = Utc::now();
        let mut pr_state = record.pr_state.clone().unwrap_or(PrState {
            branch_name: record.pr_branch.clone().unwrap_or_default(),
            exists: true,
            last_checked: now,
            created_at: now,
            merged_at: None,
            commit_hash: None,
        });
        pr_state.merged_at = Some(now);
        pr_state.commit_hash = outcome.commit_hash;
        pr_state.last_checked = now;

        let patch = SessionPatch {
            pr_state: Some(Some(pr_state)),
            ..SessionPatch::default()
        };
        let updated = self
            .store
            .update(session, patch)
            .await?
            .ok_or_else(|| Error::not_found("session", session.to_string()))?;

        if let Some(task_id) = &updated.task_id {
            if !self.task_store.set_task_status(task_id, TaskStatus::Done) {
                tracing::warn!(
                    session = %session,
                    task_id = %task_id,
                    "task store did not accept IN-REVIEW -> DONE transition; merge was not rolled back"
                );
            }
        }

        self.events.publish(DomainEvent::ProposalMerged {
            session: session.clone(),
            commit_hash: updated.pr_state.as_ref().and_then(|s| s.commit_hash.clone()),
            timestamp: now,
        });

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        CreatePullRequestOptions, MergeOutcome, PullRequestHandle, PullRequestStatus,
        UpdatePullRequestOptions,
    };
    use crate::domain::session::SessionName;
    use crate::store::backend::memory::InMemoryBackend;
    use crate::task::{InMemoryTaskStore, Task, TaskId};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubBackend {
        kind: BackendKind,
        merge_called: AtomicBool,
        approve_called: AtomicBool,
    }

    impl StubBackend {
        fn new(kind: BackendKind) -> Self {
            Self {
                kind,
                merge_called: AtomicBool::new(false),
                approve_called: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RepositoryBackend for StubBackend {
        fn get_type(&self) -> BackendKind {
            self.kind
        }

        async fn create_pull_request(
            &self,
            _session: &SessionRecord,
            _opts: CreatePullRequestOptions,
        ) -> Result<PullRequestHandle> {
            Ok(PullRequestHandle {
                id: "pr/s1".to_string(),
                url: None,
            })
        }

        async fn update_pull_request(
            &self,
            _session: &SessionRecord,
            _opts: UpdatePullRequestOptions,
        ) -> Result<()> {
            Ok(())
        }

        async fn merge_pull_request(&self, _session: &SessionRecord) -> Result<MergeOutcome> {
            self.merge_called.store(true, Ordering::SeqCst);
            Ok(MergeOutcome {
                commit_hash: Some("abc123".to_string()),
            })
        }

        async fn approve_pull_request(&self, _session: &SessionRecord) -> Result<()> {
            self.approve_called.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn get_pull_request_diff(&self, _session: &SessionRecord) -> Result<String> {
            Ok(String::new())
        }

        async fn get_status(&self, _session: &SessionRecord) -> Result<PullRequestStatus> {
            Ok(PullRequestStatus {
                status: crate::backend::RemoteStatus::Open,
                approved: false,
            })
        }
    }

    fn engine_with_store() -> (ApprovalEngine, Arc<SessionStore>, Arc<InMemoryTaskStore>) {
        let store = Arc::new(SessionStore::new(
            Arc::new(InMemoryBackend::new()),
            PathBuf::from("/base"),
        ));
        let task_store = Arc::new(InMemoryTaskStore::new());
        let engine = ApprovalEngine::new(store.clone(), task_store.clone());
        (engine, store, task_store)
    }

    async fn seeded_session(store: &SessionStore, task_store: &InMemoryTaskStore) -> SessionName {
        let session = SessionName::parse("s1").expect("valid");
        let task_id = TaskId::new(1);
        task_store.insert(Task {
            id: task_id.clone(),
            title: "do the thing".to_string(),
            status: TaskStatus::Todo,
        });
        let mut record = SessionRecord::new(
            session.clone(),
            "org/repo".to_string(),
            "https://example.com/org/repo".to_string(),
        );
        record.task_id = Some(task_id);
        store.add(record).await.expect("seed session");
        session
    }

    #[tokio::test]
    async fn merge_without_proposal_fails_closed() {
        let (engine, store, task_store) = engine_with_store();
        let session = seeded_session(&store, &task_store).await;
        let backend = StubBackend::new(BackendKind::Local);

        let err = engine.merge(&session, &backend).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
        assert!(!backend.merge_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn merge_without_approval_fails_closed() {
        let (engine, store, task_store) = engine_with_store();
        let session = seeded_session(&store, &task_store).await;
        let backend = StubBackend::new(BackendKind::Local);

        engine
            .create(
                &session,
                &backend,
                "pr/s1".to_string(),
                "title".to_string(),
                "body".to_string(),
                "main".to_string(),
                CreateOptions::default(),
            )
            .await
            .expect("create ok");

        let err = engine.merge(&session, &backend).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
        assert!(!backend.merge_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn full_create_approve_merge_transitions_task_to_done() {
        let (engine, store, task_store) = engine_with_store();
        let session = seeded_session(&store, &task_store).await;
        let backend = StubBackend::new(BackendKind::Forge);

        engine
            .create(
                &session,
                &backend,
                "pr/s1".to_string(),
                "title".to_string(),
                "body".to_string(),
                "main".to_string(),
                CreateOptions::default(),
            )
            .await
            .expect("create ok");
        let record = store.get(&session).await.expect("no error").expect("exists");
        assert_eq!(record.pr_approved, Some(false));
        let task_id = record.task_id.clone().expect("task id present");
        assert_eq!(task_store.get_task_status(&task_id), Some(TaskStatus::InReview));

        engine.approve(&session, &backend).await.expect("approve ok");
        assert!(backend.approve_called.load(Ordering::SeqCst));

        let merged = engine.merge(&session, &backend).await.expect("merge ok");
        assert!(backend.merge_called.load(Ordering::SeqCst));
        assert_eq!(
            merged.pr_state.as_ref().and_then(|s| s.commit_hash.clone()),
            Some("abc123".to_string())
        );
        assert_eq!(task_store.get_task_status(&task_id), Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn create_twice_without_close_conflicts() {
        let (engine, store, task_store) = engine_with_store();
        let session = seeded_session(&store, &task_store).await;
        let backend = StubBackend::new(BackendKind::Local);

        engine
            .create(
                &session,
                &backend,
                "pr/s1".to_string(),
                "title".to_string(),
                "body".to_string(),
                "main".to_string(),
                CreateOptions::default(),
            )
            .await
            .expect("create ok");

        let err = engine
            .create(
                &session,
                &backend,
                "pr/s1".to_string(),
                "title".to_string(),
                "body".to_string(),
                "main".to_string(),
                CreateOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn create_approve_merge_each_publish_an_event() {
        let (engine, store, task_store) = engine_with_store();
        let session = seeded_session(&store, &task_store).await;
        let backend = StubBackend::new(BackendKind::Local);
        let mut events = engine.events().subscribe();

        engine
            .create(
                &session,
                &backend,
                "pr/s1".to_string(),
                "title".to_string(),
                "body".to_string(),
                "main".to_string(),
                CreateOptions::default(),
            )
            .await
            .expect("create ok");
        assert!(matches!(
            events.recv().await.expect("event delivered"),
            DomainEvent::ProposalCreated { .. }
        ));

        engine.approve(&session, &backend).await.expect("approve ok");
        assert!(matches!(
            events.recv().await.expect("event delivered"),
            DomainEvent::ProposalApproved { .. }
        ));

        engine.merge(&session, &backend).await.expect("merge ok");
        assert!(matches!(
            events.recv().await.expect("event delivered"),
            DomainEvent::ProposalMerged { .. }
        ));
    }
}
