//! Domain events: immutable, serializable, timestamped facts about session
//! lifecycle.
//!
//! Ambient observability, not a persisted event log — nothing in this crate
//! replays events to rebuild state. Emitted as `tracing` fields at the call
//! site and broadcast in-process via [`EventBus`] so a future CLI/TUI can
//! subscribe without the emitting code knowing who's listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::session::SessionName;
use crate::task::TaskId;

/// A domain event representing something that happened to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    SessionCreated {
        session: SessionName,
        task_id: Option<TaskId>,
        timestamp: DateTime<Utc>,
    },
    ProposalCreated {
        session: SessionName,
        pr_branch: String,
        timestamp: DateTime<Utc>,
    },
    ProposalApproved {
        session: SessionName,
        timestamp: DateTime<Utc>,
    },
    ProposalMerged {
        session: SessionName,
        commit_hash: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SessionDeleted {
        session: SessionName,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    #[must_use]
    pub const fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::SessionCreated { timestamp, .. }
            | Self::ProposalCreated { timestamp, .. }
            | Self::ProposalApproved { timestamp, .. }
            | Self::ProposalMerged { timestamp, .. }
            | Self::SessionDeleted { timestamp, .. } => timestamp,
        }
    }

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::ProposalCreated { .. } => "proposal_created",
            Self::ProposalApproved { .. } => "proposal_approved",
            Self::ProposalMerged { .. } => "proposal_merged",
            Self::SessionDeleted { .. } => "session_deleted",
        }
    }
}

/// An in-process fan-out of domain events. Cloning the bus clones the
/// sender handle; every clone publishes to the same set of subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Never fails: with no subscribers the event is
    /// simply dropped.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let session = SessionName::parse("s1").expect("valid");
        bus.publish(DomainEvent::SessionCreated {
            session: session.clone(),
            task_id: None,
            timestamp: Utc::now(),
        });
        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.event_type(), "session_created");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::SessionDeleted {
            session: SessionName::parse("s1").expect("valid"),
            timestamp: Utc::now(),
        });
    }
}
