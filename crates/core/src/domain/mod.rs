//! # Domain Layer
//!
//! Core business types, independent of persistence and network concerns.
//! Follows the same shape as the rest of this crate's ancestry: semantic
//! newtypes at the boundary, aggregates that own their invariants, and a
//! typed event stream recording what happened.
//!
//! - [`session`] — `SessionRecord`, `SessionDbState`, `PrState`: the
//!   persistent shape of a session.
//! - [`changeset`] — the platform-agnostic `Changeset` projection and its
//!   per-platform metadata union.
//! - [`events`] — immutable, timestamped facts about session lifecycle.

pub mod changeset;
pub mod events;
pub mod session;

pub use changeset::{
    Author, Changeset, ChangesetMetadata, ChangesetStatus, Comment, Commit, Review, ReviewStatus,
};
pub use events::DomainEvent;
pub use session::{PrState, SessionName, SessionNameError, SessionRecord};
