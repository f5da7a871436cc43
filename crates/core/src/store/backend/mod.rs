//! Storage Backend: the generic two-level persistence interface every
//! concrete store (JSON file, embedded SQLite, networked Postgres) implements
//! identically, so [`crate::store::SessionStore`] never branches on which
//! one is active.
//!
//! The state-level operations (`read_state`/`write_state`) move the whole
//! session table at once and are what the Session Migrator uses; the
//! entity-level operations are what [`crate::store::SessionStore`] uses day
//! to day. A backend is free to implement entity operations in terms of
//! `read_state`/`write_state` (as [`json::JsonBackend`] does) or directly
//! against a table (as the SQL backends do).

pub mod json;
pub mod memory;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;

use crate::domain::session::{SessionDbState, SessionRecord};
use crate::error::Result;
use crate::store::filter::SessionFilter;
use crate::store::SessionPatch;
use crate::domain::session::SessionName;

/// Outcome of a [`StorageBackend::write_state`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub records_written: usize,
    pub bytes_written: u64,
}

/// The generic persistence interface implemented by every concrete backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the entire session table in one shot. Used by the migrator and
    /// by integrity checks; day-to-day reads go through `get`/`get_all`.
    async fn read_state(&self) -> Result<SessionDbState>;

    /// Overwrite the entire session table. Used by the migrator.
    async fn write_state(&self, state: &SessionDbState) -> Result<WriteReport>;

    async fn get(&self, session: &SessionName) -> Result<Option<SessionRecord>>;

    /// All records matching `filter`, or every record if `filter` is `None`.
    async fn get_all(&self, filter: Option<&SessionFilter>) -> Result<Vec<SessionRecord>>;

    /// # Errors
    ///
    /// Returns [`crate::error::Error::Conflict`] if `record.session` already exists.
    async fn create(&self, record: &SessionRecord) -> Result<()>;

    /// Merge `patch` into the stored record for `session`. Returns `None`
    /// if no such session exists.
    async fn update(
        &self,
        session: &SessionName,
        patch: SessionPatch,
    ) -> Result<Option<SessionRecord>>;

    /// Returns `true` iff a record was removed.
    async fn delete(&self, session: &SessionName) -> Result<bool>;

    async fn exists(&self, session: &SessionName) -> Result<bool> {
        Ok(self.get(session).await?.is_some())
    }

    /// Human-readable location of the backing store (file path, DSN with
    /// credentials redacted), for diagnostics and `doctor`-style commands.
    fn location(&self) -> String;

    /// Prepare the backend for use (create file/tables if absent).
    /// Idempotent: safe to call on an already-initialized backend.
    async fn initialize(&self) -> Result<()>;
}
