//! In-memory [`StorageBackend`], used by the core's own test suite and
//! available to downstream crates for unit tests that don't want a
//! filesystem or database. An `Arc<Mutex<Vec<_>>>`-guarded collection
//! behind the async `StorageBackend` interface.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::session::{SessionDbState, SessionName, SessionRecord};
use crate::error::{Error, Result};
use crate::store::backend::{StorageBackend, WriteReport};
use crate::store::filter::SessionFilter;
use crate::store::SessionPatch;

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: Mutex<Vec<SessionRecord>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn read_state(&self) -> Result<SessionDbState> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(SessionDbState {
            sessions: records.clone(),
            base_dir: String::new(),
        })
    }

    async fn write_state(&self, state: &SessionDbState) -> Result<WriteReport> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        *records = state.sessions.clone();
        Ok(WriteReport {
            records_written: records.len(),
            bytes_written: 0,
        })
    }

    async fn get(&self, session: &SessionName) -> Result<Option<SessionRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.iter().find(|r| &r.session == session).cloned())
    }

    async fn get_all(&self, filter: Option<&SessionFilter>) -> Result<Vec<SessionRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &SessionRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.iter().any(|r| r.session == record.session) {
            return Err(Error::Conflict(format!(
                "session already exists: {}",
                record.session
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(
        &self,
        session: &SessionName,
        patch: SessionPatch,
    ) -> Result<Option<SessionRecord>> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = records.iter_mut().find(|r| &r.session == session) else {
            return Ok(None);
        };
        patch.apply(record);
        Ok(Some(record.clone()))
    }

    async fn delete(&self, session: &SessionName) -> Result<bool> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|r| &r.session != session);
        Ok(records.len() != before)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}
