//! JSON-file [`StorageBackend`].
//!
//! Writes are atomic: the new state is serialized to a sibling
//! `<file>.tmp-<pid>` path and renamed over the real path, so a crash or
//! concurrent reader never observes a half-written file. Reads accept two
//! shapes on disk: the current object form (`{"sessions": [...], "base_dir":
//! ...}`) and a legacy bare JSON array of records, which is treated as
//! `base_dir: ""`. A missing file reads as an empty state; a file that
//! exists but fails to parse as either shape is logged at `WARN` and also
//! treated as empty, rather than propagating a hard error — the integrity
//! checker (`crate::integrity`) is the tool for diagnosing that case, not
//! every ordinary read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::session::{SessionDbState, SessionName, SessionRecord};
use crate::error::{Error, Result};
use crate::store::backend::{StorageBackend, WriteReport};
use crate::store::filter::SessionFilter;
use crate::store::SessionPatch;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OnDiskState {
    Current(SessionDbState),
    Legacy(Vec<SessionRecord>),
}

#[derive(Debug, Serialize)]
struct CurrentState<'a> {
    sessions: &'a [SessionRecord],
    base_dir: &'a str,
}

/// JSON-file-backed store. One process-local [`Mutex`] serializes
/// read-modify-write cycles against a single path; cross-process safety
/// comes from the rename being atomic at the filesystem level.
pub struct JsonBackend {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_unlocked(&self) -> Result<SessionDbState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionDbState {
                    sessions: Vec::new(),
                    base_dir: String::new(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<OnDiskState>(&bytes) {
            Ok(OnDiskState::Current(state)) => Ok(state),
            Ok(OnDiskState::Legacy(sessions)) => Ok(SessionDbState {
                sessions,
                base_dir: String::new(),
            }),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "session store file is not valid JSON in either current or legacy shape; treating as empty"
                );
                Ok(SessionDbState {
                    sessions: Vec::new(),
                    base_dir: String::new(),
                })
            }
        }
    }

    async fn write_unlocked(&self, state: &SessionDbState) -> Result<WriteReport> {
        let payload = CurrentState {
            sessions: &state.sessions,
            base_dir: &state.base_dir,
        };
        let json = serde_json::to_vec_pretty(&payload)?;
        atomic_write(&self.path, &json).await?;
        Ok(WriteReport {
            records_written: state.sessions.len(),
            bytes_written: json.len() as u64,
        })
    }
}

async fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl StorageBackend for JsonBackend {
    async fn read_state(&self) -> Result<SessionDbState> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    async fn write_state(&self, state: &SessionDbState) -> Result<WriteReport> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(state).await
    }

    async fn get(&self, session: &SessionName) -> Result<Option<SessionRecord>> {
        let _guard = self.lock.lock().await;
        let state = self.read_unlocked().await?;
        Ok(state.sessions.into_iter().find(|r| &r.session == session))
    }

    async fn get_all(&self, filter: Option<&SessionFilter>) -> Result<Vec<SessionRecord>> {
        let _guard = self.lock.lock().await;
        let state = self.read_unlocked().await?;
        Ok(state
            .sessions
            .into_iter()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .collect())
    }

    async fn create(&self, record: &SessionRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_unlocked().await?;
        if state.sessions.iter().any(|r| r.session == record.session) {
            return Err(Error::Conflict(format!(
                "session already exists: {}",
                record.session
            )));
        }
        state.sessions.push(record.clone());
        self.write_unlocked(&state).await?;
        Ok(())
    }

    async fn update(
        &self,
        session: &SessionName,
        patch: SessionPatch,
    ) -> Result<Option<SessionRecord>> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_unlocked().await?;
        let Some(record) = state.sessions.iter_mut().find(|r| &r.session == session) else {
            return Ok(None);
        };
        patch.apply(record);
        let updated = record.clone();
        self.write_unlocked(&state).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, session: &SessionName) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_unlocked().await?;
        let before = state.sessions.len();
        state.sessions.retain(|r| &r.session != session);
        let removed = state.sessions.len() != before;
        if removed {
            self.write_unlocked(&state).await?;
        }
        Ok(removed)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn initialize(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        if tokio::fs::metadata(&self.path).await.is_err() {
            self.write_unlocked(&SessionDbState {
                sessions: Vec::new(),
                base_dir: String::new(),
            })
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionName;

    fn record(name: &str) -> SessionRecord {
        SessionRecord::new(
            SessionName::parse(name).expect("valid"),
            "org/repo".into(),
            "https://example.com/org/repo".into(),
        )
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = JsonBackend::new(dir.path().join("sessions.json"));
        let state = backend.read_state().await.expect("reads ok");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_state_not_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        tokio::fs::write(&path, b"not json at all {{{")
            .await
            .expect("write garbage");
        let backend = JsonBackend::new(path);
        let state = backend.read_state().await.expect("does not error");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn legacy_bare_array_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let legacy = serde_json::to_vec(&vec![record("s1")]).expect("serializes");
        tokio::fs::write(&path, legacy).await.expect("write");
        let backend = JsonBackend::new(path);
        let state = backend.read_state().await.expect("reads ok");
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.sessions[0].session.as_str(), "s1");
    }

    #[tokio::test]
    async fn create_then_get_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = JsonBackend::new(dir.path().join("sessions.json"));
        backend.create(&record("s1")).await.expect("create ok");
        let fetched = backend
            .get(&SessionName::parse("s1").expect("valid"))
            .await
            .expect("no error");
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn create_duplicate_session_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = JsonBackend::new(dir.path().join("sessions.json"));
        backend.create(&record("s1")).await.expect("first create");
        let err = backend.create(&record("s1")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn write_state_leaves_no_stray_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let backend = JsonBackend::new(&path);
        backend
            .write_state(&SessionDbState {
                sessions: vec![record("s1")],
                base_dir: "/base".into(),
            })
            .await
            .expect("write ok");
        let mut entries = tokio::fs::read_dir(dir.path()).await.expect("read dir");
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.expect("entry") {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["sessions.json"]);
    }
}
