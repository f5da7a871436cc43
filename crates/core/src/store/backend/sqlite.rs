//! Embedded-SQL [`StorageBackend`] over `SQLite`, via a `sqlx::SqlitePool`.
//!
//! Schema is created idempotently (`CREATE TABLE IF NOT EXISTS`) and grown
//! with additive `ALTER TABLE` migrations keyed off `PRAGMA user_version`:
//! idempotent create, additive migrate, no destructive schema changes ever.
//! Structured
//! sub-fields (`pr_state`, `pull_request`) are stored as JSON text columns
//! rather than normalized out — this store has no query that needs to
//! filter on them, so normalizing would only add migration surface.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::session::{
    BackendType, PrState, PullRequestRef, SessionDbState, SessionName, SessionRecord,
};
use crate::error::{Error, Result};
use crate::store::backend::{StorageBackend, WriteReport};
use crate::store::filter::SessionFilter;
use crate::store::SessionPatch;
use crate::task::TaskId;

use async_trait::async_trait;

const SCHEMA_VERSION: i64 = 1;

/// Rows are batched in chunks of this size when `write_state` truncates and
/// rewrites the whole table, to stay well under `SQLite`'s default bound on
/// the number of host parameters in a single statement.
const WRITE_BATCH_SIZE: usize = 250;

pub struct SqliteBackend {
    pool: SqlitePool,
    location: String,
}

impl SqliteBackend {
    #[must_use]
    pub fn new(pool: SqlitePool, location: impl Into<String>) -> Self {
        Self {
            pool,
            location: location.into(),
        }
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session TEXT PRIMARY KEY,
                repo_name TEXT NOT NULL,
                repo_url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                task_id TEXT,
                branch TEXT,
                pr_branch TEXT,
                pr_approved INTEGER,
                pr_state TEXT,
                backend_type TEXT,
                pull_request TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: i64 = sqlx::query("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;
        if current_version < SCHEMA_VERSION {
            sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn base_dir(&self) -> Result<String> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM store_meta WHERE key = 'base_dir'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map_or_else(String::new, |(v,)| v))
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
    let session: String = row.try_get("session")?;
    let task_id: Option<String> = row.try_get("task_id")?;
    let pr_state: Option<String> = row.try_get("pr_state")?;
    let backend_type: Option<String> = row.try_get("backend_type")?;
    let pull_request: Option<String> = row.try_get("pull_request")?;

    Ok(SessionRecord {
        session: SessionName::parse(session)
            .map_err(|e| Error::Corruption {
                path: std::path::PathBuf::new(),
                detail: e.to_string(),
            })?,
        repo_name: row.try_get("repo_name")?,
        repo_url: row.try_get("repo_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        task_id: task_id
            .map(|t| TaskId::parse(&t))
            .transpose()
            .map_err(|e| Error::InvalidInput(e.to_string()))?,
        branch: row.try_get("branch")?,
        pr_branch: row.try_get("pr_branch")?,
        pr_approved: row.try_get::<Option<i64>, _>("pr_approved")?.map(|v| v != 0),
        pr_state: pr_state
            .map(|s| serde_json::from_str::<PrState>(&s))
            .transpose()?,
        backend_type: backend_type
            .map(|s| serde_json::from_str::<BackendType>(&format!("\"{s}\"")))
            .transpose()?,
        pull_request: pull_request
            .map(|s| serde_json::from_str::<PullRequestRef>(&s))
            .transpose()?,
    })
}

/// Upsert one record against any `SQLite` executor (a pool, or a live
/// transaction) so callers can choose whether the write is its own
/// implicit transaction or part of a larger one.
async fn upsert<'e, E>(executor: E, record: &SessionRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let pr_state = record
        .pr_state
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let backend_type = record.backend_type.map(|b| b.to_string());
    let pull_request = record
        .pull_request
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        "INSERT INTO sessions
            (session, repo_name, repo_url, created_at, task_id, branch, pr_branch,
             pr_approved, pr_state, backend_type, pull_request)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(session) DO UPDATE SET
            repo_name = excluded.repo_name,
            repo_url = excluded.repo_url,
            task_id = excluded.task_id,
            branch = excluded.branch,
            pr_branch = excluded.pr_branch,
            pr_approved = excluded.pr_approved,
            pr_state = excluded.pr_state,
            backend_type = excluded.backend_type,
            pull_request = excluded.pull_request",
    )
    .bind(record.session.as_str())
    .bind(&record.repo_name)
    .bind(&record.repo_url)
    .bind(record.created_at)
    .bind(record.task_id.as_ref().map(TaskId::canonical))
    .bind(&record.branch)
    .bind(&record.pr_branch)
    .bind(record.pr_approved.map(i64::from))
    .bind(pr_state)
    .bind(backend_type)
    .bind(pull_request)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn read_state(&self) -> Result<SessionDbState> {
        let rows = sqlx::query("SELECT * FROM sessions").fetch_all(&self.pool).await?;
        let sessions = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(SessionDbState {
            sessions,
            base_dir: self.base_dir().await?,
        })
    }

    async fn write_state(&self, state: &SessionDbState) -> Result<WriteReport> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sessions").execute(&mut *tx).await?;
        for chunk in state.sessions.chunks(WRITE_BATCH_SIZE) {
            for record in chunk {
                upsert(&mut *tx, record).await?;
            }
        }
        sqlx::query(
            "INSERT INTO store_meta (key, value) VALUES ('base_dir', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(&state.base_dir)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(WriteReport {
            records_written: state.sessions.len(),
            bytes_written: 0,
        })
    }

    async fn get(&self, session: &SessionName) -> Result<Option<SessionRecord>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session = ?1")
            .bind(session.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_all(&self, filter: Option<&SessionFilter>) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query("SELECT * FROM sessions").fetch_all(&self.pool).await?;
        let all = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(all
            .into_iter()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .collect())
    }

    async fn create(&self, record: &SessionRecord) -> Result<()> {
        if self.exists(&record.session).await? {
            return Err(Error::Conflict(format!(
                "session already exists: {}",
                record.session
            )));
        }
        upsert(&self.pool, record).await
    }

    async fn update(
        &self,
        session: &SessionName,
        patch: SessionPatch,
    ) -> Result<Option<SessionRecord>> {
        let Some(mut record) = self.get(session).await? else {
            return Ok(None);
        };
        patch.apply(&mut record);
        upsert(&self.pool, &record).await?;
        Ok(Some(record))
    }

    async fn delete(&self, session: &SessionName) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session = ?1")
            .bind(session.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    async fn initialize(&self) -> Result<()> {
        self.migrate().await
    }
}
