//! Builds the long-lived collaborators every command needs: the loaded
//! [`Config`], a [`SessionStore`] backed by whichever storage kind the
//! config selects, and an [`ApprovalEngine`] wired to a [`NullTaskStore`]
//! (no markdown task backend ships with this crate).

use std::sync::Arc;

use anyhow::{Context, Result};
use sessionforge_core::approval::ApprovalEngine;
use sessionforge_core::config::{Config, StorageKind};
use sessionforge_core::store::backend::json::JsonBackend;
use sessionforge_core::store::backend::postgres::PostgresBackend;
use sessionforge_core::store::backend::sqlite::SqliteBackend;
use sessionforge_core::store::{SessionStore, StorageBackend};
use sessionforge_core::task::NullTaskStore;

/// Everything a command handler needs, built once in `main` and passed
/// down by reference.
pub struct CliContext {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub approval: ApprovalEngine,
}

impl CliContext {
    pub async fn load() -> Result<Self> {
        let config = sessionforge_core::config::load_config()
            .await
            .context("load configuration")?;

        let backend: Arc<dyn StorageBackend> = match config.storage_kind {
            StorageKind::Json => {
                let path = config.base_dir.join(&config.storage_location);
                Arc::new(JsonBackend::new(path))
            }
            StorageKind::Sqlite => {
                let path = config.base_dir.join(&config.storage_location);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                let options = sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&path)
                    .create_if_missing(true);
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .connect_with(options)
                    .await
                    .with_context(|| format!("open sqlite store at {}", path.display()))?;
                Arc::new(SqliteBackend::new(pool, path.display().to_string()))
            }
            StorageKind::Postgres => {
                let dsn = std::env::var(&config.postgres_dsn_env_var).with_context(|| {
                    format!(
                        "{} must be set to use the postgres storage backend",
                        config.postgres_dsn_env_var
                    )
                })?;
                Arc::new(PostgresBackend::connect(&dsn).await.context("connect to postgres")?)
            }
        };
        backend.initialize().await.context("initialize storage backend")?;

        let store = Arc::new(SessionStore::new(backend, config.base_dir.clone()));
        let approval = ApprovalEngine::new(store.clone(), Arc::new(NullTaskStore));

        Ok(Self {
            config,
            store,
            approval,
        })
    }
}
