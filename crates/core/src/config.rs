//! Layered configuration: built-in defaults -> global config ->
//! project config -> environment variables, each layer overriding only
//! the fields it explicitly sets.
//!
//! A `PartialConfig` mirror type keeps "explicitly set" distinct from
//! "left at default" so a project file can't silently clobber a global
//! setting the project file never mentioned.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SQL_BUSY_TIMEOUT_MS: u64 = 5000;

/// Which storage backend the session store should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Json,
    Sqlite,
    Postgres,
}

/// Fully-resolved configuration, after every layer has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_dir: PathBuf,
    pub default_backend: crate::domain::session::BackendType,
    pub storage_kind: StorageKind,
    pub storage_location: String,
    pub git_timeout: Duration,
    pub sql_busy_timeout: Duration,
    pub github_token_env_vars: Vec<String>,
    pub postgres_dsn_env_var: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            default_backend: crate::domain::session::BackendType::Local,
            storage_kind: StorageKind::Json,
            storage_location: "sessions.json".to_string(),
            git_timeout: Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
            sql_busy_timeout: Duration::from_millis(DEFAULT_SQL_BUSY_TIMEOUT_MS),
            github_token_env_vars: vec!["GITHUB_TOKEN".to_string(), "GH_TOKEN".to_string()],
            postgres_dsn_env_var: "SESSIONFORGE_POSTGRES_DSN".to_string(),
        }
    }
}

/// `<XDG_STATE_HOME or HOME/.local/state>/sessionforge`.
fn default_base_dir() -> PathBuf {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg_state).join("sessionforge");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/sessionforge");
    }
    PathBuf::from(".sessionforge")
}

/// The TOML-facing mirror of [`Config`]: every field `Option`, so a file
/// that doesn't mention a key leaves that layer's value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PartialConfig {
    pub base_dir: Option<PathBuf>,
    pub default_backend: Option<crate::domain::session::BackendType>,
    pub storage_kind: Option<StorageKind>,
    pub storage_location: Option<String>,
    pub git_timeout_secs: Option<u64>,
}

impl Config {
    fn merge_partial(&mut self, partial: PartialConfig) {
        if let Some(base_dir) = partial.base_dir {
            self.base_dir = base_dir;
        }
        if let Some(default_backend) = partial.default_backend {
            self.default_backend = default_backend;
        }
        if let Some(storage_kind) = partial.storage_kind {
            self.storage_kind = storage_kind;
        }
        if let Some(storage_location) = partial.storage_location {
            self.storage_location = storage_location;
        }
        if let Some(git_timeout_secs) = partial.git_timeout_secs {
            self.git_timeout = Duration::from_secs(git_timeout_secs);
        }
    }

    /// Environment variables win over both config files.
    ///
    /// `SESSIONFORGE_BASE_DIR`, `SESSIONFORGE_DEFAULT_BACKEND`,
    /// `SESSIONFORGE_STORAGE_KIND`, `SESSIONFORGE_STORAGE_LOCATION`,
    /// `SESSIONFORGE_GIT_TIMEOUT_SECS`.
    fn apply_env_vars(&mut self) {
        if let Ok(value) = std::env::var("SESSIONFORGE_BASE_DIR") {
            self.base_dir = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("SESSIONFORGE_STORAGE_LOCATION") {
            self.storage_location = value;
        }
        if let Ok(value) = std::env::var("SESSIONFORGE_STORAGE_KIND") {
            match value.to_lowercase().as_str() {
                "json" => self.storage_kind = StorageKind::Json,
                "sqlite" => self.storage_kind = StorageKind::Sqlite,
                "postgres" => self.storage_kind = StorageKind::Postgres,
                _ => tracing::warn!(value, "unrecognized SESSIONFORGE_STORAGE_KIND; ignoring"),
            }
        }
        if let Ok(value) = std::env::var("SESSIONFORGE_GIT_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) => self.git_timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value, "SESSIONFORGE_GIT_TIMEOUT_SECS is not a valid integer; ignoring"),
            }
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sessionforge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|dir| dir.join(".sessionforge/config.toml"))
}

/// Load and parse a TOML file into a [`PartialConfig`], rejecting
/// symlinks and oversized files before ever handing content to the parser.
///
/// # Errors
///
/// Returns [`Error::TransientIo`] if the file can't be read, or
/// [`Error::InvalidInput`] if it is too large, a symlink, or malformed TOML.
pub async fn load_partial_toml_file(path: &Path) -> Result<PartialConfig> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_symlink() {
        return Err(Error::InvalidInput(format!(
            "refusing to read config file through a symlink: {}",
            path.display()
        )));
    }
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(Error::InvalidInput(format!(
            "config file {} exceeds {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str(&content).map_err(Error::from)
}

/// Load the fully-layered configuration: defaults, then global config (if
/// present), then project config (if present), then environment variables.
///
/// A missing config file at either layer is not an error — only a
/// malformed one is.
///
/// # Errors
///
/// Returns an error if a config file that does exist is malformed,
/// oversized, or read through a symlink.
pub async fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = global_config_path() {
        match load_partial_toml_file(&path).await {
            Ok(partial) => config.merge_partial(partial),
            Err(Error::TransientIo(_)) => {}
            Err(err) => return Err(err),
        }
    }

    if let Some(path) = project_config_path() {
        match load_partial_toml_file(&path).await {
            Ok(partial) => config.merge_partial(partial),
            Err(Error::TransientIo(_)) => {}
            Err(err) => return Err(err),
        }
    }

    config.apply_env_vars();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_json_backend() {
        let config = Config::default();
        assert_eq!(config.storage_kind, StorageKind::Json);
        assert_eq!(config.git_timeout, Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS));
    }

    #[test]
    fn merge_partial_overrides_only_set_fields() {
        let mut config = Config::default();
        let original_location = config.storage_location.clone();
        config.merge_partial(PartialConfig {
            storage_kind: Some(StorageKind::Sqlite),
            ..PartialConfig::default()
        });
        assert_eq!(config.storage_kind, StorageKind::Sqlite);
        assert_eq!(config.storage_location, original_location);
    }

    #[tokio::test]
    async fn missing_config_file_is_not_an_error() {
        let result = load_partial_toml_file(Path::new("/nonexistent/sessionforge/config.toml")).await;
        assert!(matches!(result, Err(Error::TransientIo(_))));
    }

    #[tokio::test]
    async fn malformed_toml_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, b"not = [valid").await.expect("write");
        let result = load_partial_toml_file(&path).await;
        assert!(result.is_err());
        assert!(!matches!(result, Err(Error::TransientIo(_))));
    }

    #[tokio::test]
    async fn parses_explicit_fields_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, b"storage_kind = \"sqlite\"\n")
            .await
            .expect("write");
        let partial = load_partial_toml_file(&path).await.expect("parses");
        assert_eq!(partial.storage_kind, Some(StorageKind::Sqlite));
        assert!(partial.base_dir.is_none());
    }

    #[test]
    fn env_var_overrides_storage_kind() {
        std::env::set_var("SESSIONFORGE_STORAGE_KIND", "sqlite");
        let mut config = Config::default();
        config.apply_env_vars();
        assert_eq!(config.storage_kind, StorageKind::Sqlite);
        std::env::remove_var("SESSIONFORGE_STORAGE_KIND");
    }
}
