//! Integrity Checker: a read-only diagnostic over a session store file.
//!
//! Never mutates anything it inspects — every remediation it can imagine is
//! returned as a [`SuggestedAction`] for a caller (typically a `doctor`-style
//! CLI command) to execute explicitly.

use std::path::{Path, PathBuf};

use regex::Regex;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;

use crate::error::Result;

/// The format a store file is expected, or found, to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Json,
    Sqlite,
    Empty,
    Unknown,
}

/// The kind of remediation a [`SuggestedAction`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Migrate,
    Restore,
    Repair,
    Create,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedAction {
    pub kind: ActionKind,
    pub description: String,
    pub command: Option<String>,
    pub priority: u8,
    pub auto_executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub actual_format: StoreFormat,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub backups_found: Vec<PathBuf>,
    pub suggested_actions: Vec<SuggestedAction>,
}

impl IntegrityReport {
    fn empty_for(actual_format: StoreFormat) -> Self {
        Self {
            is_valid: false,
            actual_format,
            issues: Vec::new(),
            warnings: Vec::new(),
            backups_found: Vec::new(),
            suggested_actions: Vec::new(),
        }
    }
}

fn backup_name_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\.bak$|^migration-backup-|\.backup\.json$|\.backup\.db$)")
            .expect("valid regex")
    })
}

/// Scan `path`'s parent directory and a sibling `backups/` directory for
/// files matching a known backup-name pattern. Ordering is arbitrary;
/// callers that care about recency should stat the results themselves.
async fn scan_for_backups(path: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Some(parent) = path.parent() else {
        return found;
    };

    for dir in [parent.to_path_buf(), parent.join("backups")] {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if backup_name_pattern().is_match(&name) {
                found.push(entry.path());
            }
        }
    }
    found
}

/// Sniff a store file's actual format from its content, independent of what
/// the caller expected it to be.
fn sniff_format(bytes: &[u8]) -> StoreFormat {
    if bytes.starts_with(b"SQLite format 3\0") {
        return StoreFormat::Sqlite;
    }
    let trimmed_start = bytes.iter().position(|b| !b.is_ascii_whitespace());
    match trimmed_start.and_then(|i| bytes.get(i)) {
        Some(b'{' | b'[') => StoreFormat::Json,
        _ => StoreFormat::Unknown,
    }
}

async fn check_sqlite_file(path: &Path, report: &mut IntegrityReport) -> Result<()> {
    let dsn = format!("sqlite://{}?mode=ro", path.display());
    let pool = match SqlitePoolOptions::new().max_connections(1).connect(&dsn).await {
        Ok(pool) => pool,
        Err(err) => {
            report.issues.push(format!("cannot open as SQLite: {err}"));
            return Ok(());
        }
    };

    let integrity: String = sqlx::query("PRAGMA integrity_check")
        .fetch_one(&pool)
        .await
        .map(|row| row.try_get::<String, _>(0).unwrap_or_default())
        .unwrap_or_else(|_| "unreadable".to_string());
    if integrity != "ok" {
        report.issues.push(format!("PRAGMA integrity_check reported: {integrity}"));
    }

    let has_sessions_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'sessions'",
    )
    .fetch_optional(&pool)
    .await
    .unwrap_or(None);
    if has_sessions_table.is_none() {
        report.issues.push("missing required 'sessions' table".to_string());
    }

    Ok(())
}

fn check_json_bytes(bytes: &[u8], report: &mut IntegrityReport) {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Array(_)) => {}
        Ok(serde_json::Value::Object(map)) => {
            match map.get("sessions") {
                Some(serde_json::Value::Array(_)) => {}
                Some(_) => report
                    .issues
                    .push("'sessions' field is present but not an array".to_string()),
                None => report.issues.push("missing 'sessions' field".to_string()),
            }
        }
        Ok(_) => report.issues.push("top-level JSON value is neither an object nor an array".to_string()),
        Err(err) => report.issues.push(format!("invalid JSON: {err}")),
    }
}

/// Check a store file against its `expected_format`. Read-only: never
/// writes, deletes, or repairs anything — see [`SuggestedAction`] for what a
/// caller might do with the result.
pub async fn check_integrity(expected_format: StoreFormat, path: &Path) -> Result<IntegrityReport> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let mut report = IntegrityReport::empty_for(StoreFormat::Empty);
            report.backups_found = scan_for_backups(path).await;
            if report.backups_found.is_empty() {
                report.suggested_actions.push(SuggestedAction {
                    kind: ActionKind::Create,
                    description: format!("no store file at {}; initialize a fresh one", path.display()),
                    command: None,
                    priority: 1,
                    auto_executable: true,
                });
            } else {
                report.suggested_actions.push(SuggestedAction {
                    kind: ActionKind::Restore,
                    description: format!(
                        "no store file at {}; {} candidate backup(s) found",
                        path.display(),
                        report.backups_found.len()
                    ),
                    command: None,
                    priority: 1,
                    auto_executable: false,
                });
            }
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    };

    let actual_format = sniff_format(&bytes);
    let mut report = IntegrityReport::empty_for(actual_format);

    if actual_format != expected_format && actual_format != StoreFormat::Unknown {
        report.warnings.push(format!(
            "expected {expected_format:?} format but detected {actual_format:?}"
        ));
        report.suggested_actions.push(SuggestedAction {
            kind: ActionKind::Migrate,
            description: format!("migrate store from {actual_format:?} to {expected_format:?}"),
            command: None,
            priority: 2,
            auto_executable: false,
        });
    }

    match actual_format {
        StoreFormat::Sqlite => check_sqlite_file(path, &mut report).await?,
        StoreFormat::Json => check_json_bytes(&bytes, &mut report),
        StoreFormat::Unknown => report.issues.push("unrecognized file format".to_string()),
        StoreFormat::Empty => unreachable!("handled by the missing-file branch above"),
    }

    report.is_valid = report.issues.is_empty();
    if !report.is_valid {
        report.suggested_actions.push(SuggestedAction {
            kind: ActionKind::Repair,
            description: "store file failed validation; manual repair or restore required".to_string(),
            command: None,
            priority: 3,
            auto_executable: false,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_suggests_create_when_no_backups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let report = check_integrity(StoreFormat::Json, &path).await.expect("no error");
        assert_eq!(report.actual_format, StoreFormat::Empty);
        assert!(!report.is_valid);
        assert!(report.backups_found.is_empty());
        assert!(report.suggested_actions.iter().any(|a| a.kind == ActionKind::Create));
    }

    #[tokio::test]
    async fn missing_file_suggests_restore_when_backup_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        tokio::fs::write(dir.path().join("sessions.json.bak"), b"[]")
            .await
            .expect("write backup");
        let report = check_integrity(StoreFormat::Json, &path).await.expect("no error");
        assert_eq!(report.backups_found.len(), 1);
        assert!(report.suggested_actions.iter().any(|a| a.kind == ActionKind::Restore));
    }

    #[tokio::test]
    async fn valid_json_object_form_is_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        tokio::fs::write(&path, br#"{"sessions":[],"base_dir":""}"#)
            .await
            .expect("write");
        let report = check_integrity(StoreFormat::Json, &path).await.expect("no error");
        assert!(report.is_valid);
        assert_eq!(report.actual_format, StoreFormat::Json);
    }

    #[tokio::test]
    async fn json_missing_sessions_field_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        tokio::fs::write(&path, br#"{"base_dir":""}"#).await.expect("write");
        let report = check_integrity(StoreFormat::Json, &path).await.expect("no error");
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|i| i.contains("sessions")));
    }

    #[test]
    fn sniff_detects_sqlite_magic_header() {
        let mut bytes = b"SQLite format 3\0".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(sniff_format(&bytes), StoreFormat::Sqlite);
    }

    #[test]
    fn sniff_falls_back_to_unknown() {
        assert_eq!(sniff_format(b"not a recognized format"), StoreFormat::Unknown);
    }
}
