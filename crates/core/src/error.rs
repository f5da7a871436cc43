//! Crate-wide error taxonomy.
//!
//! Mirrors the error *kinds* of the session/changeset protocol rather than
//! wrapping every dependency's error type 1:1: callers branch on kind, the
//! message carries the rest. Domain submodules (`domain::session`,
//! `uri`, `store`) define their own narrower `thiserror` enums and convert
//! into this one at the module boundary via `From`.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across the session/changeset protocol.
///
/// Each variant corresponds to one of the error kinds in the core's error
/// handling design: malformed input, missing resources, failed invariants,
/// conflicting writes, retryable I/O, unreachable backends, and detected
/// corruption. None of these are exceptional in the Rust-panic sense; they
/// are all expected, typed outcomes a caller is meant to match on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed `TaskId`, `RepositoryURI`, or option set. Not retryable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A named resource (session, task, backend) does not exist.
    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// An invariant the caller must satisfy before the operation proceeds
    /// was violated — most importantly the approval gate in §4.8.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// The operation would violate a uniqueness or ordering constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A filesystem or subprocess failure that may succeed on retry.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// A forge or database connection could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An integrity check failed on a store file.
    #[error("corruption detected in {path}: {detail}")]
    Corruption { path: PathBuf, detail: String },

    /// A capability intentionally not implemented by a backend/adapter.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl Error {
    #[must_use]
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::TransientIo(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("malformed JSON: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidInput(format!("malformed TOML: {err}"))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("row", "<unspecified>"),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::BackendUnavailable(err.to_string())
            }
            other => Self::TransientIo(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::BackendUnavailable(err.to_string())
        } else {
            Self::TransientIo(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_resource_and_id() {
        let err = Error::not_found("session", "s1");
        assert_eq!(err.to_string(), "session not found: s1");
    }

    #[test]
    fn io_error_is_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(Error::from(io_err), Error::TransientIo(_)));
    }
}
