//! Session-path resolver.
//!
//! The canonical workspace path for a session `s` under base directory `B`
//! is always `B/sessions/s`. This is the *only* path the resolver
//! generates — the legacy `B/git/<repoName>/sessions/s` layout is
//! recognized solely by [`crate::migrate`], never produced here. Keeping
//! `repoName` out of the computation is deliberate: it is the historical
//! bug class this module exists to close (resolver and git-command workdir
//! disagreeing on where a session lives).

use std::path::{Path, PathBuf};

/// Compute the canonical workspace path for `session` under `base_dir`.
///
/// Stable across process restarts: this function is pure and takes no
/// state beyond its two arguments.
#[must_use]
pub fn session_path(base_dir: &Path, session: &str) -> PathBuf {
    base_dir.join("sessions").join(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_repo_name_entirely() {
        // Historical bug: "/X/<repoName>/sessions/t" disagreed with the
        // workspace path and produced subprocess failures. The resolver
        // signature doesn't even accept a repoName, so that regression is
        // structurally impossible.
        let path = session_path(Path::new("/X"), "t");
        assert_eq!(path, PathBuf::from("/X/sessions/t"));
    }

    #[test]
    fn stable_across_repeated_calls() {
        let base = Path::new("/base");
        assert_eq!(session_path(base, "a"), session_path(base, "a"));
    }
}
