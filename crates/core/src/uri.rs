//! Repository URI normalization — the single point where every remote/local/
//! shorthand repository reference is parsed into a typed, normalized form.
//!
//! `parse` is total: it never fails. Anything that isn't recognized as one
//! of the structured forms becomes a `LocalPath`. Fallibility only shows up
//! in [`validate`], which additionally checks the filesystem for local
//! kinds.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// The recognized shape of a repository reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UriKind {
    Https,
    Ssh,
    File,
    LocalPath,
    HostedShorthand,
}

/// A parsed, normalized repository reference.
///
/// `normalized` is `"<owner>/<repo>"` (`.git` suffix stripped) for every
/// remote kind, and `"local/<basename>"` for `File`/`LocalPath`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepositoryUri {
    pub kind: UriKind,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub path: Option<String>,
    pub normalized: String,
    pub original: String,
}

/// Validation result for a parsed URI. `InvalidUri` is the only error kind
/// this module produces, and only from [`validate`] — `parse` is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
}

fn ssh_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^@]+)@([^:]+):([^/]+)/([^/]+?)(\.git)?$")
            .expect("static SSH regex is valid")
    })
}

fn basename(s: &str) -> String {
    Path::new(s)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| s.to_string())
}

fn strip_git_suffix(s: &str) -> &str {
    s.strip_suffix(".git").unwrap_or(s)
}

/// Parse any repository reference into a typed, normalized identifier.
///
/// Total: every input produces a `RepositoryUri`, falling back to
/// `LocalPath` when nothing more specific matches.
#[must_use]
pub fn parse(input: &str) -> RepositoryUri {
    let original = input.to_string();
    let trimmed = input.trim();

    if let Some(path) = trimmed.strip_prefix("file://") {
        let base = basename(path);
        return RepositoryUri {
            kind: UriKind::File,
            scheme: Some("file".into()),
            host: None,
            owner: None,
            repo: None,
            path: Some(path.to_string()),
            normalized: format!("local/{base}"),
            original,
        };
    }

    if let Some(caps) = ssh_regex().captures(trimmed) {
        let owner = caps[3].to_string();
        let repo = strip_git_suffix(&caps[4]).to_string();
        return RepositoryUri {
            kind: UriKind::Ssh,
            scheme: Some("ssh".into()),
            host: Some(caps[2].to_string()),
            owner: Some(owner.clone()),
            repo: Some(repo.clone()),
            path: None,
            normalized: format!("{owner}/{repo}"),
            original,
        };
    }

    if trimmed.contains("://") {
        if let Some(uri) = try_scheme_uri(trimmed, &original) {
            return uri;
        }
    }

    if let Some(uri) = try_shorthand(trimmed, &original) {
        return uri;
    }

    let base = basename(trimmed);
    RepositoryUri {
        kind: UriKind::LocalPath,
        scheme: None,
        host: None,
        owner: None,
        repo: None,
        path: Some(trimmed.to_string()),
        normalized: format!("local/{base}"),
        original,
    }
}

fn try_scheme_uri(trimmed: &str, original: &str) -> Option<RepositoryUri> {
    let url = url::Url::parse(trimmed).ok()?;
    let mut segments = url
        .path_segments()?
        .filter(|seg| !seg.is_empty());
    let owner = segments.next()?.to_string();
    let repo_raw = segments.next()?;
    let repo = strip_git_suffix(repo_raw).to_string();

    Some(RepositoryUri {
        kind: UriKind::Https,
        scheme: Some(url.scheme().to_string()),
        host: url.host_str().map(str::to_string),
        owner: Some(owner.clone()),
        repo: Some(repo.clone()),
        path: None,
        normalized: format!("{owner}/{repo}"),
        original: original.to_string(),
    })
}

fn try_shorthand(trimmed: &str, original: &str) -> Option<RepositoryUri> {
    if trimmed.starts_with('/') || trimmed.contains("://") || trimmed.contains('@') {
        return None;
    }
    let slash_count = trimmed.matches('/').count();
    if slash_count != 1 {
        return None;
    }
    let (owner, repo_raw) = trimmed.split_once('/')?;
    if owner.is_empty() || repo_raw.is_empty() {
        return None;
    }
    let repo = strip_git_suffix(repo_raw).to_string();
    Some(RepositoryUri {
        kind: UriKind::HostedShorthand,
        scheme: None,
        host: None,
        owner: Some(owner.to_string()),
        repo: Some(repo.clone()),
        path: None,
        normalized: format!("{owner}/{repo}"),
        original: original.to_string(),
    })
}

/// `uri.kind` is one of the two local kinds.
#[must_use]
pub fn is_local(uri: &RepositoryUri) -> bool {
    matches!(uri.kind, UriKind::File | UriKind::LocalPath)
}

/// Validate a parsed URI. Local kinds additionally require the referenced
/// path to exist on disk.
#[must_use]
pub fn validate(uri: &RepositoryUri) -> ValidationReport {
    if is_local(uri) {
        let Some(path) = &uri.path else {
            return ValidationReport {
                valid: false,
                error: Some("local URI has no path".to_string()),
            };
        };
        if !Path::new(path).exists() {
            return ValidationReport {
                valid: false,
                error: Some(format!("path does not exist: {path}")),
            };
        }
        return ValidationReport {
            valid: true,
            error: None,
        };
    }

    if uri.owner.is_none() || uri.repo.is_none() {
        return ValidationReport {
            valid: false,
            error: Some("remote URI missing owner/repo".to_string()),
        };
    }

    ValidationReport {
        valid: true,
        error: None,
    }
}

/// Re-render a parsed URI as `target`, when it carries enough information
/// (owner + repo) to do so. Returns `None` when the conversion is
/// incompatible — e.g. a local path has no owner/repo to render remotely.
#[must_use]
pub fn convert(uri: &RepositoryUri, target: UriKind) -> Option<String> {
    match target {
        UriKind::File | UriKind::LocalPath => None,
        UriKind::HostedShorthand => {
            let (owner, repo) = (uri.owner.as_ref()?, uri.repo.as_ref()?);
            Some(format!("{owner}/{repo}"))
        }
        UriKind::Https => {
            let (owner, repo) = (uri.owner.as_ref()?, uri.repo.as_ref()?);
            let host = uri.host.as_deref().unwrap_or("github.com");
            Some(format!("https://{host}/{owner}/{repo}.git"))
        }
        UriKind::Ssh => {
            let (owner, repo) = (uri.owner.as_ref()?, uri.repo.as_ref()?);
            let host = uri.host.as_deref().unwrap_or("github.com");
            Some(format!("git@{host}:{owner}/{repo}.git"))
        }
    }
}

/// Expand a hosted shorthand (`"owner/repo"`) into a fully-qualified URI of
/// the given scheme. Returns `None` for malformed input.
#[must_use]
pub fn expand_shorthand(input: &str, scheme: UriKind) -> Option<String> {
    let parsed = try_shorthand(input.trim(), input)?;
    convert(&parsed, scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_with_git_suffix() {
        let uri = parse("https://github.com/org/repo.git");
        assert_eq!(uri.kind, UriKind::Https);
        assert_eq!(uri.normalized, "org/repo");
    }

    #[test]
    fn ssh_form() {
        let uri = parse("git@github.com:org/repo.git");
        assert_eq!(uri.kind, UriKind::Ssh);
        assert_eq!(uri.normalized, "org/repo");
    }

    #[test]
    fn file_uri() {
        let uri = parse("file:///tmp/project");
        assert_eq!(uri.normalized, "local/project");
    }

    #[test]
    fn bare_local_path() {
        let uri = parse("/tmp/project");
        assert_eq!(uri.kind, UriKind::LocalPath);
        assert_eq!(uri.normalized, "local/project");
    }

    #[test]
    fn hosted_shorthand() {
        let uri = parse("org/repo");
        assert_eq!(uri.kind, UriKind::HostedShorthand);
        assert_eq!(uri.normalized, "org/repo");
    }

    #[test]
    fn malformed_scheme_uri_falls_back_to_local_path() {
        let uri = parse("https://invalid]url");
        assert_eq!(uri.kind, UriKind::LocalPath);
    }

    #[test]
    fn parse_is_idempotent_on_normalized_form() {
        for input in [
            "https://github.com/org/repo.git",
            "git@github.com:org/repo.git",
            "org/repo",
            "file:///tmp/project",
        ] {
            let first = parse(input);
            let second = parse(&first.normalized);
            assert_eq!(first.normalized, second.normalized);
        }
    }

    #[test]
    fn expand_shorthand_round_trips() {
        let uri = parse("org/repo");
        let expanded = expand_shorthand(&uri.normalized, UriKind::Ssh).expect("expands");
        let reparsed = parse(&expanded);
        assert_eq!(reparsed.normalized, uri.normalized);
    }

    #[test]
    fn expand_shorthand_rejects_malformed() {
        assert!(expand_shorthand("not-a-shorthand-at-all/too/many/slashes", UriKind::Https).is_none());
    }

    #[test]
    fn validate_rejects_missing_local_path() {
        let uri = parse("/no/such/path/hopefully");
        let report = validate(&uri);
        assert!(!report.valid);
    }

    #[test]
    fn is_local_classification() {
        assert!(is_local(&parse("/tmp")));
        assert!(is_local(&parse("file:///tmp")));
        assert!(!is_local(&parse("org/repo")));
    }
}
