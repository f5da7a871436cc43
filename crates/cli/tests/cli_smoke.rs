//! End-to-end tests driving the `sessionforge` binary as a subprocess,
//! each isolated to its own tempdir via `SESSIONFORGE_BASE_DIR`.

use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(base_dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sessionforge"));
    cmd.env("SESSIONFORGE_BASE_DIR", base_dir)
        .env("SESSIONFORGE_STORAGE_KIND", "json")
        .env("SESSIONFORGE_STORAGE_LOCATION", "sessions.json")
        .env_remove("SESSIONFORGE_POSTGRES_DSN")
        .env_remove("XDG_STATE_HOME")
        .env_remove("XDG_CONFIG_HOME");
    cmd
}

fn init_repo(dir: &std::path::Path) {
    let run = |args: &[&str]| {
        StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .expect("git invocation succeeds");
    };
    run(&["init", "--initial-branch=main", "."]);
    std::fs::write(dir.join("README.md"), b"hello\n").expect("write file");
    run(&["add", "."]);
    run(&["commit", "-m", "initial commit"]);
}

#[test]
fn config_show_reflects_env_var_overrides() {
    let base = TempDir::new().expect("tempdir");
    cmd(base.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(base.path().display().to_string()))
        .stdout(predicate::str::contains("storage_kind: json"));
}

#[test]
fn config_show_json_is_well_formed() {
    let base = TempDir::new().expect("tempdir");
    let output = cmd(base.path())
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(value["storage_kind"], "json");
    assert_eq!(value["storage_location"], "sessions.json");
}

#[test]
fn session_list_on_fresh_store_reports_empty() {
    let base = TempDir::new().expect("tempdir");
    cmd(base.path())
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no sessions"));
}

#[test]
fn session_get_missing_session_fails_with_message() {
    let base = TempDir::new().expect("tempdir");
    cmd(base.path())
        .args(["session", "get", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session not found"));
}

#[test]
fn doctor_on_fresh_store_reports_valid_json() {
    let base = TempDir::new().expect("tempdir");
    // Any prior command initializes the backend, which creates the store
    // file — run one first so doctor observes a real, valid file rather
    // than the missing-file branch.
    cmd(base.path()).args(["session", "list"]).assert().success();

    cmd(base.path())
        .args(["doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("format: json (valid: true)"));
}

#[test]
fn doctor_on_missing_store_suggests_create() {
    let base = TempDir::new().expect("tempdir");
    let output = cmd(base.path())
        .args(["doctor", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(value["actual_format"], "empty");
    assert_eq!(value["suggested_actions"][0]["kind"], "create");
}

#[test]
fn migrate_detect_with_no_legacy_layout_reports_none() {
    let base = TempDir::new().expect("tempdir");
    cmd(base.path())
        .args(["migrate", "detect"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no legacy sessions found"));
}

#[test]
fn session_create_clones_local_repo_and_round_trips_through_get_list_delete() {
    let base = TempDir::new().expect("tempdir");
    let source = TempDir::new().expect("tempdir");
    init_repo(source.path());

    cmd(base.path())
        .args([
            "session",
            "create",
            "demo",
            source.path().to_str().expect("utf8 path"),
            "--branch",
            "work",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created session demo"));

    let output = cmd(base.path())
        .args(["session", "get", "demo", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(value["branch"], "work");
    assert_eq!(value["session"], "demo");

    cmd(base.path())
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"));

    let workdir = base.path().join("sessions").join("demo");
    assert!(workdir.join("README.md").exists());

    cmd(base.path())
        .args(["session", "delete", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted session demo"));

    cmd(base.path())
        .args(["session", "get", "demo"])
        .assert()
        .failure();
}

#[test]
fn session_create_rejects_duplicate_name() {
    let base = TempDir::new().expect("tempdir");
    let source = TempDir::new().expect("tempdir");
    init_repo(source.path());
    let repo = source.path().to_str().expect("utf8 path");

    cmd(base.path())
        .args(["session", "create", "dup", repo])
        .assert()
        .success();

    cmd(base.path())
        .args(["session", "create", "dup", repo])
        .assert()
        .failure();
}

#[test]
fn invalid_session_name_is_rejected_before_any_git_call() {
    let base = TempDir::new().expect("tempdir");
    cmd(base.path())
        .args(["session", "create", "123-bad", "https://example.com/org/repo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid session name"));
}

#[test]
fn no_panic_across_subcommand_help_flags() {
    let base = TempDir::new().expect("tempdir");
    let invocations: Vec<Vec<&str>> = vec![
        vec!["--help"],
        vec!["session", "--help"],
        vec!["session", "list", "--help"],
        vec!["changeset", "--help"],
        vec!["migrate", "--help"],
        vec!["doctor", "--help"],
        vec!["config", "--help"],
        vec!["--version"],
    ];

    for args in invocations {
        cmd(base.path())
            .args(&args)
            .assert()
            .code(predicate::ne(134).and(predicate::ne(101)));
    }
}
