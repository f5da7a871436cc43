//! Cross-module lifecycle test: registers a session against a real git
//! clone, drives it through the Approval/Merge Engine with the dispatched
//! `LocalBackend`, and checks both `SessionStore` and `ApprovalEngine`
//! event buses observe the transitions. Every other test in this crate
//! exercises one module in isolation; this one exercises the seam between
//! `store`, `backend::select_backend`, `approval`, and `task` the way the
//! CLI actually wires them in `context.rs`.

use std::path::Path;
use std::sync::Arc;

use sessionforge_core::approval::{ApprovalEngine, CreateOptions};
use sessionforge_core::backend::{select_backend, BackendKind};
use sessionforge_core::domain::events::DomainEvent;
use sessionforge_core::domain::session::SessionName;
use sessionforge_core::domain::session::SessionRecord;
use sessionforge_core::git_process::run_git;
use sessionforge_core::store::backend::json::JsonBackend;
use sessionforge_core::store::{SessionStore, StorageBackend};
use sessionforge_core::task::{InMemoryTaskStore, Task, TaskId, TaskStatus, TaskStore};

async fn init_source_repo(path: &Path) {
    run_git(path, ["init", "-q", "-b", "main"], None).await.expect("init");
    run_git(path, ["config", "user.email", "t@example.com"], None)
        .await
        .expect("email");
    run_git(path, ["config", "user.name", "Test"], None).await.expect("name");
    tokio::fs::write(path.join("a.txt"), b"base\n").await.expect("write");
    run_git(path, ["add", "."], None).await.expect("add");
    run_git(path, ["commit", "-m", "initial"], None).await.expect("commit");
}

#[tokio::test]
async fn session_create_through_merge_round_trips_across_modules() {
    let base = tempfile::tempdir().expect("tempdir");
    let source = tempfile::tempdir().expect("tempdir");
    init_source_repo(source.path()).await;

    let store_path = base.path().join("sessions.json");
    let backend: Arc<dyn StorageBackend> = Arc::new(JsonBackend::new(store_path));
    backend.initialize().await.expect("initialize store");
    let store = Arc::new(SessionStore::new(backend, base.path().to_path_buf()));

    let session_name = SessionName::parse("lifecycle").expect("valid");
    let task_id = TaskId::new(42);
    let task_store = Arc::new(InMemoryTaskStore::new());
    task_store.insert(Task {
        id: task_id.clone(),
        title: "ship the feature".to_string(),
        status: TaskStatus::Todo,
    });

    let repo_url = source.path().to_string_lossy().to_string();
    let mut record = SessionRecord::new(session_name.clone(), "local/source".to_string(), repo_url.clone());
    record.task_id = Some(task_id.clone());

    let workdir = store.get_repo_path(&record);
    tokio::fs::create_dir_all(workdir.parent().expect("has parent"))
        .await
        .expect("mkdir parent");
    run_git(
        workdir.parent().expect("has parent"),
        ["clone", repo_url.as_str(), workdir.to_string_lossy().as_ref()],
        None,
    )
    .await
    .expect("clone");

    let mut store_events = store.events().subscribe();
    store.add(record.clone()).await.expect("register session");
    assert!(matches!(
        store_events.recv().await.expect("event delivered"),
        DomainEvent::SessionCreated { .. }
    ));

    tokio::fs::write(workdir.join("feature.txt"), b"feature\n")
        .await
        .expect("write feature file");
    run_git(&workdir, ["add", "."], None).await.expect("add");
    run_git(&workdir, ["commit", "-m", "feature work"], None)
        .await
        .expect("commit feature work");

    let repo_backend = select_backend(&repo_url, base.path().to_path_buf()).expect("select backend");
    assert_eq!(repo_backend.get_type(), BackendKind::Local);

    let engine = ApprovalEngine::new(store.clone(), task_store.clone());
    let mut engine_events = engine.events().subscribe();

    engine
        .create(
            &session_name,
            repo_backend.as_ref(),
            "pr/lifecycle".to_string(),
            "ship it".to_string(),
            "".to_string(),
            "main".to_string(),
            CreateOptions::default(),
        )
        .await
        .expect("create proposal");
    assert!(matches!(
        engine_events.recv().await.expect("event delivered"),
        DomainEvent::ProposalCreated { .. }
    ));
    assert_eq!(task_store.get_task_status(&task_id), Some(TaskStatus::InReview));

    engine.approve(&session_name, repo_backend.as_ref()).await.expect("approve proposal");
    assert!(matches!(
        engine_events.recv().await.expect("event delivered"),
        DomainEvent::ProposalApproved { .. }
    ));

    let merged = engine.merge(&session_name, repo_backend.as_ref()).await.expect("merge proposal");
    assert!(matches!(
        engine_events.recv().await.expect("event delivered"),
        DomainEvent::ProposalMerged { .. }
    ));
    assert!(merged.pr_state.as_ref().and_then(|s| s.commit_hash.as_ref()).is_some());
    assert_eq!(task_store.get_task_status(&task_id), Some(TaskStatus::Done));

    assert!(workdir.join("feature.txt").exists());

    let persisted = store.get(&session_name).await.expect("no error").expect("record persists");
    assert_eq!(persisted.pr_approved, Some(true));

    store.delete(&session_name).await.expect("delete ok");
    assert!(matches!(
        store_events.recv().await.expect("event delivered"),
        DomainEvent::SessionDeleted { .. }
    ));
}
