use chrono::{Duration, Utc};
use taskflow_core::board::{Notice, TaskBoard};
use taskflow_core::config::Config;
use taskflow_core::datetime::DueBucket;
use taskflow_core::error::ErrorKind;
use taskflow_core::filter::CategorySelection;
use taskflow_core::store::{Backend, CategoryStore, TaskStore};
use taskflow_core::task::{CategoryDraft, Priority, TaskDraft, TaskPatch};
use tempfile::tempdir;

fn backend(kind: &str, data_dir: &std::path::Path) -> Backend {
    let mut cfg = Config::default();
    cfg.set("backend", kind);
    Backend::from_config(&cfg, data_dir).expect("backend from config")
}

#[tokio::test]
async fn memory_board_create_complete_delete() {
    let temp = tempdir().expect("tempdir");
    let mut board = TaskBoard::new(backend("memory", temp.path()), chrono_tz::UTC);
    assert!(board.load().await);
    assert_eq!(board.store().name(), "memory");

    let now = Utc::now();
    let draft = TaskDraft {
        category_id: Some("work".to_string()),
        priority: Some(Priority::High),
        due_date: Some(now),
        ..TaskDraft::new("Ship release notes")
    };
    let created = board.create_task(draft).await.expect("created");
    assert_eq!(created.id, "9");
    assert!(!created.completed && created.completed_at.is_none());

    board.select_category(CategorySelection::parse("work"));
    let view = board.view(now);
    let row = view
        .rows
        .iter()
        .find(|r| r.task.id == created.id)
        .expect("new task is listed");
    assert_eq!(row.due, DueBucket::Today);
    assert_eq!(row.category_name.as_deref(), Some("Work"));
    assert_eq!(view.rows[0].task.id, "1");
    assert_eq!(view.rows[1].task.id, created.id, "high priority ahead of medium");

    let done = board.toggle_complete(&created.id, true).await.expect("completed");
    assert!(done.completed_at.is_some());
    let reopened = board.toggle_complete(&created.id, false).await.expect("reopened");
    assert!(reopened.completed_at.is_none());

    assert!(board.delete_task(&created.id).await);
    assert!(board.tasks().iter().all(|t| t.id != created.id));

    let notices = board.take_notices();
    assert_eq!(
        notices,
        vec![
            Notice::Success("Task created successfully!".to_string()),
            Notice::Success("Task completed!".to_string()),
            Notice::Success("Task deleted".to_string()),
        ]
    );
}

#[tokio::test]
async fn failed_update_keeps_the_snapshot() {
    let temp = tempdir().expect("tempdir");
    let mut board = TaskBoard::new(backend("memory", temp.path()), chrono_tz::UTC);
    assert!(board.load().await);
    let before = board.tasks().to_vec();

    assert!(board.toggle_complete("999", true).await.is_none());
    assert_eq!(board.tasks(), before.as_slice());
    assert_eq!(board.take_notices(), vec![Notice::Error("Failed to update task".to_string())]);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let temp = tempdir().expect("tempdir");

    let first = backend("file", temp.path());
    let task = TaskStore::create(&first, TaskDraft::new("Back up photos"))
        .await
        .expect("create");
    TaskStore::update(&first, &task.id, TaskPatch::completed(true))
        .await
        .expect("complete");
    CategoryStore::create(
        &first,
        CategoryDraft {
            name: "Side Projects".to_string(),
            ..CategoryDraft::default()
        },
    )
    .await
    .expect("category");
    drop(first);

    let second = backend("file", temp.path());
    let reloaded = TaskStore::get_by_id(&second, &task.id)
        .await
        .expect("read")
        .expect("task persisted");
    assert_eq!(reloaded.title, "Back up photos");
    assert_eq!(reloaded.category_id, "general");
    assert!(reloaded.completed && reloaded.completed_at.is_some());

    let side = CategoryStore::get_by_id(&second, "side-projects")
        .await
        .expect("read")
        .expect("category persisted");
    assert_eq!(side.name, "Side Projects");
    assert_eq!(CategoryStore::get_all(&second).await.expect("all").len(), 6);
}

#[tokio::test]
async fn missing_ids_and_blank_titles_are_typed_errors() {
    let temp = tempdir().expect("tempdir");
    let store = backend("memory", temp.path());

    let err = TaskStore::delete(&store, "404").await.expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = TaskStore::create(&store, TaskDraft::new("  ")).await.expect_err("blank");
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(TaskStore::get_all(&store).await.expect("all").len(), 8);
}

#[tokio::test]
async fn reorder_never_lifts_completed_tasks() {
    let temp = tempdir().expect("tempdir");
    let mut board = TaskBoard::new(backend("memory", temp.path()), chrono_tz::UTC);

    let moved = TaskStore::reorder(board.store(), "3", -5).await.expect("reorder");
    assert_eq!(moved.order, -5);

    assert!(board.load().await);
    board.select_category(CategorySelection::parse("work"));
    let ids: Vec<String> = board.view(Utc::now()).rows.into_iter().map(|r| r.task.id).collect();
    assert_eq!(ids, ["1", "2", "3"], "completed task stays last regardless of order");
}

#[tokio::test]
async fn projection_counts_cover_every_task() {
    let temp = tempdir().expect("tempdir");
    let mut board = TaskBoard::new(backend("memory", temp.path()), chrono_tz::UTC);
    assert!(board.load().await);

    board.set_search("zzz-no-match");
    let now = Utc::now() + Duration::days(365 * 10);
    let view = board.view(now);
    assert!(view.is_empty());
    assert_eq!(view.total, 8);
    assert_eq!(view.all_count, 8);

    let completed = board.tasks().iter().filter(|t| t.completed).count();
    assert_eq!(view.completed, completed);
    assert!(view.categories.iter().any(|c| c.id == "work" && c.count == 3));
}

#[test]
fn unknown_backend_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let mut cfg = Config::default();
    cfg.set("backend", "carrier-pigeon");
    assert!(Backend::from_config(&cfg, temp.path()).is_err());

    cfg.set("backend", "remote");
    assert!(Backend::from_config(&cfg, temp.path()).is_err(), "remote needs api.url");
}
