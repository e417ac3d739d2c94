mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{FakeTasks, server_error, task};
use taskdeck_core::bulk::{self, Selection};
use taskdeck_core::export::{ExportFormat, export};
use taskdeck_core::filter::{SortKey, SortOrder, StatusFilter, filter_by_status, sort};
use taskdeck_core::reorder::{DragController, DragOutcome};
use taskdeck_core::stats::compute_stats;
use taskdeck_core::store::{RetryPolicy, TaskStore};
use taskdeck_core::task::is_overdue;
use taskdeck_shared::{Priority, Task, TaskCreate, TaskPatch, TaskQuery};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
        .single()
        .expect("fixture now")
}

fn mixed() -> Vec<Task> {
    let mut tasks = vec![
        task("a", "Pay rent"),
        task("b", "Call mom"),
        task("c", "Water plants"),
        task("d", "File taxes"),
    ];
    tasks[1].completed = true;
    tasks[2].due_date = Some(now() - Duration::days(1));
    tasks[3].due_date = Some(now() + Duration::hours(3));
    tasks[3].priority = Priority::High;
    tasks
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

#[test]
fn status_filter_is_an_idempotent_subset() {
    let tasks = mixed();
    for status in [StatusFilter::All, StatusFilter::Pending, StatusFilter::Completed] {
        let once = filter_by_status(&tasks, status);
        assert!(once.iter().all(|t| tasks.contains(t)));
        assert_eq!(filter_by_status(&once, status), once);
    }
}

#[test]
fn stats_partition_the_collection() {
    let stats = compute_stats(&mixed(), now(), Duration::hours(24));
    assert_eq!(stats.completed + stats.pending, stats.total);
    assert_eq!((stats.overdue, stats.due_soon, stats.high_priority), (1, 1, 1));
    assert_eq!(stats.completion_rate, 25);

    assert_eq!(compute_stats(&[], now(), Duration::hours(24)).completion_rate, 0);
}

#[test]
fn undated_tasks_sort_last_in_both_directions() {
    let tasks = mixed();
    for order in [SortOrder::Asc, SortOrder::Desc] {
        let sorted = sort(&tasks, SortKey::DueDate, order);
        let first_undated = sorted
            .iter()
            .position(|t| t.due_date.is_none())
            .expect("undated present");
        assert!(sorted[first_undated..].iter().all(|t| t.due_date.is_none()));
        assert_eq!(first_undated, 2);
    }
}

#[test]
fn csv_quotes_commas_and_doubles_quotes() {
    let tasks = vec![task("m", "Meeting, \"Q1\"")];
    let csv = export(&tasks, ExportFormat::Csv, now().date_naive()).expect("csv");
    let row = csv.lines().nth(1).expect("data row");
    assert!(row.starts_with("\"Meeting, \"\"Q1\"\"\","));
}

#[test]
fn dragging_row_two_to_the_top() {
    let tasks: Vec<Task> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| task(id, id))
        .collect();
    let mut drag = DragController::new(tasks);
    drag.press(2, 0.0, 0.0).expect("press");
    drag.pointer_move(0.0, -40.0);
    drag.hover(Some(0));

    match drag.release() {
        DragOutcome::Reordered(moved) => assert_eq!(ids(&moved), vec!["c", "a", "b", "d", "e"]),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn creating_a_task_moves_total_and_pending_only() {
    let fake = FakeTasks::with(mixed());
    let store = TaskStore::new(fake.clone(), RetryPolicy::default());
    store.fetch_all(&TaskQuery::default()).await.expect("fetch");
    let before = store.stats(now(), Duration::hours(24));

    store
        .create(&TaskCreate {
            title: "Buy milk".to_string(),
            description: String::new(),
            priority: Priority::Low,
            due_date: None,
            due_time: None,
        })
        .await
        .expect("create");
    store.fetch_all(&TaskQuery::default()).await.expect("refetch");
    let after = store.stats(now(), Duration::hours(24));

    assert_eq!(after.total, before.total + 1);
    assert_eq!(after.pending, before.pending + 1);
    assert_eq!(after.overdue, before.overdue);
}

#[tokio::test]
async fn completing_an_overdue_task_clears_overdue() {
    let fake = FakeTasks::with(mixed());
    let store = TaskStore::new(fake.clone(), RetryPolicy::default());
    store.fetch_all(&TaskQuery::default()).await.expect("fetch");
    assert!(is_overdue(&store.get("c").expect("c"), now()));

    store.toggle_completion("c", true).await.expect("complete");
    assert!(!is_overdue(&store.get("c").expect("c"), now()));
}

#[tokio::test]
async fn failed_update_restores_the_exact_record() {
    let fake = FakeTasks::with(mixed());
    let store = TaskStore::new(fake.clone(), RetryPolicy::default());
    store.fetch_all(&TaskQuery::default()).await.expect("fetch");
    let before = store.get("d").expect("d");
    fake.fail_update.lock().push_back(server_error());

    let patch = TaskPatch {
        title: Some("Renamed".to_string()),
        priority: Some(Priority::Low),
        due_date: Some(None),
        ..TaskPatch::default()
    };
    store.update("d", &patch).await.expect_err("refused");

    assert_eq!(store.get("d").expect("d"), before);
}

#[tokio::test]
async fn reorder_is_a_permutation_and_bulk_delete_fans_out() {
    let fake = FakeTasks::with(mixed());
    let store = TaskStore::new(fake.clone(), RetryPolicy::default());
    store.fetch_all(&TaskQuery::default()).await.expect("fetch");

    let mut reversed = store.tasks();
    reversed.reverse();
    store.reorder(reversed).await.expect("join").expect("persist");
    let mut after: Vec<String> = store.tasks().into_iter().map(|t| t.id).collect();
    after.sort();
    assert_eq!(after, vec!["a", "b", "c", "d"]);

    fake.fail_delete.lock().push_back(server_error());
    let mut selection = Selection::for_tasks(&store.tasks());
    selection.select_all(["a", "c", "d"]);
    let report = bulk::delete_selected(&store, &mut selection).await;

    assert_eq!(fake.deletes.lock().len(), 3);
    assert_eq!(report.total(), 3);
    assert!(selection.is_empty());
}

#[tokio::test]
async fn reorder_ignores_unknown_and_repeated_ids() {
    let fake = FakeTasks::with(vec![task("a", "A"), task("b", "B"), task("c", "C")]);
    let store = TaskStore::new(fake.clone(), RetryPolicy::default());
    store.fetch_all(&TaskQuery::default()).await.expect("fetch");

    let local = store.tasks();
    let requested = vec![local[2].clone(), local[2].clone(), task("zz", "Stranger")];
    store.reorder(requested).await.expect("join").expect("persist");

    assert_eq!(ids(&store.tasks()), vec!["c", "a", "b"]);
    assert!(fake.updates.lock().iter().all(|(id, _)| id != "zz"));
}
