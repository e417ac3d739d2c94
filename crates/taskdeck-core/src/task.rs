use chrono::{DateTime, Duration, Utc};
pub use taskdeck_shared::{Priority, Task, TaskCreate, TaskPatch, Todo, TodoPatch};

use crate::datetime::date_to_utc;

pub fn status_label(completed: bool) -> &'static str {
    if completed { "Completed" } else { "Pending" }
}

/// Due strictly before `now` and not completed.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    if task.completed {
        return false;
    }
    task.due_date.map(|due| due < now).unwrap_or(false)
}

/// Not yet due, but due within `window` of `now`, and not completed.
pub fn is_due_soon(task: &Task, now: DateTime<Utc>, window: Duration) -> bool {
    if task.completed {
        return false;
    }
    let Some(due) = task.due_date else {
        return false;
    };
    let remaining = due - now;
    remaining > Duration::zero() && remaining <= window
}

/// Merges a patch into a record the way the server would, used for the
/// optimistic local copy.
pub fn apply_patch(task: &mut Task, patch: &TaskPatch, now: DateTime<Utc>) {
    if let Some(title) = patch.title.as_ref() {
        task.title = title.clone();
    }
    if let Some(description) = patch.description.as_ref() {
        task.description = description.clone();
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(completed) = patch.completed {
        task.completed = completed;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date.map(date_to_utc);
    }
    if let Some(due_time) = patch.due_time.as_ref() {
        task.due_time = due_time.clone();
    }
    if let Some(order) = patch.order {
        task.order = Some(order);
    }
    task.updated_at = Some(now);
}
