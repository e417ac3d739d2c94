use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::task::{Priority, Task, is_due_soon, is_overdue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub high_priority: usize,
    /// Rounded percentage, 0 for an empty collection.
    pub completion_rate: u8,
}

pub fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // round-half-up of completed * 100 / total
    let rate = (completed * 200 + total) / (2 * total);
    u8::try_from(rate.min(100)).unwrap_or(100)
}

pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>, due_soon_window: Duration) -> TaskStats {
    let mut stats = TaskStats {
        total: tasks.len(),
        ..TaskStats::default()
    };

    for task in tasks {
        if task.completed {
            stats.completed += 1;
        } else {
            stats.pending += 1;
            if task.priority == Priority::High {
                stats.high_priority += 1;
            }
        }
        if is_overdue(task, now) {
            stats.overdue += 1;
        }
        if is_due_soon(task, now, due_soon_window) {
            stats.due_soon += 1;
        }
    }

    stats.completion_rate = completion_rate(stats.completed, stats.total);
    stats
}

/// Summary shown before an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExportStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub overdue: usize,
}

pub fn export_stats(tasks: &[Task], now: DateTime<Utc>) -> ExportStats {
    let mut stats = ExportStats {
        total: tasks.len(),
        ..ExportStats::default()
    };
    for task in tasks {
        if task.completed {
            stats.completed += 1;
        } else {
            stats.pending += 1;
        }
        match task.priority {
            Priority::High => stats.high += 1,
            Priority::Medium => stats.medium += 1,
            Priority::Low => stats.low += 1,
        }
        if is_overdue(task, now) {
            stats.overdue += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::{at, task};

    #[test]
    fn empty_collection_has_zero_rate() {
        let stats = compute_stats(&[], Utc::now(), Duration::hours(24));
        assert_eq!(stats, TaskStats::default());
        assert_eq!(stats.completion_rate, 0);
    }

    #[test]
    fn counts_partition_the_total() {
        let now = at(2026, 2, 17, 12);
        let mut overdue = task("1", "Overdue thing");
        overdue.due_date = Some(now - Duration::days(1));
        overdue.priority = Priority::High;

        let mut soon = task("2", "Soon thing");
        soon.due_date = Some(now + Duration::hours(5));

        let mut done = task("3", "Done thing");
        done.completed = true;
        done.priority = Priority::High;
        done.due_date = Some(now - Duration::days(3));

        let stats = compute_stats(&[overdue, soon, done], now, Duration::hours(24));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed + stats.pending, stats.total);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_soon, 1);
        assert_eq!(stats.high_priority, 1);
        assert_eq!(stats.completion_rate, 33);
    }

    #[test]
    fn rate_rounds_half_up() {
        assert_eq!(completion_rate(1, 8), 13);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(3, 3), 100);
    }

    #[test]
    fn export_stats_split_by_priority() {
        let now = at(2026, 2, 17, 12);
        let mut low = task("1", "Low one");
        low.priority = Priority::Low;
        let medium = task("2", "Medium one");
        let stats = export_stats(&[low, medium], now);
        assert_eq!((stats.high, stats.medium, stats.low), (0, 1, 1));
        assert_eq!(stats.pending, 2);
    }
}
