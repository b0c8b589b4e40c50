//! Canonical ordering of a visible task collection.
//!
//! # Invariants
//! - Every uncompleted task precedes every completed task.
//! - Uncompleted tasks keep their relative order.
//! - Completed tasks ascend by `completed_at`; ties keep their relative order.
//! - A completed task without `completed_at` sorts before dated completions.

use crate::model::task::Task;
use std::cmp::Ordering;

/// Sorts `tasks` in place into canonical order. Stable.
pub fn canonical_sort(tasks: &mut [Task]) {
    tasks.sort_by(compare_canonical);
}

pub fn compare_canonical(left: &Task, right: &Task) -> Ordering {
    match (left.completed, right.completed) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => left.completed_at.cmp(&right.completed_at),
    }
}

/// Returns whether `tasks` already satisfies the canonical order.
pub fn is_canonically_ordered(tasks: &[Task]) -> bool {
    tasks
        .windows(2)
        .all(|pair| compare_canonical(&pair[0], &pair[1]) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::{canonical_sort, is_canonically_ordered};
    use crate::model::task::{Task, TaskId};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap()
    }

    fn open(id: &str) -> Task {
        Task::new(TaskId::new(id), id, base(), None)
    }

    fn done(id: &str, minutes: i64) -> Task {
        let mut task = open(id);
        task.mark_completed(base() + Duration::minutes(minutes));
        task
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn open_tasks_keep_order_and_precede_completed() {
        let mut tasks = vec![done("d1", 5), open("a"), done("d0", 1), open("b"), open("c")];
        canonical_sort(&mut tasks);
        assert_eq!(ids(&tasks), vec!["a", "b", "c", "d0", "d1"]);
        assert!(is_canonically_ordered(&tasks));
    }

    #[test]
    fn equal_completion_instants_keep_prior_order() {
        let mut tasks = vec![done("x", 3), done("y", 3), open("a"), done("z", 3)];
        canonical_sort(&mut tasks);
        assert_eq!(ids(&tasks), vec!["a", "x", "y", "z"]);
    }

    #[test]
    fn undated_completion_sorts_first_among_completed() {
        let mut legacy = open("legacy");
        legacy.completed = true;
        let mut tasks = vec![done("dated", 1), legacy];
        canonical_sort(&mut tasks);
        assert_eq!(ids(&tasks), vec!["legacy", "dated"]);
    }

    #[test]
    fn detects_unsorted_collection() {
        let tasks = vec![done("d", 1), open("a")];
        assert!(!is_canonically_ordered(&tasks));
    }
}
