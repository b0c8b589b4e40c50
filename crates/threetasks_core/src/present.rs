//! Display-only views over a task snapshot.
//!
//! Nothing here feeds back into the store: callers render the returned
//! vectors and keep acting on ids.

use crate::model::task::Task;
use chrono::NaiveDate;
use std::cmp::Reverse;

/// Open tasks in their list order, then completed tasks newest first.
///
/// Completed tasks without a completion time go last.
pub fn completed_newest_first(tasks: &[Task]) -> Vec<Task> {
    let (mut completed, open): (Vec<Task>, Vec<Task>) =
        tasks.iter().cloned().partition(|task| task.completed);
    completed.sort_by_key(|task| Reverse(task.completed_at));
    let mut ordered = open;
    ordered.extend(completed);
    ordered
}

/// Index where the "Completed" section header belongs, if any task is done.
pub fn first_completed_index(tasks: &[Task]) -> Option<usize> {
    tasks.iter().position(|task| task.completed)
}

/// Month and day without padding, e.g. `Mar 5`.
pub fn short_date_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

#[cfg(test)]
mod tests {
    use super::{completed_newest_first, first_completed_index, short_date_label};
    use crate::model::task::{Task, TaskId};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn task(id: &str, completed_minute: Option<i64>) -> Task {
        let base = Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap();
        let mut task = Task::new(TaskId::new(id), id, base, None);
        if let Some(minute) = completed_minute {
            task.mark_completed(base + Duration::minutes(minute));
        }
        task
    }

    #[test]
    fn newest_completion_comes_first_after_open_tasks() {
        let tasks = vec![task("a", None), task("old", Some(1)), task("b", None), task("new", Some(9))];
        let view = completed_newest_first(&tasks);
        let ids: Vec<&str> = view.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "new", "old"]);
        assert_eq!(first_completed_index(&view), Some(2));
        assert_eq!(tasks[1].id.as_str(), "old");
    }

    #[test]
    fn no_header_without_completed_tasks() {
        assert_eq!(first_completed_index(&[task("a", None)]), None);
        assert_eq!(first_completed_index(&[]), None);
    }

    #[test]
    fn short_label_drops_day_padding() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(short_date_label(date), "Mar 5");
        let date = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();
        assert_eq!(short_date_label(date), "Dec 24");
    }
}
