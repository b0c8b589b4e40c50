//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record persisted by local and relational backends.
//! - Provide completion lifecycle helpers and the due-date completion rule.
//!
//! # Invariants
//! - `id` is stable for the task lifetime.
//! - `created_at` is set once and never changes.
//! - `completed_at` is `Some` only while `completed == true`.
//! - `deleted_at == None` means the task is visible.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Hour of day used when a due date stands in for the completion instant.
pub const DUE_DATE_COMPLETION_HOUR: u32 = 12;

/// Opaque task identifier.
///
/// Locally created tasks get a random UUID; relational backends may replace it
/// with their own id after insert. Legacy blobs may carry arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One entry of a to-do list.
///
/// Serialized with camelCase keys; this is the local blob format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// Older blobs carried no creation time; those load as the Unix epoch.
    #[serde(default = "unix_epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Calendar date only, no time-of-day or zone.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an uncompleted, visible task.
    pub fn new(
        id: TaskId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
        due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            created_at,
            completed_at: None,
            due_date,
            deleted_at: None,
        }
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
    }

    pub fn mark_uncompleted(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    /// Returns whether this task should be considered visible/active.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Partial update applied to one persisted task.
///
/// Outer `None` means "leave unchanged"; for nullable columns the inner
/// `Option` is the new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    /// Patch carrying the current completion state of `task`.
    pub fn completion_of(task: &Task) -> Self {
        Self {
            completed: Some(task.completed),
            completed_at: Some(task.completed_at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.completed.is_none()
            && self.completed_at.is_none()
            && self.due_date.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

/// Noon (UTC) of `date`, used as the completion instant of due-dated tasks.
///
/// Noon keeps the calendar date unchanged for every zone within twelve hours
/// of UTC.
pub fn due_date_completion_instant(date: NaiveDate) -> DateTime<Utc> {
    let noon = NaiveTime::from_hms_opt(DUE_DATE_COMPLETION_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(noon).and_utc()
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::{due_date_completion_instant, Task, TaskId, TaskPatch};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn due_date_completion_is_noon_of_due_date() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let instant = due_date_completion_instant(due);
        assert_eq!(instant.to_rfc3339(), "2025-03-10T12:00:00+00:00");
    }

    #[test]
    fn legacy_blob_entry_without_optional_keys_deserializes() {
        let task: Task =
            serde_json::from_str(r#"{"id":"1700000000000","text":"old","completed":true}"#)
                .unwrap();
        assert_eq!(task.id, TaskId::new("1700000000000"));
        assert!(task.completed);
        assert!(task.completed_at.is_none());
        assert!(task.is_active());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let mut task = Task::new(TaskId::new("a"), "write", created, None);
        let patch = TaskPatch {
            completed: Some(true),
            completed_at: Some(Some(created)),
            ..TaskPatch::default()
        };
        patch.apply_to(&mut task);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(created));
        assert_eq!(task.text, "write");
        assert!(TaskPatch::default().is_empty());
    }
}
