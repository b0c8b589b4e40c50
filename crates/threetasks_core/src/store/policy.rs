//! Per-list behavioral flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between checking a task and removing it under `delete_on_complete`.
pub const COMPLETION_GRACE_DELAY: Duration = Duration::from_millis(600);

/// Immutable behavior of one task list, fixed when the store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPolicy {
    /// Completed tasks leave the list after [`COMPLETION_GRACE_DELAY`];
    /// when false the list is re-sorted after every mutation instead.
    pub delete_on_complete: bool,
    /// New tasks go to the head of the list instead of the tail.
    pub prepend: bool,
    /// Completing a task with a due date stamps noon of that date rather
    /// than the current instant.
    pub use_due_date_as_completion_date: bool,
}

impl ListPolicy {
    /// Completed tasks sink below open ones and stay.
    pub const fn sort_to_bottom() -> Self {
        Self {
            delete_on_complete: false,
            prepend: false,
            use_due_date_as_completion_date: false,
        }
    }

    /// Completed tasks disappear after the grace delay.
    pub const fn delete_on_complete() -> Self {
        Self {
            delete_on_complete: true,
            prepend: false,
            use_due_date_as_completion_date: false,
        }
    }

    pub const fn with_prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }

    pub const fn with_due_date_completion(mut self, enabled: bool) -> Self {
        self.use_due_date_as_completion_date = enabled;
        self
    }

    /// Whether the canonical order is maintained after each mutation.
    pub const fn keeps_sorted(&self) -> bool {
        !self.delete_on_complete
    }
}
