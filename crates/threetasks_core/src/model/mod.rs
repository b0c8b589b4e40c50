//! Task-list domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by every storage backend.
//! - Define the identifiers that scope a task collection (`UserId`, `ListId`).
//!
//! # Invariants
//! - A `TaskId` is unique within its list and never reused.
//! - Tasks never move between lists.

pub mod list;
pub mod task;
