//! List and identity scoping types.
//!
//! # Responsibility
//! - Identify one user-scoped task collection as `(UserId, ListId)`.
//! - Validate list ids before they become storage keys.
//!
//! # Invariants
//! - `ListId` values always match `LIST_ID_PATTERN`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

/// Accepted list id shape (storage-key safe).
pub const LIST_ID_PATTERN: &str = r"^[A-Za-z0-9@_.:-]{1,64}$";

static LIST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(LIST_ID_PATTERN).expect("valid list id regex"));

/// Validation errors for scoping identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("invalid list id `{0}`; expected 1-64 chars of [A-Za-z0-9@_.:-]")]
    InvalidListId(String),
    #[error("user id must not be blank")]
    BlankUserId,
}

/// Anonymous per-installation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Random 128-bit identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, ScopeError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ScopeError::BlankUserId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-chosen name of one task list (for example `@three_tasks_data`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListId(String);

impl ListId {
    pub fn parse(value: impl Into<String>) -> Result<Self, ScopeError> {
        let value = value.into();
        let trimmed = value.trim();
        if !LIST_ID_RE.is_match(trimmed) {
            return Err(ScopeError::InvalidListId(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ListId {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ListId> for String {
    fn from(value: ListId) -> Self {
        value.0
    }
}

/// Full scope of one task collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListScope {
    pub user_id: UserId,
    pub list_id: ListId,
}

impl ListScope {
    pub fn new(user_id: UserId, list_id: ListId) -> Self {
        Self { user_id, list_id }
    }

    /// Key under which the local backend stores this list's blob.
    pub fn storage_key(&self) -> String {
        format!("tasks/{}/{}", self.user_id, self.list_id)
    }
}

impl Display for ListScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.list_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ListId, ListScope, ScopeError, UserId};

    #[test]
    fn list_id_accepts_storage_style_names() {
        assert_eq!(
            ListId::parse(" @three_tasks_data ").unwrap().as_str(),
            "@three_tasks_data"
        );
        assert!(ListId::parse("life:2025-q1").is_ok());
    }

    #[test]
    fn list_id_rejects_separators_and_blank() {
        assert!(matches!(
            ListId::parse("a/b"),
            Err(ScopeError::InvalidListId(_))
        ));
        assert!(ListId::parse("").is_err());
        assert!(ListId::parse("x".repeat(65)).is_err());
    }

    #[test]
    fn storage_key_includes_user_and_list() {
        let scope = ListScope::new(
            UserId::parse("u-1").unwrap(),
            ListId::parse("@exploration_tasks").unwrap(),
        );
        assert_eq!(scope.storage_key(), "tasks/u-1/@exploration_tasks");
    }

    #[test]
    fn blank_user_id_is_rejected() {
        assert_eq!(UserId::parse("  "), Err(ScopeError::BlankUserId));
    }
}
