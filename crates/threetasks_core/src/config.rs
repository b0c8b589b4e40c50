//! Application configuration.
//!
//! # Responsibility
//! - Parse `threetasks.toml` into [`AppConfig`], defaulting every field.
//! - Apply the `THREETASKS_DATA_DIR` override.
//! - Reject list tables that could not be opened as stores.
//!
//! # Invariants
//! - A validated config has at least one list and unique, well-formed list ids.
//! - Omitting `[[lists]]` yields the two built-in lists.

use crate::logging::default_log_level;
use crate::model::list::ListId;
use crate::store::ListPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable replacing `data_dir`.
pub const DATA_DIR_ENV: &str = "THREETASKS_DATA_DIR";

/// Id of the sort-to-bottom list with due-date completion.
pub const THREE_TASKS_LIST_ID: &str = "@three_tasks_data";
/// Id of the delete-on-complete list.
pub const EXPLORATION_LIST_ID: &str = "@exploration_tasks";
/// Id of the newest-first life list.
pub const LIFE_LIST_ID: &str = "@life_tasks";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("list id `{0}` must be 1-64 characters of letters, digits, `@`, `_`, `.`, `:` or `-`")]
    InvalidListId(String),
    #[error("list id `{0}` is configured more than once")]
    DuplicateListId(String),
    #[error("at least one list must be configured")]
    NoLists,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default = "default_lists")]
    pub lists: Vec<ListConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            logging: LoggingConfig::default(),
            persistence: PersistenceConfig::default(),
            lists: default_lists(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".threetasks")
}

fn default_lists() -> Vec<ListConfig> {
    vec![
        ListConfig {
            id: THREE_TASKS_LIST_ID.to_string(),
            title: "Three to-dos".to_string(),
            policy: ListPolicy::sort_to_bottom().with_due_date_completion(true),
        },
        ListConfig {
            id: EXPLORATION_LIST_ID.to_string(),
            title: "Exploration".to_string(),
            policy: ListPolicy::delete_on_complete(),
        },
        ListConfig {
            id: LIFE_LIST_ID.to_string(),
            title: "To-Dos for Life".to_string(),
            policy: ListPolicy::sort_to_bottom().with_prepend(true),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Defaults to `<data_dir>/logs`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// One JSON blob per list in the key-value store.
    #[default]
    Local,
    /// One row per task in the `tasks` table.
    Relational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
}

/// One `[[lists]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub policy: ListPolicy,
}

impl AppConfig {
    /// Reads and validates `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.override_data_dir(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        Ok(config)
    }

    /// Parses and validates TOML without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `data_dir` when `value` is set and not empty.
    pub fn override_data_dir(&mut self, value: Option<PathBuf>) {
        if let Some(dir) = value.filter(|dir| !dir.as_os_str().is_empty()) {
            self.data_dir = dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lists.is_empty() {
            return Err(ConfigError::NoLists);
        }
        let mut seen = HashSet::new();
        for list in &self.lists {
            if ListId::parse(list.id.as_str()).is_err() {
                return Err(ConfigError::InvalidListId(list.id.clone()));
            }
            if !seen.insert(list.id.as_str()) {
                return Err(ConfigError::DuplicateListId(list.id.clone()));
            }
        }
        Ok(())
    }

    pub fn list(&self, id: &str) -> Option<&ListConfig> {
        self.lists.iter().find(|list| list.id == id)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("threetasks.sqlite3")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AppConfig, ConfigError, PersistenceBackend, EXPLORATION_LIST_ID, LIFE_LIST_ID,
        THREE_TASKS_LIST_ID,
    };
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_builtin_lists() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.persistence.backend, PersistenceBackend::Local);

        let three = config.list(THREE_TASKS_LIST_ID).unwrap();
        assert!(!three.policy.delete_on_complete);
        assert!(three.policy.use_due_date_as_completion_date);
        let exploration = config.list(EXPLORATION_LIST_ID).unwrap();
        assert!(exploration.policy.delete_on_complete);
        let life = config.list(LIFE_LIST_ID).unwrap();
        assert_eq!(life.title, "To-Dos for Life");
        assert!(life.policy.prepend);
        assert!(!life.policy.delete_on_complete);
        assert_eq!(config.lists.len(), 3);
    }

    #[test]
    fn data_dir_override_ignores_empty_value() {
        let mut config = AppConfig::default();
        config.override_data_dir(Some(PathBuf::new()));
        assert_eq!(config.data_dir, PathBuf::from(".threetasks"));
        config.override_data_dir(Some(PathBuf::from("/srv/tasks")));
        assert_eq!(config.database_path(), PathBuf::from("/srv/tasks/threetasks.sqlite3"));
        assert_eq!(config.log_dir(), PathBuf::from("/srv/tasks/logs"));
    }

    #[test]
    fn explicit_empty_list_table_is_rejected() {
        let err = AppConfig::from_toml_str("lists = []").unwrap_err();
        assert!(matches!(err, ConfigError::NoLists));
    }
}
