//! `kv_entries` table implementation of [`KeyValueStore`].

use super::{KeyValueStore, KvResult};
use crate::db::Database;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

/// Key-value store persisted in the `kv_entries` table.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    db: Database,
}

impl SqliteKeyValueStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.db.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1;",
                    [key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![key, value, updated_at],
            )?;
            Ok(())
        })
    }
}
