//! Relational backend over the `tasks` table.
//!
//! # Responsibility
//! - Per-record insert/update/soft-delete scoped by `user_id` and `list_id`.
//! - Assign ids and creation timestamps on insert.
//!
//! # Invariants
//! - Reads exclude rows with `deleted_at IS NOT NULL`.
//! - Deleting keeps the row and stamps `deleted_at` once.
//! - Timestamps are stored as RFC 3339 UTC with millisecond precision,
//!   `due_date` as `YYYY-MM-DD`.

use super::{GatewayError, GatewayResult, PersistenceMode, TaskGateway};
use crate::clock::Clock;
use crate::db::Database;
use crate::model::list::ListScope;
use crate::model::task::{Task, TaskId, TaskPatch};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashSet;
use std::sync::Arc;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    text,
    completed,
    completed_at,
    due_date,
    created_at,
    deleted_at
FROM tasks";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Table-backed gateway; the database stands in for the remote store.
#[derive(Clone)]
pub struct SqliteTaskGateway {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskGateway {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }
}

#[async_trait]
impl TaskGateway for SqliteTaskGateway {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::PerRecord
    }

    async fn list_tasks(&self, scope: &ListScope) -> GatewayResult<Vec<Task>> {
        self.db.with_conn(|conn| list_active(conn, scope))
    }

    async fn insert_task(&self, scope: &ListScope, task: &Task) -> GatewayResult<Task> {
        let mut stored = task.clone();
        stored.id = TaskId::generate();
        stored.created_at = self.now();
        stored.deleted_at = None;

        self.db.with_conn(|conn| insert_row(conn, scope, &stored))?;
        Ok(stored)
    }

    async fn update_task(
        &self,
        scope: &ListScope,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> GatewayResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(text) = &patch.text {
            assignments.push("text = ?");
            bind_values.push(Value::Text(text.clone()));
        }
        if let Some(completed) = patch.completed {
            assignments.push("completed = ?");
            bind_values.push(Value::Integer(bool_to_int(completed)));
        }
        if let Some(completed_at) = patch.completed_at {
            assignments.push("completed_at = ?");
            bind_values.push(optional_text(completed_at.map(timestamp_to_db)));
        }
        if let Some(due_date) = patch.due_date {
            assignments.push("due_date = ?");
            bind_values.push(optional_text(due_date.map(due_date_to_db)));
        }

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ? AND user_id = ? AND list_id = ? AND deleted_at IS NULL;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));
        bind_values.push(Value::Text(scope.user_id.to_string()));
        bind_values.push(Value::Text(scope.list_id.to_string()));

        let changed = self
            .db
            .with_conn(|conn| -> GatewayResult<usize> {
                Ok(conn.execute(&sql, params_from_iter(bind_values))?)
            })?;
        if changed == 0 {
            return Err(GatewayError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn delete_task(&self, scope: &ListScope, id: &TaskId) -> GatewayResult<()> {
        let deleted_at = timestamp_to_db(self.now());
        let changed = self.db.with_conn(|conn| -> GatewayResult<usize> {
            Ok(conn.execute(
                "UPDATE tasks
                 SET deleted_at = COALESCE(deleted_at, ?1)
                 WHERE id = ?2 AND user_id = ?3 AND list_id = ?4;",
                params![
                    deleted_at,
                    id.as_str(),
                    scope.user_id.as_str(),
                    scope.list_id.as_str()
                ],
            )?)
        })?;
        if changed == 0 {
            return Err(GatewayError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Upserts `tasks` and tombstones every other active row of the scope.
    async fn save_all(&self, scope: &ListScope, tasks: &[Task]) -> GatewayResult<()> {
        let deleted_at = timestamp_to_db(self.now());
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let keep: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
            let stale = active_ids(&tx, scope)?
                .into_iter()
                .filter(|id| !keep.contains(id.as_str()))
                .collect::<Vec<_>>();

            for task in tasks {
                upsert_row(&tx, scope, task)?;
            }
            for id in &stale {
                tx.execute(
                    "UPDATE tasks SET deleted_at = ?1 WHERE id = ?2 AND user_id = ?3 AND list_id = ?4;",
                    params![deleted_at, id, scope.user_id.as_str(), scope.list_id.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

fn list_active(conn: &Connection, scope: &ListScope) -> GatewayResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE user_id = ?1
           AND list_id = ?2
           AND deleted_at IS NULL
         ORDER BY created_at ASC, rowid ASC;"
    ))?;
    let mut rows = stmt.query(params![scope.user_id.as_str(), scope.list_id.as_str()])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn active_ids(conn: &Connection, scope: &ListScope) -> GatewayResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM tasks WHERE user_id = ?1 AND list_id = ?2 AND deleted_at IS NULL;",
    )?;
    let ids = stmt
        .query_map(params![scope.user_id.as_str(), scope.list_id.as_str()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn insert_row(conn: &Connection, scope: &ListScope, task: &Task) -> GatewayResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            id,
            user_id,
            list_id,
            text,
            completed,
            completed_at,
            due_date,
            created_at,
            deleted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            task.id.as_str(),
            scope.user_id.as_str(),
            scope.list_id.as_str(),
            task.text.as_str(),
            bool_to_int(task.completed),
            task.completed_at.map(timestamp_to_db),
            task.due_date.map(due_date_to_db),
            timestamp_to_db(task.created_at),
            task.deleted_at.map(timestamp_to_db),
        ],
    )?;
    Ok(())
}

fn upsert_row(conn: &Connection, scope: &ListScope, task: &Task) -> GatewayResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, user_id, list_id, text, completed, completed_at, due_date, created_at, deleted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
        ON CONFLICT(id) DO UPDATE SET
            text = excluded.text,
            completed = excluded.completed,
            completed_at = excluded.completed_at,
            due_date = excluded.due_date,
            deleted_at = NULL
        WHERE tasks.user_id = excluded.user_id AND tasks.list_id = excluded.list_id;",
        params![
            task.id.as_str(),
            scope.user_id.as_str(),
            scope.list_id.as_str(),
            task.text.as_str(),
            bool_to_int(task.completed),
            task.completed_at.map(timestamp_to_db),
            task.due_date.map(due_date_to_db),
            timestamp_to_db(task.created_at),
        ],
    )?;
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> GatewayResult<Task> {
    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(GatewayError::InvalidData(format!(
                "invalid completed value `{other}` in tasks.completed"
            )));
        }
    };

    Ok(Task {
        id: TaskId::new(row.get::<_, String>("id")?),
        text: row.get("text")?,
        completed,
        completed_at: parse_optional_timestamp(row, "completed_at")?,
        due_date: row
            .get::<_, Option<String>>("due_date")?
            .map(|value| {
                NaiveDate::parse_from_str(&value, DUE_DATE_FORMAT).map_err(|_| {
                    GatewayError::InvalidData(format!("invalid date `{value}` in tasks.due_date"))
                })
            })
            .transpose()?,
        created_at: parse_timestamp(&row.get::<_, String>("created_at")?, "created_at")?,
        deleted_at: parse_optional_timestamp(row, "deleted_at")?,
    })
}

fn parse_optional_timestamp(
    row: &Row<'_>,
    column: &'static str,
) -> GatewayResult<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(column)?
        .map(|value| parse_timestamp(&value, column))
        .transpose()
}

fn parse_timestamp(value: &str, column: &'static str) -> GatewayResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| GatewayError::InvalidData(format!("invalid timestamp `{value}` in tasks.{column}")))
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn due_date_to_db(value: NaiveDate) -> String {
    value.format(DUE_DATE_FORMAT).to_string()
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
