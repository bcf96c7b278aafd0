//! Task CRUD operations.

use super::{Database, to_ms};
use crate::error::AppError;
use crate::types::{ImageChange, NewTask, Priority, Task, TaskChanges, TaskId};
use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

/// Column list shared by every task SELECT.
pub(crate) const TASK_COLUMNS: &str =
    "id, title, description, priority, expiration_date, completed, image, created_at";

/// Default listing order: open tasks first, then by expiration.
pub(crate) const DEFAULT_ORDER: &str = "completed ASC, expiration_date ASC, id ASC";

fn timestamp_column(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let idx = row.as_ref().column_index(column)?;
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority_idx = row.as_ref().column_index("priority")?;
    let priority_code: String = row.get(priority_idx)?;
    let priority = Priority::from_code(&priority_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            priority_idx,
            Type::Text,
            format!("unknown priority code: {}", priority_code).into(),
        )
    })?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        expiration_date: timestamp_column(row, "expiration_date")?,
        completed: row.get("completed")?,
        image: row.get("image")?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

/// Blank descriptions are stored as NULL.
fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

fn require_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::missing_field("title").into());
    }
    Ok(title.to_string())
}

fn select_task(conn: &rusqlite::Connection, task_id: TaskId) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    let task = conn
        .query_row(&sql, params![task_id], parse_task_row)
        .optional()?;
    Ok(task)
}

impl Database {
    /// Create a new task. The store assigns the id and creation time; a missing
    /// expiration defaults to the creation time.
    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let title = require_title(&new.title)?;
        let description = normalize_description(new.description);
        let created_at = Utc::now().trunc_subsecs(3);
        let expiration_date = new
            .expiration_date
            .map(|ts| ts.trunc_subsecs(3))
            .unwrap_or(created_at);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    title, description, priority, expiration_date, completed, image, created_at
                ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                params![
                    &title,
                    &description,
                    new.priority.code(),
                    to_ms(expiration_date),
                    &new.image,
                    to_ms(created_at),
                ],
            )?;

            Ok(Task {
                id: conn.last_insert_rowid(),
                title,
                description,
                priority: new.priority,
                expiration_date,
                completed: false,
                image: new.image,
                created_at,
            })
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        self.with_conn(|conn| select_task(conn, task_id))
    }

    /// Get a task by ID, failing with a not-found error when absent.
    pub fn require_task(&self, task_id: TaskId) -> Result<Task> {
        self.get_task(task_id)?
            .ok_or_else(|| AppError::task_not_found(task_id).into())
    }

    /// Get all tasks in the default listing order.
    pub fn get_all_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM tasks ORDER BY {}", TASK_COLUMNS, DEFAULT_ORDER);
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Rewrite the mutable fields of a task.
    pub fn update_task(&self, task_id: TaskId, changes: TaskChanges) -> Result<Task> {
        let title = require_title(&changes.title)?;
        let description = normalize_description(changes.description);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing =
                select_task(&tx, task_id)?.ok_or_else(|| AppError::task_not_found(task_id))?;

            let expiration_date = changes
                .expiration_date
                .map(|ts| ts.trunc_subsecs(3))
                .unwrap_or(existing.expiration_date);
            let image = match changes.image {
                ImageChange::Keep => existing.image,
                ImageChange::Clear => None,
                ImageChange::Replace(path) => Some(path),
            };

            tx.execute(
                "UPDATE tasks SET
                    title = ?1,
                    description = ?2,
                    priority = ?3,
                    expiration_date = ?4,
                    completed = ?5,
                    image = ?6
                 WHERE id = ?7",
                params![
                    &title,
                    &description,
                    changes.priority.code(),
                    to_ms(expiration_date),
                    changes.completed,
                    &image,
                    task_id,
                ],
            )?;

            tx.commit()?;

            Ok(Task {
                id: task_id,
                title,
                description,
                priority: changes.priority,
                expiration_date,
                completed: changes.completed,
                image,
                created_at: existing.created_at,
            })
        })
    }

    /// Flip the completion flag and return its new value.
    pub fn toggle_completed(&self, task_id: TaskId) -> Result<bool> {
        self.with_conn(|conn| {
            let completed: Option<bool> = conn
                .query_row(
                    "UPDATE tasks SET completed = NOT completed WHERE id = ?1 RETURNING completed",
                    params![task_id],
                    |row| row.get(0),
                )
                .optional()?;

            completed.ok_or_else(|| AppError::task_not_found(task_id).into())
        })
    }

    /// Hard-delete a task, returning the removed row.
    pub fn delete_task(&self, task_id: TaskId) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task =
                select_task(&tx, task_id)?.ok_or_else(|| AppError::task_not_found(task_id))?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;

            tx.commit()?;
            Ok(task)
        })
    }
}
