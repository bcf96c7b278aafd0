//! Aggregation queries for statistics.

use super::tasks::{TASK_COLUMNS, parse_task_row};
use super::{Database, to_ms};
use crate::types::Statistics;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

impl Database {
    /// Get board statistics against the current time.
    pub fn get_statistics(&self) -> Result<Statistics> {
        self.get_statistics_at(Utc::now())
    }

    /// Get board statistics. The reported task is the open one whose
    /// expiration is nearest at or after `now`.
    pub fn get_statistics_at(&self, now: DateTime<Utc>) -> Result<Statistics> {
        self.with_conn(|conn| {
            let (total_tasks, completed_tasks): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(completed), 0) FROM tasks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let sql = format!(
                "SELECT {} FROM tasks
                 WHERE completed = 0 AND expiration_date >= ?1
                 ORDER BY expiration_date ASC, id ASC
                 LIMIT 1",
                TASK_COLUMNS
            );
            let oldest_incomplete_task = conn
                .query_row(&sql, params![to_ms(now)], parse_task_row)
                .optional()?;

            Ok(Statistics {
                total_tasks,
                completed_tasks,
                incomplete_tasks: total_tasks - completed_tasks,
                oldest_incomplete_task,
            })
        })
    }
}
