//! Core types for the task board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned task identifier.
pub type TaskId = i64;

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// All priorities, highest rank first.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort rank used when ordering by priority (higher sorts first).
    pub fn rank(self) -> i32 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// Single-letter code stored in the `priority` column.
    pub fn code(self) -> &'static str {
        match self {
            Priority::High => "H",
            Priority::Medium => "M",
            Priority::Low => "L",
        }
    }

    /// Parse a stored column code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "H" => Some(Priority::High),
            "M" => Some(Priority::Medium),
            "L" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Parse user input: a column code or a name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "h" | "high" => Some(Priority::High),
            "m" | "medium" => Some(Priority::Medium),
            "l" | "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub expiration_date: DateTime<Utc>,
    pub completed: bool,
    /// Path of the uploaded image, relative to the media directory.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// True when the task is past due and still open.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now && !self.completed
    }
}

/// Values for inserting a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    /// Defaults to the creation time when absent.
    pub expiration_date: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expiration(mut self, expiration_date: DateTime<Utc>) -> Self {
        self.expiration_date = Some(expiration_date);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// What an update does to the stored image reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Clear,
    Replace(String),
}

/// Values written by the update action. `id` and `created_at` are never touched.
#[derive(Debug, Clone)]
pub struct TaskChanges {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    /// `None` keeps the stored expiration.
    pub expiration_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub image: ImageChange,
}

impl TaskChanges {
    /// Changes that rewrite a task with its current values.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            expiration_date: Some(task.expiration_date),
            completed: task.completed,
            image: ImageChange::Keep,
        }
    }
}

/// Aggregate counts for the statistics view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub incomplete_tasks: i64,
    /// Incomplete task with the nearest expiration not yet passed
    /// (the soonest-due task, despite the name).
    pub oldest_incomplete_task: Option<Task>,
}

impl Statistics {
    /// Share of completed tasks in percent; 0 when there are no tasks.
    pub fn completion_percent(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.completed_tasks as f64 * 100.0 / self.total_tasks as f64
    }
}
