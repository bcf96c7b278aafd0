//! Output formatting utilities for markdown and JSON.

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use serde_json::{Value, json};

use crate::types::{Priority, Statistics, Task};

/// Output format for command-line results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Task: {}\n", task.title));
    md.push_str(&format!("- **id**: `{}`\n", task.id));
    md.push_str(&format!("- **priority**: {}\n", task.priority.label()));
    md.push_str(&format!("- **due**: {}\n", local_time(task.expiration_date)));
    md.push_str(&format!(
        "- **completed**: {}\n",
        if task.completed { "yes" } else { "no" }
    ));

    if let Some(ref image) = task.image {
        md.push_str(&format!("- **image**: {}\n", image));
    }

    if let Some(ref desc) = task.description {
        md.push_str("\n### Description\n");
        md.push_str(desc);
        md.push('\n');
    }

    md
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task, now: DateTime<Utc>) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };

    let priority_marker = match task.priority {
        Priority::High => "!!! ",
        Priority::Medium | Priority::Low => "",
    };

    let expired = if !task.completed && task.is_expired_at(now) {
        " _(expired)_"
    } else {
        ""
    };

    format!(
        "- {} {}{} `#{}` due {}{}\n",
        check,
        priority_marker,
        task.title,
        task.id,
        local_time(task.expiration_date),
        expired,
    )
}

/// Format a listing as markdown, in listing order.
pub fn format_tasks_markdown(heading: &str, tasks: &[Task], now: DateTime<Utc>) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {} ({})\n\n", heading, tasks.len()));

    if tasks.is_empty() {
        md.push_str("_No tasks found_\n");
        return md;
    }

    for task in tasks {
        md.push_str(&format_task_short(task, now));
    }

    md
}

/// Format statistics as markdown.
pub fn format_statistics_markdown(stats: &Statistics) -> String {
    let mut md = String::new();

    md.push_str("# Task statistics\n\n");
    md.push_str(&format!("- **total**: {}\n", stats.total_tasks));
    md.push_str(&format!("- **finished**: {}\n", stats.completed_tasks));
    md.push_str(&format!("- **unfinished**: {}\n", stats.incomplete_tasks));
    md.push_str(&format!(
        "- **complete**: {:.0}%\n",
        stats.completion_percent()
    ));

    match stats.oldest_incomplete_task {
        Some(ref task) => {
            md.push_str(&format!(
                "- **next due**: {} `#{}` at {}\n",
                task.title,
                task.id,
                local_time(task.expiration_date)
            ));
        }
        None => md.push_str("- **next due**: none\n"),
    }

    md
}

/// Statistics as JSON, including the derived completion percentage.
pub fn statistics_json(stats: &Statistics) -> Value {
    json!({
        "total_tasks": stats.total_tasks,
        "completed_tasks": stats.completed_tasks,
        "incomplete_tasks": stats.incomplete_tasks,
        "completion_percent": stats.completion_percent(),
        "oldest_incomplete_task": stats.oldest_incomplete_task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: i64, title: &str, priority: Priority, completed: bool) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            priority,
            expiration_date: Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap(),
            completed,
            image: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn parses_format_names() {
        assert_eq!(OutputFormat::from_str("JSON", true), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("markdown", false), Ok(OutputFormat::Markdown));
        assert!(OutputFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn list_keeps_order_and_marks_state() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let tasks = vec![
            task(2, "Pay rent", Priority::High, false),
            task(1, "Buy eggs", Priority::Low, true),
        ];
        let md = format_tasks_markdown("all tasks", &tasks, now);

        assert!(md.starts_with("# all tasks (2)\n"));
        let rent = md.find("Pay rent").unwrap();
        let eggs = md.find("Buy eggs").unwrap();
        assert!(rent < eggs);
        assert!(md.contains("- [ ] !!! Pay rent `#2`"));
        assert!(md.contains("- [x] Buy eggs `#1`"));
        assert_eq!(md.matches("(expired)").count(), 1);
    }

    #[test]
    fn empty_list() {
        let md = format_tasks_markdown("today's tasks", &[], Utc::now());
        assert!(md.contains("No tasks found"));
    }

    #[test]
    fn statistics_json_includes_percent() {
        let stats = Statistics {
            total_tasks: 3,
            completed_tasks: 1,
            incomplete_tasks: 2,
            oldest_incomplete_task: None,
        };
        let value = statistics_json(&stats);
        assert_eq!(value["total_tasks"], 3);
        assert!(value["oldest_incomplete_task"].is_null());
        let percent = value["completion_percent"].as_f64().unwrap();
        assert!((percent - 33.333).abs() < 0.01);

        let md = format_statistics_markdown(&stats);
        assert!(md.contains("- **complete**: 33%"));
        assert!(md.contains("- **next due**: none"));
    }

    #[test]
    fn single_task_markdown() {
        let mut t = task(5, "Walk dog", Priority::Medium, false);
        t.description = Some("around the block".to_string());
        let md = format_task_markdown(&t);
        assert!(md.contains("## Task: Walk dog"));
        assert!(md.contains("- **priority**: Medium"));
        assert!(md.contains("### Description\naround the block"));
    }
}
