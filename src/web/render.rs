//! Page rendering.
//!
//! Every page is a fragment filled into [`BASE_TEMPLATE`]. All user text
//! goes through [`html_escape`] before it reaches a template.

use chrono::{DateTime, Local, Utc};

use super::forms::{FormErrors, TaskFormValues};
use super::media::MediaStore;
use super::templates::{
    BASE_TEMPLATE, CONFIRM_DELETE_TEMPLATE, ERROR_TEMPLATE, STATISTICS_TEMPLATE,
    TASK_FORM_TEMPLATE, TASK_LIST_TEMPLATE, fill,
};
use crate::db::query::{SortOrder, TaskQuery};
use crate::types::{Priority, Statistics, Task, TaskId};

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Display form of a timestamp in the server's local time.
pub fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Wrap a fragment in the base layout.
pub fn page(title: &str, content: &str) -> String {
    fill(
        BASE_TEMPLATE,
        &[("page_title", &html_escape(title)), ("content", content)],
    )
}

/// Build a `/?...` listing URL, omitting defaults.
fn list_href(query: &TaskQuery, sort: SortOrder) -> String {
    let mut params = vec![format!("filter={}", query.filter.as_str())];
    if let Some(q) = &query.search {
        params.push(format!("q={}", urlencoding::encode(q)));
    }
    if sort != SortOrder::Default {
        params.push(format!("sort={}", sort.as_str()));
    }
    format!("/?{}", params.join("&"))
}

fn task_row(task: &Task, media: &MediaStore, now: DateTime<Utc>) -> String {
    let priority = task.priority.code();
    let mut classes = format!("task priority-{}", priority);
    if task.completed {
        classes.push_str(" done");
    }

    let description = task
        .description
        .as_deref()
        .map(|d| format!(r#"<p class="task-description">{}</p>"#, html_escape(d)))
        .unwrap_or_default();

    let expired = if !task.completed && task.is_expired_at(now) {
        r#" <span class="badge badge-expired">expired</span>"#
    } else {
        ""
    };

    let image = task
        .image
        .as_deref()
        .map(|image| {
            format!(
                r#"<img class="task-thumb" src="{}" alt="">"#,
                html_escape(&media.url_of(image))
            )
        })
        .unwrap_or_default();

    format!(
        r#"<li class="{classes}">
    <input type="checkbox" data-toggle="{id}" aria-label="completed"{checked}>
    <div class="task-body">
        <div class="task-title">{title}</div>
        {description}
        <div class="task-meta"><span class="badge badge-{priority}">{label}</span> due {due}{expired}</div>
    </div>
    {image}
    <div class="task-actions"><a href="/update/{id}/">Edit</a><a href="/delete/{id}/">Delete</a></div>
</li>"#,
        classes = classes,
        id = task.id,
        checked = if task.completed { " checked" } else { "" },
        title = html_escape(&task.title),
        description = description,
        priority = priority,
        label = task.priority.label(),
        due = format_datetime(task.expiration_date),
        expired = expired,
        image = image,
    )
}

/// The task listing page.
pub fn task_list(
    title: &str,
    query: &TaskQuery,
    tasks: impl IntoIterator<Item = Task>,
    media: &MediaStore,
    now: DateTime<Utc>,
) -> String {
    let rows: Vec<String> = tasks
        .into_iter()
        .map(|task| task_row(&task, media, now))
        .collect();

    let count = match rows.len() {
        1 => "1 task".to_string(),
        n => format!("{} tasks", n),
    };

    let tasks_html = if rows.is_empty() {
        r#"<div class="empty-state">No tasks found</div>"#.to_string()
    } else {
        format!(r#"<ul class="task-list">{}</ul>"#, rows.join("\n"))
    };

    let (sort_href, sort_label) = match query.sort {
        SortOrder::Default => (list_href(query, SortOrder::Priority), "Sort by priority"),
        SortOrder::Priority => (list_href(query, SortOrder::Default), "Sort by due date"),
    };

    let content = fill(
        TASK_LIST_TEMPLATE,
        &[
            ("filter", query.filter.as_str()),
            ("q", &html_escape(query.search.as_deref().unwrap_or(""))),
            ("count", &count),
            ("sort_href", &html_escape(&sort_href)),
            ("sort_label", sort_label),
            ("tasks", &tasks_html),
        ],
    );
    page(title, &content)
}

/// Which action a task form submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update(TaskId),
}

fn field_errors(errors: &FormErrors, field: &str) -> String {
    let messages = errors.get(field);
    if messages.is_empty() {
        return String::new();
    }
    let items: Vec<String> = messages
        .iter()
        .map(|m| format!("<li>{}</li>", html_escape(m)))
        .collect();
    format!(r#"<ul class="field-errors">{}</ul>"#, items.join(""))
}

fn priority_options(selected: &str) -> String {
    let selected = Priority::parse(selected);
    Priority::ALL
        .iter()
        .map(|p| {
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                p.code(),
                if selected == Some(*p) { " selected" } else { "" },
                p.label()
            )
        })
        .collect::<Vec<_>>()
        .join("")
}

/// The create or update form, with any validation messages.
pub fn task_form(
    title: &str,
    mode: FormMode,
    values: &TaskFormValues,
    errors: &FormErrors,
    media: &MediaStore,
) -> String {
    let (action, submit_label) = match mode {
        FormMode::Create => ("/create/".to_string(), "Create"),
        FormMode::Update(id) => (format!("/update/{}/", id), "Save"),
    };

    let completed_field = match mode {
        FormMode::Create => String::new(),
        FormMode::Update(_) => format!(
            r#"<div class="form-row inline">
        <input type="checkbox" id="id_completed" name="completed"{}>
        <label for="id_completed">Completed</label>
    </div>"#,
            if values.completed { " checked" } else { "" }
        ),
    };

    let current_image = match (&values.image, mode) {
        (Some(image), FormMode::Update(_)) => format!(
            r#"<p>Currently: <a href="{url}">{name}</a>
        <input type="checkbox" id="id_image_clear" name="image-clear">
        <label for="id_image_clear">Clear</label></p>"#,
            url = html_escape(&media.url_of(image)),
            name = html_escape(image),
        ),
        _ => String::new(),
    };

    let content = fill(
        TASK_FORM_TEMPLATE,
        &[
            ("action", &action),
            ("title", &html_escape(&values.title)),
            ("title_errors", &field_errors(errors, "title")),
            ("description", &html_escape(&values.description)),
            ("description_errors", &field_errors(errors, "description")),
            ("priority_options", &priority_options(&values.priority)),
            ("priority_errors", &field_errors(errors, "priority")),
            ("expiration_date", &html_escape(&values.expiration_date)),
            (
                "expiration_date_errors",
                &field_errors(errors, "expiration_date"),
            ),
            ("completed_field", &completed_field),
            ("current_image", &current_image),
            ("image_errors", &field_errors(errors, "image")),
            ("submit_label", submit_label),
        ],
    );
    page(title, &content)
}

/// Delete confirmation page.
pub fn confirm_delete(title: &str, task: &Task) -> String {
    let content = fill(
        CONFIRM_DELETE_TEMPLATE,
        &[
            ("task_id", &task.id.to_string()),
            ("task_title", &html_escape(&task.title)),
        ],
    );
    page(title, &content)
}

/// Statistics page.
pub fn statistics(title: &str, stats: &Statistics, media: &MediaStore, now: DateTime<Utc>) -> String {
    let next_task = match &stats.oldest_incomplete_task {
        Some(task) => format!(
            r#"<ul class="task-list">{}</ul>"#,
            task_row(task, media, now)
        ),
        None => r#"<div class="empty-state">Nothing due</div>"#.to_string(),
    };

    let content = fill(
        STATISTICS_TEMPLATE,
        &[
            ("total_tasks", &stats.total_tasks.to_string()),
            ("completed_tasks", &stats.completed_tasks.to_string()),
            ("incomplete_tasks", &stats.incomplete_tasks.to_string()),
            (
                "completion_percent",
                &format!("{:.0}", stats.completion_percent()),
            ),
            ("next_task", &next_task),
        ],
    );
    page(title, &content)
}

/// Error page body for a status such as 404.
pub fn error_page(title: &str, message: &str) -> String {
    let content = fill(ERROR_TEMPLATE, &[("message", &html_escape(message))]);
    page(title, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::TaskFilter;
    use chrono::TimeZone;

    fn media() -> MediaStore {
        MediaStore::new("/tmp/media", "/media", false)
    }

    fn task(id: TaskId, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: Some("line <one>".to_string()),
            priority: Priority::High,
            expiration_date: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            completed: false,
            image: None,
            created_at: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn list_escapes_titles_and_marks_expired() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let html = task_list(
            "all tasks",
            &TaskQuery::default().with_filter(TaskFilter::All),
            vec![task(1, "<script>")],
            &media(),
            now,
        );
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("line &lt;one&gt;"));
        assert!(html.contains("badge-expired"));
        assert!(html.contains(r#"href="/?filter=all&amp;sort=priority""#));
        assert!(html.contains("1 task"));
    }

    #[test]
    fn empty_list_shows_placeholder() {
        let html = task_list(
            "unfinished tasks",
            &TaskQuery::default(),
            Vec::new(),
            &media(),
            Utc::now(),
        );
        assert!(html.contains("No tasks found"));
        assert!(html.contains("<title>unfinished tasks | Task Board</title>"));
    }

    #[test]
    fn form_marks_selected_priority_and_errors() {
        let mut errors = FormErrors::default();
        errors.add("title", "This field is required.");
        let values = TaskFormValues {
            priority: "L".to_string(),
            ..Default::default()
        };
        let html = task_form("add new task", FormMode::Create, &values, &errors, &media());

        assert!(html.contains(r#"<option value="L" selected>Low</option>"#));
        assert!(html.contains("This field is required."));
        assert!(html.contains(r#"action="/create/""#));
        assert!(!html.contains(r#"name="completed""#));
    }

    #[test]
    fn update_form_offers_clear_for_current_image() {
        let values = TaskFormValues {
            image: Some("task_images/1-a.png".to_string()),
            completed: true,
            ..Default::default()
        };
        let html = task_form(
            "edit task: a",
            FormMode::Update(3),
            &values,
            &FormErrors::default(),
            &media(),
        );
        assert!(html.contains(r#"name="image-clear""#));
        assert!(html.contains(r#"name="completed" checked"#));
        assert!(html.contains("/media/task_images/1-a.png"));
        assert!(html.contains(r#"action="/update/3/""#));
    }

    #[test]
    fn statistics_without_due_task() {
        let stats = Statistics {
            total_tasks: 4,
            completed_tasks: 1,
            incomplete_tasks: 3,
            oldest_incomplete_task: None,
        };
        let html = statistics("task statistics", &stats, &media(), Utc::now());
        assert!(html.contains("25% complete"));
        assert!(html.contains("Nothing due"));
    }
}
