//! Request handlers for the task board pages and the toggle endpoint.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::forms::{CreateTaskForm, FormErrors, Submission, TaskFormValues, UpdateTaskForm};
use super::render::{self, FormMode};
use super::server::AppState;
use crate::db::query::{TaskFilter, TaskQuery};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::types::{ImageChange, Task, TaskId};

pub const CREATE_TITLE: &str = "add new task";
pub const STATISTICS_TITLE: &str = "task statistics";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (title, message) = if status.is_server_error() {
            error!(code = ?self.code, "Request failed: {}", self.message);
            ("server error", "Something went wrong. Please try again.")
        } else if status == StatusCode::NOT_FOUND {
            debug!("{}", self.message);
            ("page not found", self.message.as_str())
        } else {
            debug!(code = ?self.code, "Rejected request: {}", self.message);
            ("bad request", self.message.as_str())
        };
        (status, Html(render::error_page(title, message))).into_response()
    }
}

/// Query string of the listing page.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub filter: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
}

/// Heading of the listing page.
///
/// A search wins over the filter; an unrecognized filter still lists
/// incomplete tasks but is titled generically.
pub fn list_title(filter_param: Option<&str>, search: Option<&str>) -> String {
    if let Some(q) = search.filter(|q| !q.is_empty()) {
        return format!("search results for: '{}'", q);
    }
    match filter_param {
        None => TaskFilter::default().label().to_string(),
        Some(raw) => TaskFilter::from_param(raw)
            .map(TaskFilter::label)
            .unwrap_or("task list")
            .to_string(),
    }
}

fn edit_title(task: &Task) -> String {
    format!("edit task: {}", task.title)
}

fn delete_title(task: &Task) -> String {
    format!("delete task: {}", task.title)
}

/// Path ids that are not positive integers written in plain digits name no
/// task.
fn parse_task_id(raw: &str) -> AppResult<TaskId> {
    Some(raw)
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<TaskId>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::task_not_found(raw))
}

fn load_task(state: &AppState, raw_id: &str) -> AppResult<Task> {
    let task_id = parse_task_id(raw_id)?;
    Ok(state.db().require_task(task_id)?)
}

/// Task listing with filter, search and sort.
pub async fn task_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let query = TaskQuery::from_params(
        params.filter.as_deref(),
        params.q.as_deref(),
        params.sort.as_deref(),
    );
    let title = list_title(params.filter.as_deref(), query.search.as_deref());
    let tasks = state.db().query_tasks(&query)?;

    Ok(Html(render::task_list(
        &title,
        &query,
        tasks,
        state.media(),
        Utc::now(),
    )))
}

/// Empty create form.
pub async fn create_form(State(state): State<AppState>) -> Html<String> {
    Html(render::task_form(
        CREATE_TITLE,
        FormMode::Create,
        &TaskFormValues::initial(&Local::now()),
        &FormErrors::default(),
        state.media(),
    ))
}

/// Handle create form submission.
pub async fn create_submit(
    State(state): State<AppState>,
    submission: Submission,
) -> AppResult<Response> {
    let form = CreateTaskForm::from_submission(submission);

    let mut new_task = match form.validate() {
        Ok(new_task) => new_task,
        Err(errors) => {
            debug!(fields = ?errors.fields().collect::<Vec<_>>(), "Create form invalid");
            return Ok(Html(render::task_form(
                CREATE_TITLE,
                FormMode::Create,
                &form.values(),
                &errors,
                state.media(),
            ))
            .into_response());
        }
    };

    if let Some(upload) = &form.image {
        new_task.image = Some(state.media().save(upload).await?);
    }
    let stored_image = new_task.image.clone();

    match state.db().create_task(new_task) {
        Ok(task) => {
            info!(task_id = task.id, "Created task");
            Ok(Redirect::to("/").into_response())
        }
        Err(e) => {
            if let Some(image) = stored_image {
                state.media().remove(&image).await;
            }
            Err(e.into())
        }
    }
}

/// Update form prefilled from the stored task.
pub async fn update_form(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Html<String>> {
    let task = load_task(&state, &task_id)?;
    Ok(Html(render::task_form(
        &edit_title(&task),
        FormMode::Update(task.id),
        &TaskFormValues::from_task(&task),
        &FormErrors::default(),
        state.media(),
    )))
}

/// Handle update form submission.
pub async fn update_submit(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    submission: Submission,
) -> AppResult<Response> {
    let task = load_task(&state, &task_id)?;
    let form = UpdateTaskForm::from_submission(submission);

    let mut changes = match form.validate() {
        Ok(changes) => changes,
        Err(errors) => {
            debug!(task_id = task.id, fields = ?errors.fields().collect::<Vec<_>>(), "Update form invalid");
            return Ok(Html(render::task_form(
                &edit_title(&task),
                FormMode::Update(task.id),
                &form.values(task.image.as_deref()),
                &errors,
                state.media(),
            ))
            .into_response());
        }
    };

    let mut stored_image = None;
    if let Some(upload) = &form.image {
        let image = state.media().save(upload).await?;
        changes.image = ImageChange::Replace(image.clone());
        stored_image = Some(image);
    }

    let updated = match state.db().update_task(task.id, changes) {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(image) = stored_image {
                state.media().remove(&image).await;
            }
            return Err(e.into());
        }
    };

    if let Some(old) = task.image.as_deref() {
        if updated.image.as_deref() != Some(old) {
            state.media().remove(old).await;
        }
    }

    info!(task_id = updated.id, "Updated task");
    Ok(Redirect::to("/").into_response())
}

/// Delete confirmation page.
pub async fn delete_confirm(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Html<String>> {
    let task = load_task(&state, &task_id)?;
    Ok(Html(render::confirm_delete(&delete_title(&task), &task)))
}

/// Handle confirmed deletion.
pub async fn delete_submit(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Redirect> {
    let task_id = parse_task_id(&task_id)?;
    let removed = state.db().delete_task(task_id)?;

    if let Some(image) = removed.image.as_deref() {
        state.media().remove(image).await;
    }

    info!(task_id = removed.id, "Deleted task");
    Ok(Redirect::to("/"))
}

/// Body of the toggle endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToggleResponse {
    Ok { completed: bool },
    Error { message: String },
}

impl ToggleResponse {
    fn error(message: impl Into<String>) -> Self {
        ToggleResponse::Error {
            message: message.into(),
        }
    }
}

/// Flip a task's completion flag. Accepts POST only; any other method is
/// rejected before the task is looked up.
pub async fn toggle_task(
    State(state): State<AppState>,
    method: Method,
    Path(task_id): Path<String>,
) -> (StatusCode, Json<ToggleResponse>) {
    if method != Method::POST {
        let err = AppError::invalid_method();
        debug!(%method, "Rejected toggle request");
        return (err.status(), Json(ToggleResponse::error(err.message)));
    }

    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ToggleResponse::error("Task not found")),
        )
    };

    let Ok(task_id) = parse_task_id(&task_id) else {
        return not_found();
    };

    match state.db().toggle_completed(task_id) {
        Ok(completed) => {
            info!(task_id, completed, "Toggled task");
            (StatusCode::OK, Json(ToggleResponse::Ok { completed }))
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.is_not_found() {
                return not_found();
            }
            error!(task_id, "Toggle failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ToggleResponse::error("Internal error")),
            )
        }
    }
}

/// Completion statistics.
pub async fn statistics(State(state): State<AppState>) -> AppResult<Html<String>> {
    let stats = state.db().get_statistics()?;
    Ok(Html(render::statistics(
        STATISTICS_TITLE,
        &stats,
        state.media(),
        Utc::now(),
    )))
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Fallback for unrouted paths.
pub async fn not_found() -> AppError {
    AppError::new(ErrorCode::TaskNotFound, "Page not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_titles() {
        assert_eq!(list_title(None, None), "unfinished tasks");
        assert_eq!(list_title(Some("completed"), None), "finished tasks");
        assert_eq!(list_title(Some("today"), None), "today's tasks");
        assert_eq!(list_title(Some("week"), None), "this week's tasks");
        assert_eq!(list_title(Some("all"), None), "all tasks");
        assert_eq!(list_title(Some("bogus"), None), "task list");
        assert_eq!(
            list_title(Some("all"), Some("Buy")),
            "search results for: 'Buy'"
        );
        assert_eq!(list_title(Some("all"), Some("")), "all tasks");
    }

    #[test]
    fn task_ids_must_be_positive_integers() {
        assert_eq!(parse_task_id("12").unwrap(), 12);
        assert!(parse_task_id("0").unwrap_err().is_not_found());
        assert!(parse_task_id("abc").unwrap_err().is_not_found());
        assert!(parse_task_id("-3").unwrap_err().is_not_found());
        assert!(parse_task_id("+5").unwrap_err().is_not_found());
        assert!(parse_task_id(" 5").unwrap_err().is_not_found());
        assert!(parse_task_id("").unwrap_err().is_not_found());
        assert_eq!(parse_task_id("007").unwrap(), 7);
    }

    #[test]
    fn toggle_response_shape() {
        let ok = serde_json::to_value(ToggleResponse::Ok { completed: true }).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "ok", "completed": true}));

        let err = serde_json::to_value(ToggleResponse::error("Task not found")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({"status": "error", "message": "Task not found"})
        );
    }
}
