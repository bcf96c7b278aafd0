//! Create and update forms.
//!
//! Submissions arrive as `multipart/form-data` so they can carry an image;
//! plain `application/x-www-form-urlencoded` bodies are accepted too.
//! Each action has its own form struct listing exactly the fields it accepts;
//! validation turns it into the store's input type or a set of per-field
//! messages to show next to the inputs.

use axum::extract::multipart::MultipartError;
use axum::extract::{Form, FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};

use super::media::Upload;
use crate::error::{AppError, ErrorCode};
use crate::types::{ImageChange, NewTask, Priority, Task, TaskChanges};

/// Longest accepted title, in characters.
pub const TITLE_MAX_CHARS: usize = 200;

/// Value format of `<input type="datetime-local">`.
pub const INPUT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

const REQUIRED: &str = "This field is required.";
const INVALID_DATETIME: &str = "Enter a valid date/time.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages for one field, empty when it passed.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

/// Raw fields and file of one form submission.
#[derive(Debug, Default)]
pub struct Submission {
    fields: HashMap<String, String>,
    upload: Option<Upload>,
}

impl Submission {
    /// Drain a multipart body. Only the `image` part is read as a file;
    /// an empty file input counts as no upload.
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut submission = Submission::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                if !file_name.is_empty() || !data.is_empty() {
                    submission.upload = Some(Upload {
                        file_name,
                        content_type,
                        data,
                    });
                }
            } else {
                let value = field.text().await?;
                submission.fields.insert(name, value);
            }
        }

        Ok(submission)
    }

    /// Read a urlencoded body. Such a body never carries an upload.
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self {
            fields,
            upload: None,
        }
    }

    /// Build a submission directly.
    pub fn from_parts<K, V>(fields: impl IntoIterator<Item = (K, V)>, upload: Option<Upload>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            upload,
        }
    }

    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Checkbox semantics: present and truthy.
    fn checked(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "on" | "true" | "1"))
    }
}

fn invalid_submission(reason: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCode::InvalidFieldValue,
        format!("Invalid form submission: {}", reason),
    )
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| invalid_submission(e.body_text()))?;
            Submission::read(multipart)
                .await
                .map_err(|e| invalid_submission(e.body_text()))
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| invalid_submission(e.body_text()))?;
            Ok(Submission::from_fields(fields))
        }
    }
}

/// Values shown in the task form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFormValues {
    pub title: String,
    pub description: String,
    /// Priority code, as the select's option values.
    pub priority: String,
    pub expiration_date: String,
    pub completed: bool,
    /// Currently stored image reference.
    pub image: Option<String>,
}

impl TaskFormValues {
    /// Blank create form, due now, medium priority.
    pub fn initial<Tz: TimeZone>(now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            priority: Priority::default().code().to_string(),
            expiration_date: now.format(INPUT_DATETIME_FORMAT).to_string(),
            ..Default::default()
        }
    }

    /// Update form prefilled from a stored task, in the server's local time.
    pub fn from_task(task: &Task) -> Self {
        Self::from_task_in(task, &Local)
    }

    pub fn from_task_in<Tz: TimeZone>(task: &Task, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority.code().to_string(),
            expiration_date: task
                .expiration_date
                .with_timezone(tz)
                .format(INPUT_DATETIME_FORMAT)
                .to_string(),
            completed: task.completed,
            image: task.image.clone(),
        }
    }
}

/// Fields accepted by the create action.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskForm {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub expiration_date: String,
    pub image: Option<Upload>,
}

impl CreateTaskForm {
    pub fn from_submission(submission: Submission) -> Self {
        Self {
            title: submission.text("title"),
            description: submission.text("description"),
            priority: submission.text("priority"),
            expiration_date: submission.text("expiration_date"),
            image: submission.upload,
        }
    }

    /// Validate against the server's local time zone.
    pub fn validate(&self) -> Result<NewTask, FormErrors> {
        self.validate_in(&Local)
    }

    /// Validate, reading naive datetimes in `tz`. The image is checked but
    /// not stored; the returned task has no image reference yet.
    pub fn validate_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<NewTask, FormErrors> {
        let mut errors = FormErrors::default();

        let title = clean_title(&self.title, &mut errors);
        let priority = clean_priority(&self.priority, &mut errors);
        let expiration_date = clean_expiration(&self.expiration_date, tz, &mut errors);
        check_image(self.image.as_ref(), &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewTask {
            title,
            description: clean_description(&self.description),
            priority,
            expiration_date,
            image: None,
        })
    }

    /// Echo of the submitted values for re-rendering.
    pub fn values(&self) -> TaskFormValues {
        TaskFormValues {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.clone(),
            expiration_date: self.expiration_date.clone(),
            completed: false,
            image: None,
        }
    }
}

/// Fields accepted by the update action.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskForm {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub expiration_date: String,
    pub completed: bool,
    pub image: Option<Upload>,
    /// The "clear image" checkbox.
    pub clear_image: bool,
}

impl UpdateTaskForm {
    pub fn from_submission(submission: Submission) -> Self {
        Self {
            title: submission.text("title"),
            description: submission.text("description"),
            priority: submission.text("priority"),
            expiration_date: submission.text("expiration_date"),
            completed: submission.checked("completed"),
            clear_image: submission.checked("image-clear"),
            image: submission.upload,
        }
    }

    pub fn validate(&self) -> Result<TaskChanges, FormErrors> {
        self.validate_in(&Local)
    }

    /// Validate, reading naive datetimes in `tz`. A new upload is checked
    /// but left for the caller to store; the image change is `Keep` or
    /// `Clear` until then.
    pub fn validate_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<TaskChanges, FormErrors> {
        let mut errors = FormErrors::default();

        let title = clean_title(&self.title, &mut errors);
        let priority = clean_priority(&self.priority, &mut errors);
        let expiration_date = clean_expiration(&self.expiration_date, tz, &mut errors);
        check_image(self.image.as_ref(), &mut errors);

        if self.clear_image && self.image.is_some() {
            errors.add(
                "image",
                "Please either submit a file or check the clear checkbox, not both.",
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(TaskChanges {
            title,
            description: clean_description(&self.description),
            priority,
            expiration_date,
            completed: self.completed,
            image: if self.clear_image {
                ImageChange::Clear
            } else {
                ImageChange::Keep
            },
        })
    }

    /// Echo of the submitted values, keeping the stored image reference.
    pub fn values(&self, current_image: Option<&str>) -> TaskFormValues {
        TaskFormValues {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority.clone(),
            expiration_date: self.expiration_date.clone(),
            completed: self.completed,
            image: current_image.map(str::to_string),
        }
    }
}

fn clean_title(raw: &str, errors: &mut FormErrors) -> String {
    let title = raw.trim();
    if title.is_empty() {
        errors.add("title", REQUIRED);
        return String::new();
    }
    let len = title.chars().count();
    if len > TITLE_MAX_CHARS {
        errors.add(
            "title",
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                TITLE_MAX_CHARS, len
            ),
        );
    }
    title.to_string()
}

fn clean_description(raw: &str) -> Option<String> {
    let description = raw.trim();
    (!description.is_empty()).then(|| description.to_string())
}

fn clean_priority(raw: &str, errors: &mut FormErrors) -> Priority {
    let raw = raw.trim();
    if raw.is_empty() {
        return Priority::default();
    }
    Priority::parse(raw).unwrap_or_else(|| {
        errors.add(
            "priority",
            format!(
                "Select a valid choice. {} is not one of the available choices.",
                raw
            ),
        );
        Priority::default()
    })
}

fn clean_expiration<Tz: TimeZone>(
    raw: &str,
    tz: &Tz,
    errors: &mut FormErrors,
) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_datetime_in(raw, tz);
    if parsed.is_none() {
        errors.add("expiration_date", INVALID_DATETIME);
    }
    parsed
}

fn check_image(upload: Option<&Upload>, errors: &mut FormErrors) {
    if upload.is_some_and(|upload| !upload.is_image()) {
        errors.add("image", INVALID_IMAGE);
    }
}

/// Parse a form datetime. Values without an offset are local to `tz`.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM[:SS]` and a
/// bare `YYYY-MM-DD` (midnight).
pub fn parse_datetime_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    let naive = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    // Ambiguous local times take the earlier instant; skipped ones are invalid.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
