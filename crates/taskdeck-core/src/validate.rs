//! Form-level checks run before anything is sent to the API. The stores
//! trust their input; these are for the callers that build it.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use taskdeck_shared::{FieldError, TaskCreate, TaskPatch};

pub const TITLE_MIN_LENGTH: usize = 3;
pub const TITLE_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MAX_LENGTH: usize = 500;
pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const NAME_MIN_LENGTH: usize = 2;

const REQUIRED_FIELD: &str = "This field is required";

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

fn time_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").ok())
        .as_ref()
}

pub fn validate_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Some("Title is required".to_string());
    }
    let len = trimmed.chars().count();
    if len < TITLE_MIN_LENGTH {
        return Some(format!("Title must be at least {TITLE_MIN_LENGTH} characters"));
    }
    if len > TITLE_MAX_LENGTH {
        return Some(format!("Title cannot exceed {TITLE_MAX_LENGTH} characters"));
    }
    None
}

pub fn validate_description(description: &str) -> Option<String> {
    if description.trim().chars().count() > DESCRIPTION_MAX_LENGTH {
        return Some(format!(
            "Description cannot exceed {DESCRIPTION_MAX_LENGTH} characters"
        ));
    }
    None
}

pub fn validate_due_date(date: Option<NaiveDate>, today: NaiveDate) -> Option<String> {
    match date {
        Some(date) if date < today => Some("Due date cannot be in the past".to_string()),
        _ => None,
    }
}

pub fn validate_due_time(time: Option<&str>) -> Option<String> {
    match time {
        Some(time) if !time_regex().is_some_and(|re| re.is_match(time.trim())) => {
            Some("Time must be in HH:MM format (e.g., 14:30)".to_string())
        }
        _ => None,
    }
}

pub fn validate_email(email: &str) -> Option<String> {
    if email.trim().is_empty() {
        return Some(REQUIRED_FIELD.to_string());
    }
    if !email_regex().is_some_and(|re| re.is_match(email.trim())) {
        return Some("Please enter a valid email address".to_string());
    }
    None
}

pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some(REQUIRED_FIELD.to_string());
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Some(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain at least one number".to_string());
    }
    None
}

pub fn validate_name(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some(REQUIRED_FIELD.to_string());
    }
    if name.trim().chars().count() < NAME_MIN_LENGTH {
        return Some(format!("Name must be at least {NAME_MIN_LENGTH} characters"));
    }
    None
}

fn collect(checks: impl IntoIterator<Item = (&'static str, Option<String>)>) -> Vec<FieldError> {
    checks
        .into_iter()
        .filter_map(|(field, err)| err.map(|message| FieldError::new(field, message)))
        .collect()
}

/// Trims text fields in place and reports every failing field.
pub fn validate_task_create(input: &mut TaskCreate, today: NaiveDate) -> Vec<FieldError> {
    input.title = input.title.trim().to_string();
    input.description = input.description.trim().to_string();
    collect([
        ("title", validate_title(&input.title)),
        ("description", validate_description(&input.description)),
        ("dueDate", validate_due_date(input.due_date, today)),
        ("dueTime", validate_due_time(input.due_time.as_deref())),
    ])
}

/// Same rules as creation, applied only to the fields the patch touches.
pub fn validate_task_patch(patch: &mut TaskPatch, today: NaiveDate) -> Vec<FieldError> {
    if let Some(title) = patch.title.as_mut() {
        *title = title.trim().to_string();
    }
    if let Some(description) = patch.description.as_mut() {
        *description = description.trim().to_string();
    }
    collect([
        ("title", patch.title.as_deref().and_then(validate_title)),
        (
            "description",
            patch.description.as_deref().and_then(validate_description),
        ),
        (
            "dueDate",
            patch.due_date.and_then(|date| validate_due_date(date, today)),
        ),
        (
            "dueTime",
            patch
                .due_time
                .as_ref()
                .and_then(|time| validate_due_time(time.as_deref())),
        ),
    ])
}

pub fn validate_login(email: &str, password: &str) -> Vec<FieldError> {
    collect([
        ("email", validate_email(email)),
        ("password", validate_password(password)),
    ])
}

pub fn validate_signup(name: &str, email: &str, password: &str) -> Vec<FieldError> {
    collect([
        ("name", validate_name(name)),
        ("email", validate_email(email)),
        ("password", validate_password(password)),
    ])
}
