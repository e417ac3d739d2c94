pub mod dates;

use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High
}

impl Priority {
  pub const ALL: [Priority; 3] = [
    Priority::High,
    Priority::Medium,
    Priority::Low
  ];

  /// Fixed comparison rank: high=3,
  /// medium=2, low=1.
  #[must_use]
  pub fn rank(self) -> u8 {
    match self {
      | Priority::High => 3,
      | Priority::Medium => 2,
      | Priority::Low => 1
    }
  }

  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Priority::High => "high",
      | Priority::Medium => "medium",
      | Priority::Low => "low"
    }
  }

  #[must_use]
  pub fn label(self) -> &'static str {
    match self {
      | Priority::High => "High",
      | Priority::Medium => "Medium",
      | Priority::Low => "Low"
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(
  pub String
);

impl fmt::Display for UnknownPriority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "priority must be low, medium, \
       or high (got {})",
      self.0
    )
  }
}

impl std::error::Error
  for UnknownPriority
{
}

impl FromStr for Priority {
  type Err = UnknownPriority;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "low" | "l" => Ok(Priority::Low),
      | "medium" | "m" => {
        Ok(Priority::Medium)
      }
      | "high" | "h" => {
        Ok(Priority::High)
      }
      | other => Err(UnknownPriority(
        other.to_string()
      ))
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  #[serde(rename = "_id")]
  pub id:          String,
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub priority:    Priority,
  #[serde(default)]
  pub completed:   bool,
  #[serde(
    default,
    with = "dates::option",
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date: Option<DateTime<Utc>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_time:    Option<String>,
  #[serde(with = "dates")]
  pub created_at:  DateTime<Utc>,
  #[serde(
    default,
    with = "dates::option",
    skip_serializing_if = "Option::is_none"
  )]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub order:       Option<i64>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub priority:    Priority,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<NaiveDate>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_time:    Option<String>
}

/// Partial update. `None` leaves a field
/// untouched; `Some(None)` on the due
/// fields clears them.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<Priority>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:
    Option<Option<NaiveDate>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_time: Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub order:       Option<i64>
}

impl TaskPatch {
  #[must_use]
  pub fn completed(
    completed: bool
  ) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn order(order: i64) -> Self {
    Self {
      order: Some(order),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskQuery {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub page:   Option<u32>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub limit:  Option<u32>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub status: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub sort:   Option<String>
}

impl TaskQuery {
  /// Query-string pairs in a fixed
  /// order.
  #[must_use]
  pub fn pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    if let Some(page) = self.page {
      out.push(("page", page.to_string()));
    }
    if let Some(limit) = self.limit {
      out
        .push(("limit", limit.to_string()));
    }
    if let Some(status) =
      self.status.as_ref()
    {
      out.push(("status", status.clone()));
    }
    if let Some(sort) = self.sort.as_ref()
    {
      out.push(("sort", sort.clone()));
    }
    out
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct Pagination {
  #[serde(default)]
  pub page:  u32,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub pages: u32
}

/// `GET /tasks` answers either with a
/// bare array or a paged object.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum TaskListData {
  Paged {
    tasks:      Vec<Task>,
    #[serde(default)]
    pagination: Option<Pagination>
  },
  Bare(Vec<Task>)
}

impl TaskListData {
  #[must_use]
  pub fn into_tasks(self) -> Vec<Task> {
    match self {
      | TaskListData::Paged {
        tasks,
        ..
      } => tasks,
      | TaskListData::Bare(tasks) => tasks
    }
  }

  #[must_use]
  pub fn pagination(
    &self
  ) -> Option<&Pagination> {
    match self {
      | TaskListData::Paged {
        pagination,
        ..
      } => pagination.as_ref(),
      | TaskListData::Bare(_) => None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
  #[serde(default)]
  pub within30_min:  Vec<Task>,
  #[serde(default)]
  pub within1_hour:  Vec<Task>,
  #[serde(default)]
  pub overdue:       Vec<Task>,
  #[serde(default)]
  pub due_today:     Vec<Task>,
  #[serde(default)]
  pub due_tomorrow:  Vec<Task>,
  #[serde(default)]
  pub upcoming:      Vec<Task>
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct OverdueCount {
  #[serde(default)]
  pub count: u64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Todo {
  #[serde(rename = "_id")]
  pub id:        String,
  #[serde(default)]
  pub text:      String,
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub order:     i64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoCreate {
  pub text:      String,
  pub completed: bool,
  pub order:     i64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TodoPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub text:      Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed: Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub order:     Option<i64>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoBulkEntry {
  #[serde(rename = "_id")]
  pub id:    String,
  #[serde(flatten)]
  pub patch: TodoPatch
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TodoBulkUpdate {
  pub todos: Vec<TodoBulkEntry>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(rename = "_id", alias = "id")]
  pub id:         String,
  #[serde(default)]
  pub name:       String,
  #[serde(default)]
  pub email:      String,
  #[serde(
    default,
    with = "dates::option",
    skip_serializing_if = "Option::is_none"
  )]
  pub created_at: Option<DateTime<Utc>>
}

/// Auth responses carry the user fields
/// flattened next to the token.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct AuthData {
  #[serde(flatten)]
  pub user:  User,
  pub token: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SignupRequest {
  pub name:     String,
  pub email:    String,
  pub password: String
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
  Success,
  Fail,
  Error,
  #[serde(other)]
  Unknown
}

/// The `{status, data}` success
/// envelope.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct Envelope<T> {
  pub status:  EnvelopeStatus,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub message: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub data:    Option<T>
}

impl<T> Envelope<T> {
  #[must_use]
  pub fn success(data: T) -> Self {
    Self {
      status:  EnvelopeStatus::Success,
      message: None,
      data:    Some(data)
    }
  }

  #[must_use]
  pub fn is_success(&self) -> bool {
    self.status
      == EnvelopeStatus::Success
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct FieldError {
  #[serde(alias = "path", alias = "param")]
  pub field:   String,
  #[serde(alias = "msg")]
  pub message: String
}

impl FieldError {
  pub fn new(
    field: impl Into<String>,
    message: impl Into<String>
  ) -> Self {
    Self {
      field:   field.into(),
      message: message.into()
    }
  }
}

/// Body of a non-2xx response.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ErrorBody {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub errors:  Option<Vec<FieldError>>
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_reads_server_shape() {
    let raw = r#"{
      "_id": "665f1c",
      "title": "Buy milk",
      "priority": "low",
      "completed": false,
      "dueDate": "2026-03-01",
      "createdAt": "2026-02-17T12:00:00.000Z",
      "order": 2
    }"#;
    let task: Task =
      serde_json::from_str(raw)
        .expect("parse task");
    assert_eq!(task.id, "665f1c");
    assert_eq!(task.priority, Priority::Low);
    assert_eq!(task.description, "");
    assert_eq!(
      task
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string()),
      Some("2026-03-01".to_string())
    );
    assert_eq!(task.order, Some(2));
  }

  #[test]
  fn envelope_without_data_decodes() {
    let raw = r#"{"status": "success"}"#;
    let envelope: Envelope<Task> =
      serde_json::from_str(raw)
        .expect("parse envelope");
    assert!(envelope.is_success());
    assert!(envelope.data.is_none());

    let raw = r#"{"status": "fail", "message": "nope"}"#;
    let envelope: Envelope<Vec<Todo>> =
      serde_json::from_str(raw)
        .expect("parse fail envelope");
    assert!(!envelope.is_success());
    assert_eq!(
      envelope.message.as_deref(),
      Some("nope")
    );
  }

  #[test]
  fn task_list_accepts_both_shapes() {
    let bare = r#"[{"_id":"a","title":"abc","createdAt":"2026-01-01T00:00:00Z"}]"#;
    let paged = r#"{"tasks":[{"_id":"a","title":"abc","createdAt":"2026-01-01T00:00:00Z"}],"pagination":{"page":1,"limit":10,"total":1,"pages":1}}"#;

    let bare: TaskListData =
      serde_json::from_str(bare)
        .expect("bare list");
    let paged: TaskListData =
      serde_json::from_str(paged)
        .expect("paged list");

    assert!(bare.pagination().is_none());
    assert_eq!(
      paged.pagination().map(|p| p.total),
      Some(1)
    );
    assert_eq!(bare.into_tasks().len(), 1);
    assert_eq!(paged.into_tasks().len(), 1);
  }

  #[test]
  fn patch_skips_untouched_fields() {
    let patch = TaskPatch {
      completed: Some(true),
      due_date: Some(None),
      ..TaskPatch::default()
    };
    let json = serde_json::to_value(&patch)
      .expect("serialize patch");
    assert_eq!(
      json,
      serde_json::json!({
        "completed": true,
        "dueDate": null
      })
    );
  }

  #[test]
  fn auth_data_flattens_user_fields() {
    let raw = r#"{"_id":"u1","name":"Ada","email":"ada@example.com","token":"jwt"}"#;
    let data: AuthData =
      serde_json::from_str(raw)
        .expect("auth data");
    assert_eq!(data.user.name, "Ada");
    assert_eq!(data.token, "jwt");
  }

  #[test]
  fn field_errors_accept_validator_keys() {
    let raw = r#"{"message":"Validation failed","errors":[{"path":"title","msg":"Title is required"}]}"#;
    let body: ErrorBody =
      serde_json::from_str(raw)
        .expect("error body");
    assert_eq!(
      body.errors,
      Some(vec![FieldError::new(
        "title",
        "Title is required"
      )])
    );
  }

  #[test]
  fn unknown_envelope_status_is_tolerated() {
    let raw =
      r#"{"status":"partial","data":1}"#;
    let env: Envelope<u32> =
      serde_json::from_str(raw)
        .expect("envelope");
    assert_eq!(
      env.status,
      EnvelopeStatus::Unknown
    );
    assert!(!env.is_success());
  }

  #[test]
  fn priority_parses_short_forms() {
    assert_eq!(
      "H".parse::<Priority>(),
      Ok(Priority::High)
    );
    assert!("urgent"
      .parse::<Priority>()
      .is_err());
  }
}
