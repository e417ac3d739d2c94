//! Remote API seams. Stores depend on these traits so tests can swap in
//! in-memory fakes; [`HttpClient`] is the real implementation.

use async_trait::async_trait;
use taskdeck_shared::{
    AuthData, LoginRequest, NotificationFeed, SignupRequest, Task, TaskCreate, TaskListData,
    TaskPatch, TaskQuery, Todo, TodoBulkEntry, TodoCreate, TodoPatch, User,
};

use crate::error::ApiError;

mod http;

pub use http::HttpClient;

pub type ApiResult<T> = Result<T, ApiError>;

/// Task CRUD used by the task store.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<TaskListData>;

    async fn get_task(&self, id: &str) -> ApiResult<Task>;

    async fn create_task(&self, input: &TaskCreate) -> ApiResult<Task>;

    /// `PUT /tasks/:id` with only the changed fields.
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task>;

    async fn delete_task(&self, id: &str) -> ApiResult<()>;
}

/// Read-only views the server derives from the task collection.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn notifications(&self) -> ApiResult<NotificationFeed>;

    async fn urgent_notifications(&self) -> ApiResult<NotificationFeed>;

    async fn overdue_count(&self) -> ApiResult<u64>;

    async fn due_soon(&self, hours: u32) -> ApiResult<Vec<Task>>;
}

#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn list_todos(&self) -> ApiResult<Vec<Todo>>;

    async fn create_todo(&self, input: &TodoCreate) -> ApiResult<Todo>;

    async fn update_todo(&self, id: &str, patch: &TodoPatch) -> ApiResult<Todo>;

    async fn delete_todo(&self, id: &str) -> ApiResult<()>;

    async fn bulk_update_todos(&self, entries: &[TodoBulkEntry]) -> ApiResult<()>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ApiResult<AuthData>;

    async fn signup(&self, request: &SignupRequest) -> ApiResult<AuthData>;

    async fn current_user(&self) -> ApiResult<User>;
}
