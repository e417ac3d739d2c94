#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use taskdeck_core::api::{ApiResult, AuthApi, TaskApi, TodoApi};
use taskdeck_core::error::ApiError;
use taskdeck_core::task::apply_patch;
use taskdeck_shared::{
    AuthData, ErrorBody, LoginRequest, Priority, SignupRequest, Task, TaskCreate, TaskListData,
    TaskPatch, TaskQuery, Todo, TodoBulkEntry, TodoCreate, TodoPatch, User,
};
use tokio::sync::Notify;

pub fn task(id: &str, title: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        priority: Priority::Medium,
        completed: false,
        due_date: None,
        due_time: None,
        created_at: Utc
            .with_ymd_and_hms(2026, 2, 1, 9, 0, 0)
            .single()
            .expect("fixture timestamp"),
        updated_at: None,
        order: None,
    }
}

pub fn server_error() -> ApiError {
    ApiError::from_status(500, ErrorBody::default())
}

pub fn user(email: &str) -> User {
    User {
        id: "u1".to_string(),
        name: "Ada".to_string(),
        email: email.to_string(),
        created_at: None,
    }
}

/// Task service double. Failures queue per operation and are decided when
/// the call starts; `hold_next_update` parks the next update until the
/// returned `Notify` fires.
#[derive(Default)]
pub struct FakeTasks {
    pub server: Mutex<Vec<Task>>,
    pub fail_list: Mutex<VecDeque<ApiError>>,
    pub fail_create: Mutex<VecDeque<ApiError>>,
    pub fail_update: Mutex<VecDeque<ApiError>>,
    pub fail_delete: Mutex<VecDeque<ApiError>>,
    pub updates: Mutex<Vec<(String, TaskPatch)>>,
    pub deletes: Mutex<Vec<String>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeTasks {
    pub fn with(tasks: Vec<Task>) -> Arc<Self> {
        let fake = Self::default();
        *fake.server.lock() = tasks;
        Arc::new(fake)
    }

    pub fn hold_next_update(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock() = Some(gate.clone());
        gate
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }
}

#[async_trait]
impl TaskApi for FakeTasks {
    async fn list_tasks(&self, _query: &TaskQuery) -> ApiResult<TaskListData> {
        if let Some(err) = self.fail_list.lock().pop_front() {
            return Err(err);
        }
        Ok(TaskListData::Bare(self.server.lock().clone()))
    }

    async fn get_task(&self, id: &str) -> ApiResult<Task> {
        self.server
            .lock()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(404, ErrorBody::default()))
    }

    async fn create_task(&self, input: &TaskCreate) -> ApiResult<Task> {
        if let Some(err) = self.fail_create.lock().pop_front() {
            return Err(err);
        }
        let mut server = self.server.lock();
        let mut created = task(&format!("new{}", server.len() + 1), &input.title);
        created.description = input.description.clone();
        created.priority = input.priority;
        server.insert(0, created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task> {
        self.updates.lock().push((id.to_string(), patch.clone()));
        let failure = self.fail_update.lock().pop_front();
        let gate = self.hold.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let mut server = self.server.lock();
        let stored = server
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::from_status(404, ErrorBody::default()))?;
        apply_patch(stored, patch, Utc::now());
        Ok(stored.clone())
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        self.deletes.lock().push(id.to_string());
        if let Some(err) = self.fail_delete.lock().pop_front() {
            return Err(err);
        }
        self.server.lock().retain(|t| t.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTodos {
    pub server: Mutex<Vec<Todo>>,
    pub created: Mutex<Vec<TodoCreate>>,
    pub bulk_calls: Mutex<Vec<Vec<TodoBulkEntry>>>,
    pub fail_bulk: Mutex<VecDeque<ApiError>>,
    pub fail_update: Mutex<VecDeque<ApiError>>,
    pub fail_delete: Mutex<VecDeque<ApiError>>,
}

impl FakeTodos {
    pub fn with(todos: Vec<Todo>) -> Arc<Self> {
        let fake = Self::default();
        *fake.server.lock() = todos;
        Arc::new(fake)
    }
}

pub fn todo(id: &str, text: &str, order: i64) -> Todo {
    Todo {
        id: id.to_string(),
        text: text.to_string(),
        completed: false,
        order,
    }
}

#[async_trait]
impl TodoApi for FakeTodos {
    async fn list_todos(&self) -> ApiResult<Vec<Todo>> {
        Ok(self.server.lock().clone())
    }

    async fn create_todo(&self, input: &TodoCreate) -> ApiResult<Todo> {
        self.created.lock().push(input.clone());
        let mut server = self.server.lock();
        let created = Todo {
            id: format!("row{}", server.len() + 1),
            text: input.text.clone(),
            completed: input.completed,
            order: input.order,
        };
        server.push(created.clone());
        Ok(created)
    }

    async fn update_todo(&self, id: &str, patch: &TodoPatch) -> ApiResult<Todo> {
        if let Some(err) = self.fail_update.lock().pop_front() {
            return Err(err);
        }
        let mut server = self.server.lock();
        let stored = server
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::from_status(404, ErrorBody::default()))?;
        if let Some(text) = patch.text.as_ref() {
            stored.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            stored.completed = completed;
        }
        if let Some(order) = patch.order {
            stored.order = order;
        }
        Ok(stored.clone())
    }

    async fn delete_todo(&self, id: &str) -> ApiResult<()> {
        if let Some(err) = self.fail_delete.lock().pop_front() {
            return Err(err);
        }
        self.server.lock().retain(|t| t.id != id);
        Ok(())
    }

    async fn bulk_update_todos(&self, entries: &[TodoBulkEntry]) -> ApiResult<()> {
        self.bulk_calls.lock().push(entries.to_vec());
        if let Some(err) = self.fail_bulk.lock().pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAuth {
    pub login_result: Mutex<Option<ApiResult<AuthData>>>,
    pub me_result: Mutex<Option<ApiResult<User>>>,
    pub logins: Mutex<Vec<LoginRequest>>,
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn login(&self, request: &LoginRequest) -> ApiResult<AuthData> {
        self.logins.lock().push(request.clone());
        self.login_result
            .lock()
            .take()
            .unwrap_or_else(|| Err(ApiError::generic("no login scripted")))
    }

    async fn signup(&self, request: &SignupRequest) -> ApiResult<AuthData> {
        Ok(AuthData {
            user: User {
                id: "u2".to_string(),
                name: request.name.clone(),
                email: request.email.clone(),
                created_at: None,
            },
            token: "fresh-token".to_string(),
        })
    }

    async fn current_user(&self) -> ApiResult<User> {
        self.me_result
            .lock()
            .take()
            .unwrap_or_else(|| Err(ApiError::from_status(401, ErrorBody::default())))
    }
}
