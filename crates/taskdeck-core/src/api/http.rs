use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use taskdeck_shared::{
    AuthData, Envelope, ErrorBody, LoginRequest, NotificationFeed, OverdueCount, SignupRequest,
    Task, TaskCreate, TaskListData, TaskPatch, TaskQuery, Todo, TodoBulkEntry, TodoBulkUpdate,
    TodoCreate, TodoPatch, User,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ApiResult, AuthApi, NotificationApi, TaskApi, TodoApi};
use crate::config::Config;
use crate::error::{ApiError, GENERIC_ERROR};
use crate::session::Session;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// JSON-over-HTTP client for the task service. Cloning shares the
/// connection pool and the session.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("invalid api.url: {base_url}"))?;
        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "initialized http client");
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn from_config(cfg: &Config, session: Session) -> anyhow::Result<Self> {
        Self::new(&cfg.api_url(), cfg.api_timeout()?, session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Joins `segments` onto the base path, percent-encoding each one so
    /// ids never change the shape of the URL.
    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::generic(format!("invalid request url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::generic("api.url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    #[tracing::instrument(skip(self, query, body), fields(method = %method, path = %segments.join("/")))]
    async fn send<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(segments, query)?;
        let request_id = Uuid::new_v4();

        let mut request = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(ApiError::network)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::network)?;
        debug!(
            %request_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "response received"
        );

        if !status.is_success() {
            return Err(self.failure(status, &bytes));
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|err| ApiError::generic(format!("invalid response body: {err}")))?;
        if !envelope.is_success() {
            return Err(ApiError::generic(
                envelope.message.unwrap_or_else(|| GENERIC_ERROR.to_string()),
            ));
        }
        match envelope.data {
            Some(data) => Ok(data),
            None => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| ApiError::generic("response carried no data")),
        }
    }

    fn failure(&self, status: StatusCode, bytes: &[u8]) -> ApiError {
        let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();
        let err = ApiError::from_status(status.as_u16(), body);
        if err.is_unauthorized() {
            warn!("unauthorized; clearing session");
            if let Err(clear_err) = self.session.clear() {
                warn!(error = %format!("{clear_err:#}"), "failed to clear session");
            }
        } else {
            debug!(kind = %err.kind(), message = err.message(), "request failed");
        }
        err
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        self.send::<(), T>(Method::GET, segments, query, None).await
    }

    async fn with_body<B, T>(&self, method: Method, segments: &[&str], body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(method, segments, &[], Some(body)).await
    }

    async fn delete(&self, segments: &[&str]) -> ApiResult<()> {
        self.send::<(), IgnoredAny>(Method::DELETE, segments, &[], None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl TaskApi for HttpClient {
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<TaskListData> {
        self.get(&["tasks"], &query.pairs()).await
    }

    async fn get_task(&self, id: &str) -> ApiResult<Task> {
        self.get(&["tasks", id], &[]).await
    }

    async fn create_task(&self, input: &TaskCreate) -> ApiResult<Task> {
        self.with_body(Method::POST, &["tasks"], input).await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task> {
        self.with_body(Method::PUT, &["tasks", id], patch)
            .await
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        self.delete(&["tasks", id]).await
    }
}

#[async_trait]
impl NotificationApi for HttpClient {
    async fn notifications(&self) -> ApiResult<NotificationFeed> {
        self.get(&["tasks", "notifications"], &[]).await
    }

    async fn urgent_notifications(&self) -> ApiResult<NotificationFeed> {
        self.get(&["tasks", "notifications", "urgent"], &[]).await
    }

    async fn overdue_count(&self) -> ApiResult<u64> {
        let count: OverdueCount = self.get(&["tasks", "overdue-count"], &[]).await?;
        Ok(count.count)
    }

    async fn due_soon(&self, hours: u32) -> ApiResult<Vec<Task>> {
        let data: TaskListData = self
            .get(&["tasks", "due-soon"], &[("hours", hours.to_string())])
            .await?;
        Ok(data.into_tasks())
    }
}

#[async_trait]
impl TodoApi for HttpClient {
    async fn list_todos(&self) -> ApiResult<Vec<Todo>> {
        self.get(&["todos"], &[]).await
    }

    async fn create_todo(&self, input: &TodoCreate) -> ApiResult<Todo> {
        self.with_body(Method::POST, &["todos"], input).await
    }

    async fn update_todo(&self, id: &str, patch: &TodoPatch) -> ApiResult<Todo> {
        self.with_body(Method::PATCH, &["todos", id], patch)
            .await
    }

    async fn delete_todo(&self, id: &str) -> ApiResult<()> {
        self.delete(&["todos", id]).await
    }

    async fn bulk_update_todos(&self, entries: &[TodoBulkEntry]) -> ApiResult<()> {
        let body = TodoBulkUpdate {
            todos: entries.to_vec(),
        };
        let _: IgnoredAny = self
            .with_body(Method::PATCH, &["todos", "bulk"], &body)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn login(&self, request: &LoginRequest) -> ApiResult<AuthData> {
        self.with_body(Method::POST, &["auth", "login"], request).await
    }

    async fn signup(&self, request: &SignupRequest) -> ApiResult<AuthData> {
        self.with_body(Method::POST, &["auth", "signup"], request).await
    }

    async fn current_user(&self) -> ApiResult<User> {
        self.get(&["auth", "me"], &[]).await
    }
}
