use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use taskdeck_shared::{Pagination, TaskQuery};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{EditLog, Rejected, RetryPolicy};
use crate::api::TaskApi;
use crate::error::ApiError;
use crate::filter::{self, FilterSpec};
use crate::hooks::HookRegistry;
use crate::stats::{TaskStats, compute_stats};
use crate::task::{Task, TaskCreate, TaskPatch, apply_patch};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub pagination: Option<Pagination>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Canonical task collection with optimistic mutations.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn TaskApi>,
    state: watch::Sender<TaskState>,
    filters: RwLock<FilterSpec>,
    edits: EditLog,
    hooks: HookRegistry,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.inner.state.borrow().tasks.len())
            .field("filters", &*self.inner.filters.read())
            .field("retry", &self.inner.retry)
            .finish()
    }
}

impl TaskStore {
    pub fn new(api: Arc<dyn TaskApi>, retry: RetryPolicy) -> Self {
        let (state, _) = watch::channel(TaskState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                filters: RwLock::new(FilterSpec::default()),
                edits: EditLog::default(),
                hooks: HookRegistry::default(),
                retry,
            }),
        }
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskState {
        self.inner.state.borrow().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state.borrow().tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.inner
            .state
            .borrow()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn filters(&self) -> FilterSpec {
        self.inner.filters.read().clone()
    }

    pub fn update_filters(&self, edit: impl FnOnce(&mut FilterSpec)) {
        let mut filters = self.inner.filters.write();
        edit(&mut filters);
        debug!(filters = %filters.to_string(), "filters updated");
    }

    pub fn clear_filters(&self) {
        self.inner.filters.write().clear();
    }

    /// The collection as the current filters present it.
    pub fn visible(&self) -> Vec<Task> {
        let filters = self.filters();
        filter::apply(&self.inner.state.borrow().tasks, &filters)
    }

    pub fn stats(&self, now: DateTime<Utc>, due_soon_window: Duration) -> TaskStats {
        compute_stats(&self.inner.state.borrow().tasks, now, due_soon_window)
    }

    pub fn clear_error(&self) {
        self.inner.state.send_modify(|s| s.error = None);
    }

    /// Replaces the collection with the server's. On failure the previous
    /// collection stays and the message lands in `TaskState::error`.
    #[instrument(skip(self, query))]
    pub async fn fetch_all(&self, query: &TaskQuery) -> Result<usize, ApiError> {
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.inner.api.list_tasks(query).await {
            Ok(data) => {
                let pagination = data.pagination().cloned();
                let tasks = data.into_tasks();
                let count = tasks.len();
                self.inner.state.send_modify(|s| {
                    s.tasks = tasks;
                    s.pagination = pagination;
                    s.loading = false;
                });
                info!(count, "fetched tasks");
                Ok(count)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "fetching tasks failed");
                let message = err.message().to_string();
                self.inner.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Server assigns the id, so nothing is inserted until it answers.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: &TaskCreate) -> Result<Task, Rejected<Task>> {
        match self.inner.api.create_task(input).await {
            Ok(task) => {
                let inserted = task.clone();
                self.inner.state.send_modify(|s| s.tasks.insert(0, inserted));
                info!(id = %task.id, "task created");
                Ok(task)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "create rejected");
                Err(Rejected::new(err))
            }
        }
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task, Rejected<Task>> {
        let generation = self.inner.edits.bump(id);
        let now = Utc::now();
        let mut previous = None;
        self.inner.state.send_modify(|s| {
            if let Some(task) = s.tasks.iter_mut().find(|t| t.id == id) {
                previous = Some(task.clone());
                apply_patch(task, patch, now);
            }
        });
        if previous.is_none() {
            debug!("task not in local collection; sending without optimistic copy");
        }

        match self.inner.api.update_task(id, patch).await {
            Ok(task) => {
                let replacement = task.clone();
                self.inner.state.send_modify(|s| {
                    if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == id) {
                        *slot = replacement;
                    }
                });
                if let Some(before) = previous.as_ref() {
                    self.inner.hooks.fire_if_completed(before.completed, &task);
                }
                debug!("update confirmed");
                Ok(task)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "update rejected");
                let Some(before) = previous else {
                    return Err(Rejected::new(err));
                };
                if self.inner.edits.current(id) != generation {
                    warn!("a newer edit superseded this one; keeping it");
                    return Err(Rejected::new(err));
                }
                let restored = before.clone();
                self.inner.state.send_modify(|s| {
                    if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == id) {
                        *slot = restored;
                    }
                });
                Err(Rejected::restored(err, before))
            }
        }
    }

    pub async fn toggle_completion(
        &self,
        id: &str,
        completed: bool,
    ) -> Result<Task, Rejected<Task>> {
        self.update(id, &TaskPatch::completed(completed)).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), Rejected<Task>> {
        self.inner.edits.bump(id);
        let mut removed = None;
        self.inner.state.send_modify(|s| {
            if let Some(idx) = s.tasks.iter().position(|t| t.id == id) {
                removed = Some((idx, s.tasks.remove(idx)));
            }
        });

        match self.inner.api.delete_task(id).await {
            Ok(()) => {
                self.inner.edits.forget(id);
                info!("task deleted");
                Ok(())
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "delete rejected");
                let Some((idx, task)) = removed else {
                    return Err(Rejected::new(err));
                };
                let reinserted = task.clone();
                self.inner.state.send_modify(|s| {
                    if !s.tasks.iter().any(|t| t.id == reinserted.id) {
                        let at = idx.min(s.tasks.len());
                        s.tasks.insert(at, reinserted);
                    }
                });
                Err(Rejected::restored(err, task))
            }
        }
    }

    /// Applies `ordered` locally right away and persists the new `order`
    /// values in the background. The result is always a permutation of
    /// the current collection: ids that are not loaded are ignored, a
    /// repeated id keeps its first position, and tasks the caller left
    /// out keep their relative order after the ones it named. Completed
    /// tasks keep whatever order they had.
    #[instrument(skip(self, ordered), fields(count = ordered.len()))]
    pub fn reorder(&self, ordered: Vec<Task>) -> JoinHandle<Result<usize, ApiError>> {
        let mut changes = Vec::new();
        self.inner.state.send_modify(|s| {
            let mut named: HashSet<&str> = HashSet::new();
            let mut next: Vec<Task> = Vec::with_capacity(s.tasks.len());
            for wanted in &ordered {
                let Some(local) = s.tasks.iter().find(|t| t.id == wanted.id) else {
                    warn!(id = %wanted.id, "ignoring unknown task in new order");
                    continue;
                };
                if named.insert(local.id.as_str()) {
                    next.push(local.clone());
                }
            }
            next.extend(
                s.tasks
                    .iter()
                    .filter(|t| !named.contains(t.id.as_str()))
                    .cloned(),
            );

            for (idx, task) in next.iter_mut().enumerate() {
                let position = i64::try_from(idx + 1).unwrap_or(i64::MAX);
                if !task.completed && task.order != Some(position) {
                    task.order = Some(position);
                    changes.push((task.id.clone(), position));
                }
            }
            s.tasks = next;
        });
        debug!(changed = changes.len(), "applied local order");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.persist_orders(changes).await })
    }
}

impl Inner {
    #[instrument(skip(self, changes), fields(count = changes.len()))]
    async fn persist_orders(&self, changes: Vec<(String, i64)>) -> Result<usize, ApiError> {
        let mut saved = 0;
        let mut first_error = None;
        for (id, order) in changes {
            match self.persist_order(&id, order).await {
                Ok(()) => saved += 1,
                Err(err) => {
                    warn!(id = %id, order, message = err.message(), "giving up on order");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => {
                debug!(saved, "order persisted");
                Ok(saved)
            }
            Some(err) => {
                let message = format!("Failed to save task order: {}", err.message());
                self.state.send_modify(|s| s.error = Some(message));
                Err(err)
            }
        }
    }

    async fn persist_order(&self, id: &str, order: i64) -> Result<(), ApiError> {
        let patch = TaskPatch::order(order);
        let mut attempt = 0;
        loop {
            match self.api.update_task(id, &patch).await {
                Ok(_) => return Ok(()),
                Err(err) if attempt < self.retry.retries && !err.is_unauthorized() => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    debug!(
                        id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        message = err.message(),
                        "retrying order update"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
