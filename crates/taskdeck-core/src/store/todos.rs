use std::sync::Arc;

use taskdeck_shared::{TodoBulkEntry, TodoCreate};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::{EditLog, Rejected};
use crate::api::TodoApi;
use crate::error::ApiError;
use crate::task::{Todo, TodoPatch};

/// Rows a fresh planner starts with.
pub const SEED_ROWS: i64 = 6;
/// The planner never drops below this many rows.
pub const MIN_ROWS: usize = 1;

pub const LAST_ROW_MESSAGE: &str = "At least one item must remain";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoState {
    pub todos: Vec<Todo>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Daily planner rows. Same optimistic contract as the task store.
#[derive(Clone)]
pub struct TodoStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn TodoApi>,
    state: watch::Sender<TodoState>,
    edits: EditLog,
}

impl std::fmt::Debug for TodoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoStore")
            .field("todos", &self.inner.state.borrow().todos.len())
            .finish()
    }
}

fn next_order(todos: &[Todo]) -> i64 {
    todos.iter().map(|t| t.order).max().map_or(1, |max| max + 1)
}

impl TodoStore {
    pub fn new(api: Arc<dyn TodoApi>) -> Self {
        let (state, _) = watch::channel(TodoState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                edits: EditLog::default(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> TodoState {
        self.inner.state.borrow().clone()
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.inner.state.borrow().todos.clone()
    }

    /// Loads the planner, seeding blank rows when the server has none.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<usize, ApiError> {
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = match self.inner.api.list_todos().await {
            Ok(todos) if todos.is_empty() => self.seed().await,
            other => other,
        };

        match result {
            Ok(mut todos) => {
                todos.sort_by_key(|t| t.order);
                let count = todos.len();
                self.inner.state.send_modify(|s| {
                    s.todos = todos;
                    s.loading = false;
                });
                info!(count, "fetched todos");
                Ok(count)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "fetching todos failed");
                let message = err.message().to_string();
                self.inner.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    async fn seed(&self) -> Result<Vec<Todo>, ApiError> {
        debug!(rows = SEED_ROWS, "seeding empty planner");
        let mut seeded = Vec::new();
        for order in 1..=SEED_ROWS {
            let input = TodoCreate {
                text: String::new(),
                completed: false,
                order,
            };
            seeded.push(self.inner.api.create_todo(&input).await?);
        }
        Ok(seeded)
    }

    /// Appends a row after the current last one.
    #[instrument(skip(self, text))]
    pub async fn create(&self, text: &str) -> Result<Todo, Rejected<Todo>> {
        let input = TodoCreate {
            text: text.trim().to_string(),
            completed: false,
            order: next_order(&self.inner.state.borrow().todos),
        };
        match self.inner.api.create_todo(&input).await {
            Ok(todo) => {
                let appended = todo.clone();
                self.inner.state.send_modify(|s| s.todos.push(appended));
                info!(id = %todo.id, order = todo.order, "todo created");
                Ok(todo)
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "create rejected");
                Err(Rejected::new(err))
            }
        }
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &TodoPatch) -> Result<Todo, Rejected<Todo>> {
        let generation = self.inner.edits.bump(id);
        let mut previous = None;
        self.inner.state.send_modify(|s| {
            if let Some(todo) = s.todos.iter_mut().find(|t| t.id == id) {
                previous = Some(todo.clone());
                if let Some(text) = patch.text.as_ref() {
                    todo.text = text.clone();
                }
                if let Some(completed) = patch.completed {
                    todo.completed = completed;
                }
                if let Some(order) = patch.order {
                    todo.order = order;
                }
            }
        });

        match self.inner.api.update_todo(id, patch).await {
            Ok(todo) => {
                let replacement = todo.clone();
                self.inner.state.send_modify(|s| {
                    if let Some(slot) = s.todos.iter_mut().find(|t| t.id == id) {
                        *slot = replacement;
                    }
                });
                Ok(todo)
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
                    if let Some(slot) = s.todos.iter_mut().find(|t| t.id == id) {
                        *slot = restored;
                    }
                });
                Err(Rejected::restored(err, before))
            }
        }
    }

    pub async fn set_text(&self, id: &str, text: &str) -> Result<Todo, Rejected<Todo>> {
        let patch = TodoPatch {
            text: Some(text.to_string()),
            ..TodoPatch::default()
        };
        self.update(id, &patch).await
    }

    /// Flips the row's completion flag.
    pub async fn toggle(&self, id: &str) -> Result<Todo, Rejected<Todo>> {
        let current = self
            .inner
            .state
            .borrow()
            .todos
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.completed);
        let Some(completed) = current else {
            return Err(Rejected::new(ApiError::NotFound {
                message: format!("Todo {id} not found"),
            }));
        };
        let patch = TodoPatch {
            completed: Some(!completed),
            ..TodoPatch::default()
        };
        self.update(id, &patch).await
    }

    /// Refused locally when it would leave the planner empty.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), Rejected<Todo>> {
        let mut removed = None;
        let mut blocked = false;
        self.inner.state.send_modify(|s| {
            if s.todos.len() <= MIN_ROWS {
                blocked = true;
                return;
            }
            if let Some(idx) = s.todos.iter().position(|t| t.id == id) {
                removed = Some((idx, s.todos.remove(idx)));
            }
        });
        if blocked {
            debug!("refusing to delete the last row");
            return Err(Rejected::new(ApiError::generic(LAST_ROW_MESSAGE)));
        }
        self.inner.edits.bump(id);

        match self.inner.api.delete_todo(id).await {
            Ok(()) => {
                self.inner.edits.forget(id);
                info!("todo deleted");
                Ok(())
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "delete rejected");
                let Some((idx, todo)) = removed else {
                    return Err(Rejected::new(err));
                };
                let reinserted = todo.clone();
                self.inner.state.send_modify(|s| {
                    if !s.todos.iter().any(|t| t.id == reinserted.id) {
                        let at = idx.min(s.todos.len());
                        s.todos.insert(at, reinserted);
                    }
                });
                Err(Rejected::restored(err, todo))
            }
        }
    }

    /// Moves a row and persists the renumbered order in one bulk call.
    /// On failure the previous ordering comes back.
    #[instrument(skip(self))]
    pub async fn move_row(&self, from: usize, to: usize) -> Result<(), Rejected<Vec<Todo>>> {
        let before = self.todos();
        if from >= before.len() || to >= before.len() {
            return Err(Rejected::new(ApiError::generic(format!(
                "row {} is out of range (1-{})",
                from.max(to) + 1,
                before.len()
            ))));
        }
        if from == to {
            return Ok(());
        }

        let mut next = crate::reorder::array_move(&before, from, to);
        let mut entries = Vec::new();
        for (idx, todo) in next.iter_mut().enumerate() {
            let order = i64::try_from(idx + 1).unwrap_or(i64::MAX);
            if todo.order != order {
                todo.order = order;
                entries.push(TodoBulkEntry {
                    id: todo.id.clone(),
                    patch: TodoPatch {
                        order: Some(order),
                        ..TodoPatch::default()
                    },
                });
            }
        }
        self.inner.state.send_modify(|s| s.todos = next);

        match self.inner.api.bulk_update_todos(&entries).await {
            Ok(()) => {
                debug!(changed = entries.len(), "todo order saved");
                Ok(())
            }
            Err(err) => {
                warn!(kind = %err.kind(), message = err.message(), "bulk reorder rejected");
                let restored = before.clone();
                self.inner.state.send_modify(|s| s.todos = restored);
                Err(Rejected::restored(err, before))
            }
        }
    }
}
