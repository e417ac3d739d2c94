//! Client-side state holders. Each store owns its collection, publishes it
//! through a `watch` channel, and reconciles local edits with the server.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::ApiError;

pub mod auth;
pub mod tasks;
pub mod todos;

pub use auth::{AuthState, AuthStore};
pub use tasks::{TaskState, TaskStore};
pub use todos::{TodoState, TodoStore};

/// A mutation the server refused. `restored` is the local record that was
/// put back, or `None` when nothing had been applied locally or a newer
/// edit made the rollback moot.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected<T> {
    pub error: ApiError,
    pub restored: Option<T>,
}

impl<T> Rejected<T> {
    pub fn new(error: ApiError) -> Self {
        Self {
            error,
            restored: None,
        }
    }

    pub fn restored(error: ApiError, restored: T) -> Self {
        Self {
            error,
            restored: Some(restored),
        }
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> From<Rejected<T>> for ApiError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}

impl<T: fmt::Debug> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Retry schedule for background order persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: crate::config::DEFAULT_REORDER_RETRIES,
            backoff: Duration::from_millis(crate::config::DEFAULT_REORDER_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &crate::config::Config) -> anyhow::Result<Self> {
        Ok(Self {
            retries: cfg.reorder_retries()?,
            backoff: cfg.reorder_backoff()?,
        })
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Per-record edit counters. A rollback only lands if the counter still
/// matches the value taken when the edit was applied.
#[derive(Debug, Default)]
pub(crate) struct EditLog(Mutex<HashMap<String, u64>>);

impl EditLog {
    pub(crate) fn bump(&self, id: &str) -> u64 {
        let mut edits = self.0.lock();
        let entry = edits.entry(id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub(crate) fn current(&self, id: &str) -> u64 {
        self.0.lock().get(id).copied().unwrap_or(0)
    }

    pub(crate) fn forget(&self, id: &str) {
        self.0.lock().remove(id);
    }
}
