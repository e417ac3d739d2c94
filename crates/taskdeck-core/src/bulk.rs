use std::collections::BTreeSet;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::export::{ExportFormat, export};
use crate::store::TaskStore;
use crate::task::{Task, TaskPatch};

/// Ids picked for a batch action, plus the mode flag that shows the
/// checkboxes. Only ids of loaded tasks can be selected; call
/// [`Selection::retain_loaded`] whenever the collection changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    mode: bool,
    loaded: BTreeSet<String>,
    selected: BTreeSet<String>,
}

impl Selection {
    pub fn for_tasks(tasks: &[Task]) -> Self {
        let mut selection = Self::default();
        selection.retain_loaded(tasks);
        selection
    }

    /// Adopts `tasks` as the loaded collection and drops selected ids
    /// that are no longer in it.
    pub fn retain_loaded(&mut self, tasks: &[Task]) {
        self.loaded = tasks.iter().map(|t| t.id.clone()).collect();
        let loaded = &self.loaded;
        self.selected.retain(|id| loaded.contains(id));
    }

    pub fn is_selection_mode(&self) -> bool {
        self.mode
    }

    /// Turning the mode off drops the selection.
    pub fn toggle_selection_mode(&mut self) -> bool {
        self.mode = !self.mode;
        if !self.mode {
            self.selected.clear();
        }
        self.mode
    }

    /// Returns whether `id` is selected afterwards. Unknown ids are
    /// ignored.
    pub fn toggle_select(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            return false;
        }
        if !self.loaded.contains(id) {
            debug!(id, "ignoring selection of a task that is not loaded");
            return false;
        }
        self.selected.insert(id.to_string());
        true
    }

    /// Replaces the selection with the loaded ids among `ids`.
    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let loaded = &self.loaded;
        self.selected = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| loaded.contains(id))
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, ApiError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<T, E>(&mut self, id: String, result: Result<T, E>)
    where
        E: Into<ApiError>,
    {
        match result {
            Ok(_) => self.succeeded.push(id),
            Err(err) => self.failed.push((id, err.into())),
        }
    }
}

/// Marks every selected task completed, one request per task, all in
/// flight together. The selection is cleared whatever the outcome.
#[instrument(skip(store, selection), fields(count = selection.len()))]
pub async fn complete_selected(store: &TaskStore, selection: &mut Selection) -> BatchReport {
    selection.retain_loaded(&store.tasks());
    let ids = selection.ids();
    selection.deselect_all();

    let patch = TaskPatch::completed(true);
    let results = join_all(ids.iter().map(|id| store.update(id, &patch))).await;

    let mut report = BatchReport::default();
    for (id, result) in ids.into_iter().zip(results) {
        report.record(id, result);
    }
    log_report("complete", &report);
    report
}

#[instrument(skip(store, selection), fields(count = selection.len()))]
pub async fn delete_selected(store: &TaskStore, selection: &mut Selection) -> BatchReport {
    selection.retain_loaded(&store.tasks());
    let ids = selection.ids();
    selection.deselect_all();

    let results = join_all(ids.iter().map(|id| store.delete(id))).await;
    selection.retain_loaded(&store.tasks());

    let mut report = BatchReport::default();
    for (id, result) in ids.into_iter().zip(results) {
        report.record(id, result);
    }
    log_report("delete", &report);
    report
}

/// Renders the selected tasks in collection order.
pub fn export_selected(
    store: &TaskStore,
    selection: &mut Selection,
    format: ExportFormat,
    today: NaiveDate,
) -> anyhow::Result<String> {
    let tasks: Vec<Task> = store
        .tasks()
        .into_iter()
        .filter(|t| selection.is_selected(&t.id))
        .collect();
    selection.deselect_all();
    export(&tasks, format, today)
}

fn log_report(action: &str, report: &BatchReport) {
    if report.is_success() {
        info!(action, succeeded = report.succeeded.len(), "batch finished");
    } else {
        warn!(
            action,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch finished with failures"
        );
    }
}
