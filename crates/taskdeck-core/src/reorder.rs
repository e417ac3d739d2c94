//! Array-move reordering and the drag gesture that drives it.

use tracing::debug;

use crate::task::Task;

/// Pointer travel, in pixels, before a press becomes a drag.
pub const ACTIVATION_DISTANCE: f64 = 8.0;

/// Removes the item at `from` and reinserts it at `to`, keeping every other
/// item in its relative order. Out-of-range `from` leaves the order alone;
/// `to` is clamped to the last slot.
pub fn array_move<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut out = items.to_vec();
    if from >= out.len() {
        return out;
    }
    let to = to.min(out.len() - 1);
    let item = out.remove(from);
    out.insert(to, item);
    out
}

/// Moves the pending task at `from` to the slot of the pending task at
/// `to`. Completed tasks keep their positions; only the pending
/// subsequence is permuted. `None` when either index is out of range or
/// points at a completed task.
pub fn move_pending(tasks: &[Task], from: usize, to: usize) -> Option<Vec<Task>> {
    let slots: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.completed)
        .map(|(idx, _)| idx)
        .collect();
    let from_rank = slots.iter().position(|&idx| idx == from)?;
    let to_rank = slots.iter().position(|&idx| idx == to)?;

    let pending: Vec<Task> = slots.iter().map(|&idx| tasks[idx].clone()).collect();
    let mut moved = array_move(&pending, from_rank, to_rank).into_iter();

    let mut out = tasks.to_vec();
    for &idx in &slots {
        if let Some(task) = moved.next() {
            out[idx] = task;
        }
    }
    Some(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragInput {
    Pointer,
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    /// Pointer is down on a row but has not travelled far enough.
    Armed { source: usize, origin: (f64, f64) },
    Dragging {
        source: usize,
        over: Option<usize>,
        input: DragInput,
    },
    Dropped { from: usize, to: usize },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// The gesture ended without changing anything (a click, or a drop on
    /// the source row).
    Unchanged,
    Reordered(Vec<Task>),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("a drag is already in progress")]
    AlreadyActive,
    #[error("row {} is completed and cannot be moved", .0 + 1)]
    NotDraggable(usize),
    #[error("row {} does not exist", .0 + 1)]
    OutOfRange(usize),
}

/// One drag gesture at a time over a snapshot of the displayed rows.
#[derive(Debug, Clone)]
pub struct DragController {
    tasks: Vec<Task>,
    state: DragState,
    activation_distance: f64,
}

impl DragController {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            state: DragState::Idle,
            activation_distance: ACTIVATION_DISTANCE,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Replaces the rows; ignored mid-gesture.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        if !self.is_active() {
            self.tasks = tasks;
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            DragState::Armed { .. } | DragState::Dragging { .. }
        )
    }

    fn check_source(&self, index: usize) -> Result<(), DragError> {
        if self.is_active() {
            return Err(DragError::AlreadyActive);
        }
        match self.tasks.get(index) {
            None => Err(DragError::OutOfRange(index)),
            Some(task) if task.completed => Err(DragError::NotDraggable(index)),
            Some(_) => Ok(()),
        }
    }

    fn is_target(&self, index: usize) -> bool {
        self.tasks.get(index).is_some_and(|t| !t.completed)
    }

    pub fn press(&mut self, index: usize, x: f64, y: f64) -> Result<(), DragError> {
        self.check_source(index)?;
        self.state = DragState::Armed {
            source: index,
            origin: (x, y),
        };
        Ok(())
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let DragState::Armed { source, origin } = self.state {
            let distance = (x - origin.0).hypot(y - origin.1);
            if distance >= self.activation_distance {
                debug!(source, distance, "drag activated");
                self.state = DragState::Dragging {
                    source,
                    over: Some(source),
                    input: DragInput::Pointer,
                };
            }
        }
    }

    /// Pointer entered a row, or left every row when `index` is `None`.
    /// Completed rows are not drop targets.
    pub fn hover(&mut self, index: Option<usize>) {
        let target = index.filter(|&idx| self.is_target(idx));
        if let DragState::Dragging { over, .. } = &mut self.state {
            *over = target;
        }
    }

    /// Keyboard drags start immediately on the focused row.
    pub fn key_start(&mut self, index: usize) -> Result<(), DragError> {
        self.check_source(index)?;
        self.state = DragState::Dragging {
            source: index,
            over: Some(index),
            input: DragInput::Keyboard,
        };
        Ok(())
    }

    pub fn key_up(&mut self) {
        self.step(false);
    }

    pub fn key_down(&mut self) {
        self.step(true);
    }

    fn step(&mut self, forward: bool) {
        let DragState::Dragging {
            source,
            over,
            input: DragInput::Keyboard,
        } = self.state
        else {
            return;
        };
        let current = over.unwrap_or(source);
        let next = if forward {
            (current + 1..self.tasks.len()).find(|&idx| self.is_target(idx))
        } else {
            (0..current).rev().find(|&idx| self.is_target(idx))
        };
        if let Some(next) = next {
            self.state = DragState::Dragging {
                source,
                over: Some(next),
                input: DragInput::Keyboard,
            };
        }
    }

    /// Escape.
    pub fn cancel(&mut self) -> DragOutcome {
        if self.is_active() {
            self.state = DragState::Cancelled;
            debug!("drag cancelled");
            return DragOutcome::Cancelled;
        }
        DragOutcome::Unchanged
    }

    /// Pointer release or keyboard drop.
    pub fn release(&mut self) -> DragOutcome {
        match self.state {
            DragState::Armed { .. } => {
                self.state = DragState::Idle;
                DragOutcome::Unchanged
            }
            DragState::Dragging {
                source,
                over: Some(target),
                ..
            } => {
                self.state = DragState::Dropped {
                    from: source,
                    to: target,
                };
                if source == target {
                    return DragOutcome::Unchanged;
                }
                match move_pending(&self.tasks, source, target) {
                    Some(tasks) => {
                        debug!(from = source, to = target, "drag dropped");
                        self.tasks = tasks.clone();
                        DragOutcome::Reordered(tasks)
                    }
                    None => {
                        self.state = DragState::Cancelled;
                        DragOutcome::Cancelled
                    }
                }
            }
            DragState::Dragging { over: None, .. } => {
                self.state = DragState::Cancelled;
                DragOutcome::Cancelled
            }
            DragState::Idle | DragState::Dropped { .. } | DragState::Cancelled => {
                DragOutcome::Unchanged
            }
        }
    }
}

/// Drives a keyboard drag from `from` onto `to`, the way arrow keys would.
pub fn keyboard_move(tasks: Vec<Task>, from: usize, to: usize) -> Result<DragOutcome, DragError> {
    let mut drag = DragController::new(tasks);
    drag.key_start(from)?;
    match drag.tasks.get(to) {
        None => {
            drag.cancel();
            return Err(DragError::OutOfRange(to));
        }
        Some(task) if task.completed => {
            drag.cancel();
            return Err(DragError::NotDraggable(to));
        }
        Some(_) => {}
    }
    while let DragState::Dragging {
        over: Some(over), ..
    } = drag.state()
    {
        if over == to {
            break;
        }
        if over < to {
            drag.key_down();
        } else {
            drag.key_up();
        }
    }
    Ok(drag.release())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::task;

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn five() -> Vec<Task> {
        ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| task(id, &format!("Task {id}")))
            .collect()
    }

    #[test]
    fn array_move_preserves_relative_order() {
        let moved = array_move(&five(), 2, 0);
        assert_eq!(ids(&moved), vec!["c", "a", "b", "d", "e"]);

        let moved = array_move(&five(), 0, 4);
        assert_eq!(ids(&moved), vec!["b", "c", "d", "e", "a"]);

        let moved = array_move(&five(), 9, 0);
        assert_eq!(ids(&moved), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn completed_rows_stay_put() {
        let mut tasks = five();
        tasks[1].completed = true;
        let moved = move_pending(&tasks, 3, 0).expect("move");
        assert_eq!(ids(&moved), vec!["d", "b", "a", "c", "e"]);
        assert!(move_pending(&tasks, 1, 0).is_none());
        assert!(move_pending(&tasks, 0, 1).is_none());
    }

    #[test]
    fn pointer_needs_activation_distance() {
        let mut drag = DragController::new(five());
        drag.press(2, 0.0, 0.0).expect("press");
        drag.pointer_move(3.0, 4.0);
        assert!(matches!(drag.state(), DragState::Armed { .. }));
        assert_eq!(drag.release(), DragOutcome::Unchanged);
        assert_eq!(drag.state(), DragState::Idle);

        drag.press(2, 0.0, 0.0).expect("press");
        drag.pointer_move(0.0, 8.0);
        drag.hover(Some(0));
        match drag.release() {
            DragOutcome::Reordered(tasks) => {
                assert_eq!(ids(&tasks), vec!["c", "a", "b", "d", "e"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(drag.state(), DragState::Dropped { from: 2, to: 0 });
    }

    #[test]
    fn completed_rows_are_neither_sources_nor_targets() {
        let mut tasks = five();
        tasks[0].completed = true;
        let mut drag = DragController::new(tasks);
        assert_eq!(drag.press(0, 0.0, 0.0), Err(DragError::NotDraggable(0)));

        drag.key_start(3).expect("start");
        drag.hover(Some(0));
        assert_eq!(drag.release(), DragOutcome::Cancelled);
    }

    #[test]
    fn keyboard_skips_completed_and_escape_cancels() {
        let mut tasks = five();
        tasks[2].completed = true;
        let mut drag = DragController::new(tasks);
        drag.key_start(3).expect("start");
        assert_eq!(drag.key_start(1), Err(DragError::AlreadyActive));
        drag.key_up();
        assert_eq!(
            drag.state(),
            DragState::Dragging {
                source: 3,
                over: Some(1),
                input: DragInput::Keyboard
            }
        );
        assert_eq!(drag.cancel(), DragOutcome::Cancelled);
        assert_eq!(ids(drag.tasks()), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn keyboard_move_walks_to_the_target() {
        let mut tasks = five();
        tasks[1].completed = true;
        match keyboard_move(tasks.clone(), 4, 0).expect("move") {
            DragOutcome::Reordered(moved) => {
                assert_eq!(ids(&moved), vec!["e", "b", "a", "c", "d"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(keyboard_move(tasks.clone(), 4, 1), Err(DragError::NotDraggable(1)));
        assert_eq!(keyboard_move(tasks, 4, 7), Err(DragError::OutOfRange(7)));
    }

    #[test]
    fn drop_on_source_is_a_no_op() {
        let mut drag = DragController::new(five());
        drag.key_start(1).expect("start");
        assert_eq!(drag.release(), DragOutcome::Unchanged);
        assert_eq!(drag.state(), DragState::Dropped { from: 1, to: 1 });
    }
}
