use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::task::Task;

/// Observer for a task moving from pending to completed.
pub trait CompletionHook: Send + Sync {
    fn on_completed(&self, task: &Task);
}

impl<F> CompletionHook for F
where
    F: Fn(&Task) + Send + Sync,
{
    fn on_completed(&self, task: &Task) {
        self(task)
    }
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<RwLock<Vec<Arc<dyn CompletionHook>>>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}

impl HookRegistry {
    pub fn register(&self, hook: Arc<dyn CompletionHook>) {
        self.hooks.write().push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Runs every hook when `before` was pending and `after` is completed.
    pub fn fire_if_completed(&self, before: bool, after: &Task) {
        if before || !after.completed {
            return;
        }
        let hooks = self.hooks.read().clone();
        debug!(id = %after.id, count = hooks.len(), "running completion hooks");
        for hook in hooks {
            hook.on_completed(after);
        }
    }
}
