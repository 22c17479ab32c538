//! # Completion Notifications
//!
//! Hooks fired after a task reaches `COMPLETED`. They run once the ledger
//! lock has been released, so a slow hook never blocks other operators.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use posfleet_core::TaskId;
use posfleet_state::TaskKind;

/// Payload delivered to every hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub client_name: String,
}

/// Receiver of completion events.
pub trait CompletionHook: Send + Sync {
    fn on_completed(&self, event: &TaskCompleted);
}

/// Writes each completion to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl CompletionHook for TracingHook {
    fn on_completed(&self, event: &TaskCompleted) {
        tracing::info!(
            task_id = %event.task_id,
            kind = %event.kind,
            client = %event.client_name,
            "task completed"
        );
    }
}

/// Fans completions out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastHook {
    sender: broadcast::Sender<TaskCompleted>,
}

impl BroadcastHook {
    /// Create a hook with a channel of the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskCompleted> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastHook {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CompletionHook for BroadcastHook {
    fn on_completed(&self, event: &TaskCompleted) {
        // No subscribers is not an error.
        let _ = self.sender.send(event.clone());
    }
}
