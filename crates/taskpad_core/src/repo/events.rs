//! Change notifications emitted by the task repository.
//!
//! # Responsibility
//! - Describe what changed after each applied mutation.
//! - Define the observer contract the presentation layer registers with.
//!
//! # Invariants
//! - Notifications are delivered synchronously, after the in-memory change
//!   and its persistence attempt, in subscription order.
//! - Listeners must not call back into the repository; they record that a
//!   re-read is needed and the UI calls `list()` afterwards.

use crate::model::task::TaskId;
use std::fmt::{Display, Formatter};

/// One applied repository mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskChange {
    /// State was (re)loaded from the durable store.
    Loaded { count: usize },
    Created(TaskId),
    Updated(TaskId),
    Deleted(TaskId),
    Toggled { id: TaskId, completed: bool },
}

impl TaskChange {
    /// Task affected by this change, if it targets a single task.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Loaded { .. } => None,
            Self::Created(id) | Self::Updated(id) | Self::Deleted(id) => Some(*id),
            Self::Toggled { id, .. } => Some(*id),
        }
    }

    /// Stable event name used in log records.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "repo_load",
            Self::Created(_) => "task_create",
            Self::Updated(_) => "task_update",
            Self::Deleted(_) => "task_delete",
            Self::Toggled { .. } => "task_toggle",
        }
    }
}

/// Observer registered through `TaskRepository::subscribe`.
pub trait TaskListener: Send + Sync {
    fn on_change(&self, change: &TaskChange);
}

impl<F> TaskListener for F
where
    F: Fn(&TaskChange) + Send + Sync,
{
    fn on_change(&self, change: &TaskChange) {
        self(change)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
