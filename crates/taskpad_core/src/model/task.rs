//! Task domain model.
//!
//! # Responsibility
//! - Define the single persisted record of the application.
//! - Normalize and validate user-entered title/description text.
//!
//! # Invariants
//! - `id` is allocated by the repository and never reused.
//! - `title` is trimmed and non-empty after creation.
//! - `created` is set once and never mutated.
//!
//! # See also
//! - crate::repo::task_repo

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Repository-allocated task identifier.
///
/// Kept as a type alias so persisted JSON stays a plain integer.
pub type TaskId = i64;

/// Canonical persisted task record.
///
/// Field names match the persisted `todos` JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Monotonic identifier, unique across the installation lifetime.
    pub id: TaskId,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Trimmed free-form description, may be empty.
    pub about: String,
    /// Unix epoch milliseconds at creation.
    pub created: i64,
    /// Absent in collections written before the flag existed.
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Builds a new open task from a validated draft.
    pub fn from_draft(id: TaskId, draft: TaskDraft, created: i64) -> Self {
        Self {
            id,
            title: draft.title,
            about: draft.about,
            created,
            completed: false,
        }
    }

    /// Validates invariants that must hold for every stored task.
    ///
    /// # Errors
    /// - `EmptyTitle` when `title` is blank.
    /// - `UntrimmedText` when `title` or `about` carry outer whitespace.
    /// - `IdOutOfRange` when `id < 0` or `id == TaskId::MAX`; the counter
    ///   must always be able to move past a stored id.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id < 0 || self.id == TaskId::MAX {
            return Err(TaskValidationError::IdOutOfRange(self.id));
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.title.trim() != self.title {
            return Err(TaskValidationError::UntrimmedText("title"));
        }
        if self.about.trim() != self.about {
            return Err(TaskValidationError::UntrimmedText("about"));
        }
        Ok(())
    }

    /// Returns whether the task still needs doing.
    pub fn is_open(&self) -> bool {
        !self.completed
    }
}

/// Normalized user input for create/update calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub about: String,
}

impl TaskDraft {
    /// Trims both fields and rejects an empty title.
    pub fn new(title: &str, about: &str) -> Result<Self, TaskValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(Self {
            title: title.to_string(),
            about: about.trim().to_string(),
        })
    }

    /// Returns whether this draft carries the same text as `task`.
    pub fn matches(&self, task: &Task) -> bool {
        self.title == task.title && self.about == task.about
    }
}

/// Validation failures for task input and stored task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    UntrimmedText(&'static str),
    IdOutOfRange(TaskId),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be empty"),
            Self::UntrimmedText(field) => {
                write!(f, "task {field} must not have leading or trailing whitespace")
            }
            Self::IdOutOfRange(id) => write!(f, "task id out of range: {id}"),
        }
    }
}

impl Error for TaskValidationError {}

#[cfg(test)]
mod tests {
    use super::{Task, TaskDraft, TaskValidationError};

    #[test]
    fn draft_trims_title_and_about() {
        let draft = TaskDraft::new("  Buy milk \n", "\t2% ").unwrap();
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.about, "2%");
    }

    #[test]
    fn draft_rejects_blank_title() {
        assert_eq!(
            TaskDraft::new("", "x").unwrap_err(),
            TaskValidationError::EmptyTitle
        );
        assert_eq!(
            TaskDraft::new("   ", "x").unwrap_err(),
            TaskValidationError::EmptyTitle
        );
    }

    #[test]
    fn from_draft_starts_open() {
        let draft = TaskDraft::new("Title", "").unwrap();
        let task = Task::from_draft(7, draft, 1_700_000_000_000);
        assert_eq!(task.id, 7);
        assert!(task.is_open());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn validate_rejects_untrimmed_about() {
        let task = Task {
            id: 1,
            title: "ok".to_string(),
            about: " padded".to_string(),
            created: 0,
            completed: false,
        };
        assert_eq!(
            task.validate().unwrap_err(),
            TaskValidationError::UntrimmedText("about")
        );
    }

    #[test]
    fn validate_rejects_negative_and_max_ids() {
        for id in [-1, i64::MAX] {
            let task = Task {
                id,
                title: "ok".to_string(),
                about: String::new(),
                created: 0,
                completed: false,
            };
            assert_eq!(
                task.validate().unwrap_err(),
                TaskValidationError::IdOutOfRange(id)
            );
        }
    }

    #[test]
    fn missing_completed_field_defaults_to_false() {
        let task: Task =
            serde_json::from_str(r#"{"id":3,"title":"old","about":"","created":42}"#).unwrap();
        assert!(!task.completed);
        assert_eq!(task.created, 42);
    }
}
