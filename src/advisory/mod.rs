//! External language-model capabilities.
//!
//! The [`AdvisoryClient`] trait hides the model behind a narrow contract:
//! given a snapshot of one task it returns a validated [`Advisory`], or an
//! `AppError::Advisory` when the response violates the contract. The
//! [`drafter::TaskDrafter`] trait does the same for free-text task creation.
//! [`gemini::GeminiClient`] implements both over HTTP.

pub mod contract;
pub mod drafter;
pub mod gemini;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::models::advisory::Advisory;
use crate::models::task::{PriorityLevel, Task, TaskStatus};
use crate::Result;

/// Snapshot of a task sent to the advisory model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryRequest {
    /// Task being evaluated.
    pub task_id: String,
    /// Task title.
    pub title: String,
    /// Task description, if any.
    pub description: Option<String>,
    /// Current priority.
    pub priority: PriorityLevel,
    /// Current status.
    pub status: TaskStatus,
    /// Due date.
    pub due_date: DateTime<Utc>,
    /// Instant the recommendation is evaluated against.
    pub reference_time: DateTime<Utc>,
}

impl AdvisoryRequest {
    /// Capture the fields of `task` the model needs.
    #[must_use]
    pub fn from_task(task: &Task, reference_time: DateTime<Utc>) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority(),
            status: task.status(),
            due_date: task.due_date,
            reference_time,
        }
    }
}

/// Opaque classifier recommending a priority and status for a task.
pub trait AdvisoryClient: Send + Sync {
    /// Evaluate one task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Advisory` if the model cannot be reached or its
    /// response does not satisfy the recommendation contract.
    fn evaluate(
        &self,
        request: AdvisoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Advisory>> + Send + '_>>;
}
