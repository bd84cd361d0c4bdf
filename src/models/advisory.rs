//! Validated advisory recommendation.

use crate::models::task::{Priority, PriorityLevel, TaskStatus, WorkStatus};
use crate::{AppError, Result};

/// Target state recommended for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    /// Keep the task open with this priority and status.
    Active {
        /// Recommended priority.
        priority: Priority,
        /// Recommended status.
        status: WorkStatus,
    },
    /// Complete the task.
    Complete,
}

/// A recommendation that passed contract validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// Recommended target state.
    pub recommendation: Recommendation,
    /// Rationale recorded in the priority log.
    pub reason: String,
}

impl Advisory {
    /// Build an advisory from the wire projections.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Advisory` if the priority and status disagree
    /// about completion.
    pub fn from_levels(
        priority: PriorityLevel,
        status: TaskStatus,
        reason: impl Into<String>,
    ) -> Result<Self> {
        let recommendation = match (priority.working(), status.working()) {
            (Some(priority), Some(status)) => Recommendation::Active { priority, status },
            (None, None) => Recommendation::Complete,
            _ => {
                return Err(AppError::Advisory(format!(
                    "inconsistent recommendation: newPriority={} newStatus={}",
                    priority.as_str(),
                    status.as_str()
                )));
            }
        };
        Ok(Self {
            recommendation,
            reason: reason.into(),
        })
    }
}
