//! Free-text task drafting contract.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::models::task::{NewTask, Priority};
use crate::{AppError, Result};

use super::contract::extract_json;

/// Title used when the model does not produce one.
pub const UNTITLED_TASK: &str = "Untitled Task";

/// Raw task draft produced by the model.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Proposed title.
    #[serde(default)]
    pub title: Option<String>,
    /// Proposed description.
    #[serde(default)]
    pub description: Option<String>,
    /// Proposed due date, ISO 8601.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Proposed reminder, ISO 8601.
    #[serde(default)]
    pub reminder_time: Option<String>,
    /// Proposed priority.
    #[serde(default)]
    pub priority: Option<String>,
}

impl TaskDraft {
    /// Validate the draft into task creation input.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Advisory` if the due date is missing or any field
    /// is malformed, and `AppError::Validation` if the due date is not in
    /// the future.
    pub fn into_new_task(self, now: DateTime<Utc>) -> Result<NewTask> {
        let title = self
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_TASK.to_owned());

        let due_date = self
            .due_date
            .as_deref()
            .and_then(parse_draft_time)
            .ok_or_else(|| AppError::Advisory("invalid dueDate format".into()))?;
        if due_date <= now {
            return Err(AppError::Validation("dueDate cannot be in the past".into()));
        }

        let reminder_time = match self.reminder_time.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(
                parse_draft_time(raw)
                    .ok_or_else(|| AppError::Advisory("invalid reminderTime format".into()))?,
            ),
            _ => None,
        };

        let priority = match self.priority.as_deref() {
            Some(raw) => Some(
                Priority::parse(raw)
                    .ok_or_else(|| AppError::Advisory(format!("invalid priority {raw:?}")))?,
            ),
            None => None,
        };

        Ok(NewTask {
            title,
            description: self.description,
            priority,
            status: None,
            due_date: Some(due_date),
            reminder_time,
        })
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less one taken as UTC.
#[must_use]
pub fn parse_draft_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse a raw drafting response.
///
/// # Errors
///
/// Returns `AppError::Advisory` if no draft object can be extracted.
pub fn parse_draft(text: &str) -> Result<TaskDraft> {
    extract_json(text)
}

/// Turns a natural-language command into a task draft.
pub trait TaskDrafter: Send + Sync {
    /// Draft a task from `command`, resolving relative dates against
    /// `reference_time`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Advisory` if the model cannot be reached or
    /// returns no usable draft.
    fn draft(
        &self,
        command: String,
        reference_time: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<TaskDraft>> + Send + '_>>;
}
