//! Task model and the priority/status state machine.
//!
//! The lifecycle is a tagged union: a task is either [`TaskState::Active`]
//! with a working priority and progress status, or [`TaskState::Completed`]
//! remembering the priority it had before completion. The three persisted
//! fields (`priority`, `status`, `completed`) are projections of this state
//! and therefore can never disagree.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::advisory::{Advisory, Recommendation};
use crate::{AppError, Result};

/// Offset used to derive a reminder when none is requested.
pub const DEFAULT_REMINDER_OFFSET_HOURS: i64 = 24;

/// Log reason recorded by [`Task::mark_complete`].
pub const REASON_MARKED_COMPLETE: &str = "marked complete";

/// Log reason recorded by [`Task::mark_incomplete`].
pub const REASON_MARKED_INCOMPLETE: &str = "marked incomplete";

/// Log reason recorded when the overdue override replaces a recommendation.
pub const REASON_PAST_DUE: &str = "due date has passed";

/// Working priority of an active task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Can wait.
    Low,
    /// Default priority.
    Medium,
    /// Needs attention first.
    High,
}

/// Progress of a task that is not completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkStatus {
    /// Not started.
    Pending,
    /// Started but not finished.
    #[serde(rename = "In-progress")]
    InProgress,
}

/// Priority as exposed on the wire and recorded in priority logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PriorityLevel {
    /// See [`Priority::Low`].
    Low,
    /// See [`Priority::Medium`].
    Medium,
    /// See [`Priority::High`].
    High,
    /// The task is completed.
    Completed,
}

/// Status as exposed on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// See [`WorkStatus::Pending`].
    Pending,
    /// See [`WorkStatus::InProgress`].
    #[serde(rename = "In-progress")]
    InProgress,
    /// The task is completed.
    Completed,
}

impl From<Priority> for PriorityLevel {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Low => Self::Low,
            Priority::Medium => Self::Medium,
            Priority::High => Self::High,
        }
    }
}

impl From<WorkStatus> for TaskStatus {
    fn from(value: WorkStatus) -> Self {
        match value {
            WorkStatus::Pending => Self::Pending,
            WorkStatus::InProgress => Self::InProgress,
        }
    }
}

impl Priority {
    /// Canonical spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        PriorityLevel::from(self).as_str()
    }

    /// Parse a working priority, case-insensitively.
    ///
    /// Returns `None` for `Completed` and unknown values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        PriorityLevel::parse(raw)?.working()
    }

    /// Sort rank, higher is more urgent.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl PriorityLevel {
    /// Canonical spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Completed => "Completed",
        }
    }

    /// Parse any casing of the canonical spelling.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// The working priority, or `None` for `Completed`.
    #[must_use]
    pub fn working(self) -> Option<Priority> {
        match self {
            Self::Low => Some(Priority::Low),
            Self::Medium => Some(Priority::Medium),
            Self::High => Some(Priority::High),
            Self::Completed => None,
        }
    }
}

impl TaskStatus {
    /// Canonical spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In-progress",
            Self::Completed => "Completed",
        }
    }

    /// Parse any casing of the canonical spelling.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// The progress status, or `None` for `Completed`.
    #[must_use]
    pub fn working(self) -> Option<WorkStatus> {
        match self {
            Self::Pending => Some(WorkStatus::Pending),
            Self::InProgress => Some(WorkStatus::InProgress),
            Self::Completed => None,
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Open task.
    Active {
        /// Current working priority.
        priority: Priority,
        /// Current progress.
        status: WorkStatus,
    },
    /// Completed task.
    Completed {
        /// Priority held right before completion.
        previous_priority: Option<Priority>,
    },
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Active {
            priority: Priority::Medium,
            status: WorkStatus::Pending,
        }
    }
}

impl TaskState {
    /// Priority projection.
    #[must_use]
    pub fn priority(&self) -> PriorityLevel {
        match self {
            Self::Active { priority, .. } => (*priority).into(),
            Self::Completed { .. } => PriorityLevel::Completed,
        }
    }

    /// Status projection.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Active { status, .. } => (*status).into(),
            Self::Completed { .. } => TaskStatus::Completed,
        }
    }

    /// Completion projection.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Priority saved at completion time, if any.
    #[must_use]
    pub fn previous_priority(&self) -> Option<Priority> {
        match self {
            Self::Active { .. } => None,
            Self::Completed { previous_priority } => *previous_priority,
        }
    }

    /// Rebuild the state from its persisted projections.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the projections disagree with each other.
    pub fn from_parts(
        priority: PriorityLevel,
        status: TaskStatus,
        completed: bool,
        previous_priority: Option<Priority>,
    ) -> Result<Self> {
        match (priority.working(), status.working(), completed) {
            (Some(priority), Some(status), false) => Ok(Self::Active { priority, status }),
            (None, None, true) => Ok(Self::Completed { previous_priority }),
            _ => Err(AppError::Db(format!(
                "inconsistent task state: priority={} status={} completed={completed}",
                priority.as_str(),
                status.as_str()
            ))),
        }
    }
}

/// Immutable audit record of one priority change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriorityLogEntry {
    /// Priority before the change.
    pub old_priority: PriorityLevel,
    /// Priority after the change.
    pub new_priority: PriorityLevel,
    /// Human-readable rationale.
    pub reason: String,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

/// Which parts of a task an advisory changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvisoryOutcome {
    /// Priority changed (and was logged).
    pub priority_changed: bool,
    /// Status changed.
    pub status_changed: bool,
}

impl AdvisoryOutcome {
    /// Whether anything changed.
    #[must_use]
    pub fn changed(self) -> bool {
        self.priority_changed || self.status_changed
    }
}

/// Input for task creation, validated by [`Task::new`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Required title.
    #[serde(default)]
    pub title: String,
    /// Optional free text.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial priority; defaults to `Medium`.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Initial status; defaults to `Pending`.
    #[serde(default)]
    pub status: Option<WorkStatus>,
    /// Required due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Optional explicit reminder.
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
}

/// Partial update, applied by [`Task::apply_patch`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description; an empty string clears it.
    #[serde(default)]
    pub description: Option<String>,
    /// New working priority.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// New progress status.
    #[serde(default)]
    pub status: Option<WorkStatus>,
    /// Completion toggle, routed through the state machine.
    #[serde(default)]
    pub completed: Option<bool>,
    /// New due date.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// New reminder time.
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
}

/// Persisted task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique record identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lifecycle state.
    pub state: TaskState,
    /// Due date.
    pub due_date: DateTime<Utc>,
    /// When the reminder should fire.
    pub reminder_time: Option<DateTime<Utc>>,
    /// Whether the reminder for `reminder_time` was delivered.
    pub notification_sent: bool,
    /// Whether an advisory ever changed this task.
    pub retouched_by_ai: bool,
    pub(crate) priority_logs: Vec<PriorityLogEntry>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl Task {
    /// Validate `input` and construct a new active task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the title is blank, the due date is
    /// missing or not in the future, or the reminder does not precede it.
    pub fn new(user_id: &str, input: NewTask, now: DateTime<Utc>) -> Result<Self> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }
        let due_date = input
            .due_date
            .ok_or_else(|| AppError::Validation("dueDate is required".into()))?;
        if due_date <= now {
            return Err(AppError::Validation("dueDate cannot be in the past".into()));
        }
        let reminder_time = schedule_reminder(due_date, input.reminder_time, now)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            description: normalize_description(input.description),
            state: TaskState::Active {
                priority: input.priority.unwrap_or(Priority::Medium),
                status: input.status.unwrap_or(WorkStatus::Pending),
            },
            due_date,
            reminder_time: Some(reminder_time),
            notification_sent: false,
            retouched_by_ai: false,
            priority_logs: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Append-only audit trail of priority changes.
    #[must_use]
    pub fn priority_logs(&self) -> &[PriorityLogEntry] {
        &self.priority_logs
    }

    /// Priority projection.
    #[must_use]
    pub fn priority(&self) -> PriorityLevel {
        self.state.priority()
    }

    /// Status projection.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// Completion projection.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Change the working priority of an active task.
    ///
    /// Returns `Ok(false)` when `new_priority` equals the current one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a completed task; completion is
    /// only left through [`mark_incomplete`](Self::mark_incomplete).
    pub fn set_priority(
        &mut self,
        new_priority: Priority,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let TaskState::Active { priority, status } = self.state else {
            return Err(AppError::Validation(
                "cannot change the priority of a completed task".into(),
            ));
        };
        if priority == new_priority {
            return Ok(false);
        }
        self.append_log(priority.into(), new_priority.into(), reason, now);
        self.state = TaskState::Active {
            priority: new_priority,
            status,
        };
        self.updated_at = now;
        Ok(true)
    }

    /// Complete the task, remembering its priority. Idempotent.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) -> bool {
        self.complete_with(REASON_MARKED_COMPLETE, now)
    }

    /// Reopen a completed task, restoring its previous priority
    /// (`Medium` when none was saved). Idempotent.
    pub fn mark_incomplete(&mut self, now: DateTime<Utc>) -> bool {
        let TaskState::Completed { previous_priority } = self.state else {
            return false;
        };
        let restored = previous_priority.unwrap_or(Priority::Medium);
        self.append_log(
            PriorityLevel::Completed,
            restored.into(),
            REASON_MARKED_INCOMPLETE,
            now,
        );
        self.state = TaskState::Active {
            priority: restored,
            status: WorkStatus::Pending,
        };
        self.updated_at = now;
        true
    }

    /// Apply an external recommendation evaluated at `reference_time`.
    ///
    /// Only differing fields change. A priority change appends exactly one
    /// log entry; status-only changes are not logged. Overdue tasks are
    /// forced to `High`/`Pending` whatever the recommendation says.
    /// Completed tasks are left untouched.
    pub fn apply_advisory(
        &mut self,
        advisory: &Advisory,
        reference_time: DateTime<Utc>,
    ) -> AdvisoryOutcome {
        let TaskState::Active { priority, status } = self.state else {
            return AdvisoryOutcome::default();
        };

        let overdue = Recommendation::Active {
            priority: Priority::High,
            status: WorkStatus::Pending,
        };
        let (target, reason) = if self.due_date < reference_time {
            let reason = if advisory.recommendation == overdue {
                advisory.reason.as_str()
            } else {
                REASON_PAST_DUE
            };
            (overdue, reason)
        } else {
            (advisory.recommendation, advisory.reason.as_str())
        };

        let mut outcome = AdvisoryOutcome::default();
        match target {
            Recommendation::Complete => {
                let changed = self.complete_with(reason, reference_time);
                outcome.priority_changed = changed;
                outcome.status_changed = changed;
            }
            Recommendation::Active {
                priority: new_priority,
                status: new_status,
            } => {
                if new_priority != priority {
                    self.append_log(priority.into(), new_priority.into(), reason, reference_time);
                    outcome.priority_changed = true;
                }
                outcome.status_changed = new_status != status;
                self.state = TaskState::Active {
                    priority: new_priority,
                    status: new_status,
                };
            }
        }

        if outcome.changed() {
            self.retouched_by_ai = true;
            self.updated_at = reference_time;
        }
        outcome
    }

    /// Apply a user edit. Priority and completion changes go through the
    /// state machine; a changed due date or reminder schedules a new
    /// reminder and re-arms delivery.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank title, a past due date,
    /// a reminder not preceding the due date, or a priority/status change
    /// on a task that stays completed.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> Result<bool> {
        let before = self.clone();

        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::Validation("title must not be empty".into()));
            }
            title.clone_into(&mut self.title);
        }
        if let Some(description) = patch.description {
            self.description = normalize_description(Some(description));
        }

        if patch.completed == Some(false) {
            self.mark_incomplete(now);
        }
        if let Some(priority) = patch.priority {
            self.set_priority(priority, "updated by user", now)?;
        }
        if let Some(new_status) = patch.status {
            match &mut self.state {
                TaskState::Active { status, .. } => *status = new_status,
                TaskState::Completed { .. } => {
                    return Err(AppError::Validation(
                        "cannot change the status of a completed task".into(),
                    ));
                }
            }
        }
        if patch.completed == Some(true) {
            self.mark_complete(now);
        }

        let due_changed = patch.due_date.is_some_and(|due| due != self.due_date);
        let reminder_changed = patch
            .reminder_time
            .is_some_and(|reminder| Some(reminder) != self.reminder_time);
        if due_changed || reminder_changed {
            let due_date = patch.due_date.unwrap_or(self.due_date);
            if due_changed && due_date <= now {
                return Err(AppError::Validation("dueDate cannot be in the past".into()));
            }
            // A new due date without an explicit reminder re-derives it.
            self.reminder_time = Some(schedule_reminder(due_date, patch.reminder_time, now)?);
            self.due_date = due_date;
            self.notification_sent = false;
        }

        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        Ok(changed)
    }

    fn complete_with(&mut self, reason: &str, now: DateTime<Utc>) -> bool {
        let TaskState::Active { priority, .. } = self.state else {
            return false;
        };
        self.append_log(priority.into(), PriorityLevel::Completed, reason, now);
        self.state = TaskState::Completed {
            previous_priority: Some(priority),
        };
        self.updated_at = now;
        true
    }

    fn append_log(
        &mut self,
        old_priority: PriorityLevel,
        new_priority: PriorityLevel,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        // Keep timestamps non-decreasing even if the caller's clock is behind.
        let timestamp = self
            .priority_logs
            .last()
            .map_or(now, |last| last.timestamp.max(now));
        self.priority_logs.push(PriorityLogEntry {
            old_priority,
            new_priority,
            reason: reason.to_owned(),
            timestamp,
        });
    }
}

/// Resolve the reminder for `due_date`.
///
/// Without a request the reminder is `due_date - 24h`. Reminders already
/// in the past are clamped to `now` so the next scan picks them up.
///
/// # Errors
///
/// Returns `AppError::Validation` if the resolved reminder does not
/// precede `due_date`.
pub fn schedule_reminder(
    due_date: DateTime<Utc>,
    requested: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let reminder = match requested {
        Some(reminder) if reminder >= due_date => {
            return Err(AppError::Validation(
                "reminderTime must precede dueDate".into(),
            ));
        }
        Some(reminder) => reminder,
        None => due_date - Duration::hours(DEFAULT_REMINDER_OFFSET_HOURS),
    };
    let reminder = reminder.max(now);
    if reminder >= due_date {
        return Err(AppError::Validation(
            "reminderTime must precede dueDate".into(),
        ));
    }
    Ok(reminder)
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty())
}

/// JSON document shape of a task, compatible with previously stored data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Record identifier.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Priority projection.
    pub priority: PriorityLevel,
    /// Priority saved at completion.
    pub previous_priority: Option<Priority>,
    /// Status projection.
    pub status: TaskStatus,
    /// Completion projection.
    pub completed: bool,
    /// Due date.
    pub due_date: DateTime<Utc>,
    /// Reminder time.
    pub reminder_time: Option<DateTime<Utc>>,
    /// Reminder delivered flag.
    pub notification_sent: bool,
    /// Advisory touched flag.
    #[serde(rename = "retouchedByAI")]
    pub retouched_by_ai: bool,
    /// Priority audit trail.
    pub priority_logs: Vec<PriorityLogEntry>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            user_id: task.user_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority(),
            previous_priority: task.state.previous_priority(),
            status: task.status(),
            completed: task.is_completed(),
            due_date: task.due_date,
            reminder_time: task.reminder_time,
            notification_sent: task.notification_sent,
            retouched_by_ai: task.retouched_by_ai,
            priority_logs: task.priority_logs.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
