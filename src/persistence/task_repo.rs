//! Task repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::models::task::{Priority, PriorityLevel, PriorityLogEntry, Task, TaskState, TaskStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_ts, encode_ts};

/// Orders open tasks by urgency, completed ones last.
const PRIORITY_RANK: &str = "CASE priority \
     WHEN 'High' THEN 3 WHEN 'Medium' THEN 2 WHEN 'Low' THEN 1 ELSE 0 END";

/// Repository wrapper around `SQLite` for task records.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    priority: String,
    previous_priority: Option<String>,
    status: String,
    completed: i64,
    due_date: String,
    reminder_time: Option<String>,
    notification_sent: i64,
    retouched_by_ai: i64,
    priority_logs: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TaskRow {
    /// Convert a database row into the domain model.
    fn into_task(self) -> Result<Task> {
        let priority = PriorityLevel::parse(&self.priority)
            .ok_or_else(|| AppError::Db(format!("invalid priority: {}", self.priority)))?;
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid status: {}", self.status)))?;
        let previous_priority = self
            .previous_priority
            .as_deref()
            .map(|raw| {
                Priority::parse(raw)
                    .ok_or_else(|| AppError::Db(format!("invalid previous_priority: {raw}")))
            })
            .transpose()?;
        let state =
            TaskState::from_parts(priority, status, self.completed != 0, previous_priority)?;
        let priority_logs: Vec<PriorityLogEntry> = serde_json::from_str(&self.priority_logs)
            .map_err(|e| AppError::Db(format!("invalid priority_logs: {e}")))?;
        let reminder_time = self
            .reminder_time
            .as_deref()
            .map(|raw| decode_ts("reminder_time", raw))
            .transpose()?;

        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            state,
            due_date: decode_ts("due_date", &self.due_date)?,
            reminder_time,
            notification_sent: self.notification_sent != 0,
            retouched_by_ai: self.retouched_by_ai != 0,
            priority_logs,
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            version: self.version,
        })
    }
}

fn encode_logs(task: &Task) -> Result<String> {
    serde_json::to_string(task.priority_logs())
        .map_err(|e| AppError::Db(format!("serialize priority_logs: {e}")))
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new task record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, task: &Task) -> Result<Task> {
        let priority_logs = encode_logs(task)?;

        sqlx::query(
            "INSERT INTO task (id, user_id, title, description, priority, previous_priority,
             status, completed, due_date, reminder_time, notification_sent, retouched_by_ai,
             priority_logs, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority().as_str())
        .bind(task.state.previous_priority().map(Priority::as_str))
        .bind(task.status().as_str())
        .bind(i64::from(task.is_completed()))
        .bind(encode_ts(task.due_date))
        .bind(task.reminder_time.map(encode_ts))
        .bind(i64::from(task.notification_sent))
        .bind(i64::from(task.retouched_by_ai))
        .bind(&priority_logs)
        .bind(encode_ts(task.created_at))
        .bind(encode_ts(task.updated_at))
        .bind(task.version)
        .execute(self.db.as_ref())
        .await?;

        Ok(task.clone())
    }

    /// Retrieve a task by identifier.
    ///
    /// Returns `Ok(None)` if the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM task WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// List all tasks of a user, most urgent first, then by due date.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT * FROM task WHERE user_id = ?1 \
             ORDER BY {PRIORITY_RANK} DESC, due_date ASC"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&query)
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// List the open tasks of a user, oldest due date first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_incomplete_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM task WHERE user_id = ?1 AND completed = 0 ORDER BY due_date ASC",
        )
        .bind(user_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Open, not yet notified tasks whose reminder lies in
    /// `[now - lookahead, now + lookahead)`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
        lookahead: Duration,
    ) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM task \
             WHERE completed = 0 AND notification_sent = 0 \
               AND reminder_time IS NOT NULL \
               AND reminder_time >= ?1 AND reminder_time < ?2 \
             ORDER BY reminder_time ASC",
        )
        .bind(encode_ts(now - lookahead))
        .bind(encode_ts(now + lookahead))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Write back a modified task if nobody else wrote it since it was read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if the stored version moved on,
    /// `AppError::NotFound` if the task was deleted, or `AppError::Db`
    /// if the update fails.
    pub async fn update(&self, task: &Task) -> Result<Task> {
        let priority_logs = encode_logs(task)?;

        let result = sqlx::query(
            "UPDATE task SET title = ?1, description = ?2, priority = ?3,
             previous_priority = ?4, status = ?5, completed = ?6, due_date = ?7,
             reminder_time = ?8, notification_sent = ?9, retouched_by_ai = ?10,
             priority_logs = ?11, updated_at = ?12, version = version + 1
             WHERE id = ?13 AND version = ?14",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority().as_str())
        .bind(task.state.previous_priority().map(Priority::as_str))
        .bind(task.status().as_str())
        .bind(i64::from(task.is_completed()))
        .bind(encode_ts(task.due_date))
        .bind(task.reminder_time.map(encode_ts))
        .bind(i64::from(task.notification_sent))
        .bind(i64::from(task.retouched_by_ai))
        .bind(&priority_logs)
        .bind(encode_ts(task.updated_at))
        .bind(&task.id)
        .bind(task.version)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(&task.id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "task {} was modified concurrently",
                    task.id
                ))),
                None => Err(AppError::NotFound("task not found".into())),
            };
        }

        let mut stored = task.clone();
        stored.version += 1;
        Ok(stored)
    }

    /// Read-modify-write a task.
    ///
    /// `apply` mutates the freshly read task and reports whether it changed
    /// anything; unchanged tasks are not written. A version conflict
    /// re-reads and re-applies once before surfacing the error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the task does not exist, any error
    /// produced by `apply`, `AppError::Conflict` after a second lost race,
    /// or `AppError::Db` on persistence failure.
    pub async fn modify<F>(&self, id: &str, mut apply: F) -> Result<Task>
    where
        F: FnMut(&mut Task) -> Result<bool> + Send,
    {
        let mut retried = false;
        loop {
            let mut task = self
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound("task not found".into()))?;
            if !apply(&mut task)? {
                return Ok(task);
            }
            match self.update(&task).await {
                Err(AppError::Conflict(msg)) if !retried => {
                    warn!(task_id = id, %msg, "write conflict, retrying once");
                    retried = true;
                }
                other => return other,
            }
        }
    }

    /// Record that the reminder scheduled for `reminder_time` was delivered.
    ///
    /// Returns `false` when the reminder was rescheduled (or already
    /// marked) in the meantime, in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_notification_sent(
        &self,
        id: &str,
        reminder_time: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE task SET notification_sent = 1, version = version + 1 \
             WHERE id = ?1 AND reminder_time = ?2 AND notification_sent = 0",
        )
        .bind(id)
        .bind(encode_ts(reminder_time))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Hard-delete a task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such task belongs to the user,
    /// or `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM task WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("task not found".into()));
        }
        Ok(())
    }
}
