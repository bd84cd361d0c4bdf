//! User-facing task operations.
//!
//! Every operation is scoped to the calling user: tasks owned by someone
//! else are reported as not found.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::task::{NewTask, Task, TaskPatch};
use crate::persistence::task_repo::TaskRepo;
use crate::{AppError, Result};

/// Task CRUD and completion toggles on top of [`TaskRepo`].
#[derive(Clone)]
pub struct TaskService {
    tasks: TaskRepo,
}

fn ensure_owner(task: &Task, user_id: &str) -> Result<()> {
    if task.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::NotFound("task not found".into()))
    }
}

impl TaskService {
    /// Create a new service instance.
    #[must_use]
    pub fn new(tasks: TaskRepo) -> Self {
        Self { tasks }
    }

    /// Validate and store a new task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for invalid input, or `AppError::Db`
    /// if the insert fails.
    pub async fn create(&self, user_id: &str, input: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let task = Task::new(user_id, input, now)?;
        let task = self.tasks.create(&task).await?;
        info!(task_id = %task.id, user_id, "task created");
        Ok(task)
    }

    /// All tasks of `user_id`, most urgent first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Task>> {
        self.tasks.list_for_user(user_id).await
    }

    /// One task of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the task does not exist or belongs
    /// to another user.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Task> {
        let task = self
            .tasks
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("task not found".into()))?;
        ensure_owner(&task, user_id)?;
        Ok(task)
    }

    /// Apply a partial edit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown or foreign tasks,
    /// `AppError::Validation` for an invalid edit, or `AppError::Conflict`
    /// if concurrent writers kept winning.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        self.tasks
            .modify(id, |task| {
                ensure_owner(task, user_id)?;
                task.apply_patch(patch.clone(), now)
            })
            .await
    }

    /// Mark a task complete.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown or foreign tasks.
    pub async fn complete(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> Result<Task> {
        self.tasks
            .modify(id, |task| {
                ensure_owner(task, user_id)?;
                Ok(task.mark_complete(now))
            })
            .await
    }

    /// Reopen a completed task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown or foreign tasks.
    pub async fn incomplete(&self, user_id: &str, id: &str, now: DateTime<Utc>) -> Result<Task> {
        self.tasks
            .modify(id, |task| {
                ensure_owner(task, user_id)?;
                Ok(task.mark_incomplete(now))
            })
            .await
    }

    /// Hard-delete a task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown or foreign tasks.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        self.tasks.delete(id, user_id).await?;
        info!(task_id = id, user_id, "task deleted");
        Ok(())
    }
}
