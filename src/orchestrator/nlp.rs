//! Natural-language task creation.
//!
//! A command is drafted by the model, validated, and created through the
//! regular creation path. The created task is cached per user and command
//! for an hour, so repeating a command returns the same task instead of
//! creating a duplicate. Identical commands in flight at the same time are
//! serialized per user and command, so the later one reads the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::advisory::drafter::TaskDrafter;
use crate::models::task::Task;
use crate::{AppError, Result};

use super::task_service::TaskService;

/// How long a created task is served from the cache.
pub const CACHE_TTL_MINUTES: i64 = 60;

struct CachedTask {
    created_at: DateTime<Utc>,
    task: Task,
}

type CommandKey = (String, String);
type Gates = Mutex<HashMap<CommandKey, Arc<tokio::sync::Mutex<()>>>>;

/// Shared per-command gate; prunes its map entry when the last holder leaves.
struct CommandGate<'a> {
    gates: &'a Gates,
    key: CommandKey,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> CommandGate<'a> {
    fn join(gates: &'a Gates, key: &CommandKey) -> Self {
        let gate = gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        Self {
            gates,
            key: key.clone(),
            gate,
        }
    }
}

impl Drop for CommandGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&self.gate) <= 2 {
            gates.remove(&self.key);
        }
    }
}

/// Drafts and creates tasks from free-text commands.
pub struct NlpTaskService {
    tasks: TaskService,
    drafter: Arc<dyn TaskDrafter>,
    timeout: Duration,
    cache: Mutex<HashMap<CommandKey, CachedTask>>,
    in_flight: Gates,
}

impl NlpTaskService {
    /// Create a service bounding each drafting call by `timeout`.
    #[must_use]
    pub fn new(tasks: TaskService, drafter: Arc<dyn TaskDrafter>, timeout: Duration) -> Self {
        Self {
            tasks,
            drafter,
            timeout,
            cache: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create a task for `user_id` from `command`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an empty command or a draft that
    /// fails task validation, `AppError::Advisory` if the model times out
    /// or breaks the draft contract, or `AppError::Db` if the insert fails.
    pub async fn create_from_command(
        &self,
        user_id: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let command = command.trim();
        if command.is_empty() {
            return Err(AppError::Validation("command is required".into()));
        }
        let key = (user_id.to_owned(), command.to_owned());

        let gate = CommandGate::join(&self.in_flight, &key);
        let _held = gate.gate.lock().await;

        if let Some(task) = self.cached(&key, now) {
            debug!(user_id, task_id = %task.id, "command served from cache");
            return Ok(task);
        }

        let draft = tokio::time::timeout(self.timeout, self.drafter.draft(command.to_owned(), now))
            .await
            .map_err(|_| AppError::Advisory("model inference timeout".into()))??;
        let input = draft.into_new_task(now)?;
        let task = self.tasks.create(user_id, input, now).await?;
        info!(user_id, task_id = %task.id, "task created from command");

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.retain(|_, entry| !expired(entry, now));
        cache.insert(
            key,
            CachedTask {
                created_at: now,
                task: task.clone(),
            },
        );
        Ok(task)
    }

    fn cached(&self, key: &CommandKey, now: DateTime<Utc>) -> Option<Task> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(key)
            .filter(|entry| !expired(entry, now))
            .map(|entry| entry.task.clone())
    }
}

fn expired(entry: &CachedTask, now: DateTime<Utc>) -> bool {
    now - entry.created_at >= chrono::Duration::minutes(CACHE_TTL_MINUTES)
}
