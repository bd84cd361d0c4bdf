//! Per-user twice-daily re-prioritization triggers.
//!
//! The scheduler owns a map of user id to [`TriggerPair`]. Each trigger is
//! a task sleeping until its time of day (UTC) and then running one
//! analysis pass. Dropping a trigger cancels its task.
//!
//! Triggers live in process memory only. After a restart, users whose
//! persisted schedule is enabled get no automatic runs until they toggle
//! the schedule again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::models::user::{format_hhmm, AnalysisSchedule};
use crate::persistence::user_repo::UserRepo;
use crate::{AppError, Result};

use super::analysis::TaskAnalyzer;

/// Time until the next occurrence of `at` strictly after `now`.
#[must_use]
pub fn until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

/// One recurring daily run for one user.
pub struct DailyTrigger {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Drop for DailyTrigger {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DailyTrigger {
    /// Spawn a trigger firing every day at `at`.
    ///
    /// `cancel` should be a child of the service token so shutdown stops
    /// every trigger.
    #[must_use]
    pub fn spawn(
        user_id: String,
        at: NaiveTime,
        analyzer: Arc<TaskAnalyzer>,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        let span = info_span!("analysis_trigger", user_id = %user_id, at = %format_hhmm(at));
        let handle = tokio::spawn(
            async move {
                loop {
                    let delay = until_next(Utc::now(), at);
                    tokio::select! {
                        () = token.cancelled() => {
                            debug!("analysis trigger cancelled");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {
                            if let Err(err) = analyzer.analyze_user(&user_id, Utc::now()).await {
                                error!(%err, "scheduled analysis failed");
                            }
                        }
                    }
                }
            }
            .instrument(span),
        );
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the trigger and wait for its task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// The two daily triggers of one user.
pub struct TriggerPair {
    first: DailyTrigger,
    second: DailyTrigger,
}

/// Owns the in-memory triggers of every user with an enabled schedule.
pub struct AnalysisScheduler {
    users: UserRepo,
    analyzer: Arc<TaskAnalyzer>,
    cancel: CancellationToken,
    triggers: Mutex<HashMap<String, TriggerPair>>,
}

impl AnalysisScheduler {
    /// Create a scheduler; triggers are children of `cancel`.
    #[must_use]
    pub fn new(users: UserRepo, analyzer: Arc<TaskAnalyzer>, cancel: CancellationToken) -> Self {
        Self {
            users,
            analyzer,
            cancel,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Enable the schedule of `user_id`, anchored at the current time.
    ///
    /// # Errors
    ///
    /// See [`enable_at`](Self::enable_at).
    pub async fn enable(&self, user_id: &str) -> Result<AnalysisSchedule> {
        self.enable_at(user_id, Utc::now()).await
    }

    /// Enable the schedule of `user_id` with `now` as the first run time.
    ///
    /// Idempotent on the persisted flag: an already enabled schedule is
    /// returned unchanged, without new triggers or an immediate run.
    /// Otherwise the schedule is persisted, two triggers are registered
    /// and one analysis pass runs before returning. A failing pass is
    /// logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist, or
    /// `AppError::Db` if the schedule cannot be persisted.
    pub async fn enable_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<AnalysisSchedule> {
        let schedule = {
            let mut triggers = self.triggers.lock().await;
            let user = self
                .users
                .get_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("user not found".into()))?;
            if user.task_analysis_schedule.enabled {
                debug!(user_id, "analysis schedule already enabled");
                return Ok(user.task_analysis_schedule);
            }

            let schedule = AnalysisSchedule::anchored_at(now);
            self.users.save_schedule(user_id, schedule, now).await?;

            let (Some(first), Some(second)) = (schedule.first_run_time, schedule.second_run_time)
            else {
                return Err(AppError::Validation("schedule has no run times".into()));
            };
            let pair = TriggerPair {
                first: self.spawn_trigger(user_id, first),
                second: self.spawn_trigger(user_id, second),
            };
            triggers.insert(user_id.to_owned(), pair);
            schedule
        };

        info!(
            user_id,
            first = %schedule.first_run_time.map(format_hhmm).unwrap_or_default(),
            second = %schedule.second_run_time.map(format_hhmm).unwrap_or_default(),
            "analysis schedule enabled"
        );

        if let Err(err) = self.analyzer.analyze_user(user_id, now).await {
            error!(user_id, %err, "initial analysis failed");
        }
        Ok(schedule)
    }

    /// Disable the schedule of `user_id`.
    ///
    /// Returns `false` when the schedule was already disabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist, or
    /// `AppError::Db` if the schedule cannot be persisted.
    pub async fn disable(&self, user_id: &str) -> Result<bool> {
        let mut triggers = self.triggers.lock().await;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;
        if !user.task_analysis_schedule.enabled {
            triggers.remove(user_id);
            return Ok(false);
        }

        // Triggers stay live until the disabled flag is stored.
        self.users
            .save_schedule(user_id, user.task_analysis_schedule.disabled(), Utc::now())
            .await?;
        triggers.remove(user_id);
        info!(user_id, "analysis schedule disabled");
        Ok(true)
    }

    /// Whether `user_id` has live triggers in this process.
    pub async fn has_triggers(&self, user_id: &str) -> bool {
        self.triggers.lock().await.contains_key(user_id)
    }

    /// Number of users with live triggers.
    pub async fn active_count(&self) -> usize {
        self.triggers.lock().await.len()
    }

    /// Stop every trigger and wait for them to exit.
    pub async fn shutdown(&self) {
        let pairs: Vec<TriggerPair> = self.triggers.lock().await.drain().map(|(_, p)| p).collect();
        for pair in pairs {
            pair.first.stop().await;
            pair.second.stop().await;
        }
    }

    fn spawn_trigger(&self, user_id: &str, at: NaiveTime) -> DailyTrigger {
        DailyTrigger::spawn(
            user_id.to_owned(),
            at,
            Arc::clone(&self.analyzer),
            self.cancel.child_token(),
        )
    }
}
