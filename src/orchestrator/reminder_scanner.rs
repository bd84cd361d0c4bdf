//! Periodic reminder scan with at-most-once delivery.
//!
//! A cycle loads every open, not yet notified task whose reminder falls
//! in the scan window, dispatches it, and flips `notification_sent` only
//! when at least one channel delivered. The flip is guarded by the
//! reminder time that was dispatched, so a reminder rescheduled while the
//! dispatch was in flight stays armed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::models::task::Task;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::persistence::task_repo::TaskRepo;
use crate::persistence::user_repo::UserRepo;
use crate::{AppError, Result};

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Tasks found in the window.
    pub due: usize,
    /// Tasks delivered and marked sent.
    pub delivered: usize,
    /// Tasks no channel delivered; retried next cycle.
    pub undelivered: usize,
    /// Tasks that hit a storage error.
    pub failed: usize,
}

/// Finds due reminders and hands them to the dispatcher.
pub struct ReminderScanner {
    tasks: TaskRepo,
    users: UserRepo,
    dispatcher: NotificationDispatcher,
    lookahead: chrono::Duration,
}

impl ReminderScanner {
    /// Create a scanner with the given lookahead window.
    #[must_use]
    pub fn new(
        tasks: TaskRepo,
        users: UserRepo,
        dispatcher: NotificationDispatcher,
        lookahead: chrono::Duration,
    ) -> Self {
        Self {
            tasks,
            users,
            dispatcher,
            lookahead,
        }
    }

    /// Tasks whose reminder is due relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.tasks.find_due_reminders(now, self.lookahead).await
    }

    /// Run one scan.
    ///
    /// Per-task failures are logged and counted; only failing to load the
    /// due set aborts the cycle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the due reminders cannot be loaded.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let due = self.find_due_reminders(now).await?;
        let mut report = ScanReport {
            due: due.len(),
            ..ScanReport::default()
        };

        for task in &due {
            match self.process(task).await {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.undelivered += 1,
                Err(err) => {
                    warn!(task_id = %task.id, %err, "reminder processing failed");
                    report.failed += 1;
                }
            }
        }

        if report.due > 0 {
            info!(
                due = report.due,
                delivered = report.delivered,
                undelivered = report.undelivered,
                failed = report.failed,
                "reminder scan completed"
            );
        }
        Ok(report)
    }

    async fn process(&self, task: &Task) -> Result<bool> {
        let Some(reminder_time) = task.reminder_time else {
            return Ok(false);
        };
        let user = self
            .users
            .get_by_id(&task.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("owner {} not found", task.user_id)))?;

        let report = self.dispatcher.dispatch(task, &user).await;
        if !report.delivered() {
            if !report.attempted() {
                debug!(task_id = %task.id, user_id = %user.id, "no reachable channel");
            }
            return Ok(false);
        }

        if !self
            .tasks
            .mark_notification_sent(&task.id, reminder_time)
            .await?
        {
            info!(task_id = %task.id, "reminder changed during dispatch, left armed");
        }
        Ok(true)
    }
}

/// Spawn the periodic reminder scan.
///
/// A failing cycle is logged and the loop keeps ticking until `cancel`
/// fires.
#[must_use]
pub fn spawn_reminder_task(
    scanner: Arc<ReminderScanner>,
    scan_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut interval = tokio::time::interval(scan_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("reminder scanner shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(err) = scanner.run_cycle(Utc::now()).await {
                            error!(%err, "reminder scan failed");
                        }
                    }
                }
            }
        }
        .instrument(info_span!("reminder_scanner")),
    )
}
