//! Advisory-driven re-prioritization of a user's open tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::advisory::{AdvisoryClient, AdvisoryRequest};
use crate::models::task::{AdvisoryOutcome, Task};
use crate::persistence::task_repo::TaskRepo;
use crate::{AppError, Result};

/// Counters for one analysis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AnalysisReport {
    /// Tasks sent to the advisory client.
    pub evaluated: usize,
    /// Tasks the advisory changed.
    pub updated: usize,
    /// Tasks the advisory left as they were.
    pub unchanged: usize,
    /// Tasks skipped for a timeout, a contract violation, or a concurrent delete.
    pub skipped: usize,
    /// Tasks whose update failed in storage.
    pub failed: usize,
}

/// Applies advisory recommendations to every open task of a user.
pub struct TaskAnalyzer {
    tasks: TaskRepo,
    advisory: Arc<dyn AdvisoryClient>,
    timeout: Duration,
}

impl TaskAnalyzer {
    /// Create an analyzer bounding each advisory call by `timeout`.
    #[must_use]
    pub fn new(tasks: TaskRepo, advisory: Arc<dyn AdvisoryClient>, timeout: Duration) -> Self {
        Self {
            tasks,
            advisory,
            timeout,
        }
    }

    /// Run one pass over the open tasks of `user_id`, evaluated against `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the open tasks cannot be loaded. Failures
    /// on individual tasks are contained and counted.
    pub async fn analyze_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<AnalysisReport> {
        async {
            let open = self.tasks.list_incomplete_for_user(user_id).await?;
            let mut report = AnalysisReport::default();

            for task in &open {
                report.evaluated += 1;
                self.analyze_task(task, now, &mut report).await;
            }

            info!(
                evaluated = report.evaluated,
                updated = report.updated,
                unchanged = report.unchanged,
                skipped = report.skipped,
                failed = report.failed,
                "task analysis completed"
            );
            Ok(report)
        }
        .instrument(info_span!("task_analysis", user_id))
        .await
    }

    async fn analyze_task(&self, task: &Task, now: DateTime<Utc>, report: &mut AnalysisReport) {
        let request = AdvisoryRequest::from_task(task, now);
        let advisory = match tokio::time::timeout(self.timeout, self.advisory.evaluate(request)).await
        {
            Ok(Ok(advisory)) => advisory,
            Ok(Err(err)) => {
                warn!(task_id = %task.id, %err, "advisory rejected, task skipped");
                report.skipped += 1;
                return;
            }
            Err(_) => {
                warn!(task_id = %task.id, timeout = ?self.timeout, "advisory timed out, task skipped");
                report.skipped += 1;
                return;
            }
        };

        let mut outcome = AdvisoryOutcome::default();
        let result = self
            .tasks
            .modify(&task.id, |current| {
                outcome = current.apply_advisory(&advisory, now);
                Ok(outcome.changed())
            })
            .await;

        match result {
            Ok(_) if outcome.changed() => {
                debug!(
                    task_id = %task.id,
                    priority_changed = outcome.priority_changed,
                    status_changed = outcome.status_changed,
                    "advisory applied"
                );
                report.updated += 1;
            }
            Ok(_) => report.unchanged += 1,
            Err(AppError::NotFound(_)) => {
                debug!(task_id = %task.id, "task deleted during analysis");
                report.skipped += 1;
            }
            Err(err) => {
                warn!(task_id = %task.id, %err, "advisory update failed");
                report.failed += 1;
            }
        }
    }
}
