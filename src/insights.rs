//! Productivity metrics over a user's tasks.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::models::task::Task;

/// Deterministic habit metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitMetrics {
    /// All tasks.
    pub total_tasks: usize,
    /// Completed tasks.
    pub completed_tasks: usize,
    /// Open tasks past their due date.
    pub overdue_tasks: usize,
    /// `completed_tasks / total_tasks`, zero without tasks.
    pub completion_rate: f64,
    /// `overdue_tasks / total_tasks`, zero without tasks.
    pub overdue_rate: f64,
    /// Consecutive days up to today with at least one completion.
    pub streak: u32,
    /// UTC hour with the most completions; the earliest hour wins ties.
    pub most_productive_hour: Option<u32>,
}

impl HabitMetrics {
    /// Compute the metrics as of `now`.
    ///
    /// Completion time is approximated by `updated_at` of completed tasks.
    #[must_use]
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let completed: Vec<&Task> = tasks.iter().filter(|t| t.is_completed()).collect();
        let overdue_tasks = tasks
            .iter()
            .filter(|t| !t.is_completed() && t.due_date < now)
            .count();

        Self {
            total_tasks: tasks.len(),
            completed_tasks: completed.len(),
            overdue_tasks,
            completion_rate: ratio(completed.len(), tasks.len()),
            overdue_rate: ratio(overdue_tasks, tasks.len()),
            streak: completion_streak(&completed, now),
            most_productive_hour: most_productive_hour(&completed),
        }
    }
}

#[allow(clippy::cast_precision_loss)] // Task counts stay far below 2^52.
fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn completion_streak(completed: &[&Task], now: DateTime<Utc>) -> u32 {
    let days: BTreeSet<NaiveDate> = completed.iter().map(|t| t.updated_at.date_naive()).collect();
    let mut day = now.date_naive();
    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

fn most_productive_hour(completed: &[&Task]) -> Option<u32> {
    let mut hours = [0_usize; 24];
    for task in completed {
        hours[task.updated_at.hour() as usize] += 1;
    }
    let max = hours.iter().copied().max().filter(|&n| n > 0)?;
    (0_u32..24).find(|&h| hours[h as usize] == max)
}
