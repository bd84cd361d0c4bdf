//! Fan-out of one reminder to every channel the user can be reached on.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::task::Task;
use crate::models::user::User;

use super::templates::{reminder_email, reminder_push};
use super::{Channel, EmailNotifier, PushNotifier};

/// Result of one channel attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Accepted by the provider.
    Delivered,
    /// Attempted and failed.
    Failed(String),
    /// Not attempted: channel not configured or user not reachable on it.
    Skipped,
}

impl ChannelOutcome {
    /// Whether the channel delivered.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Per-channel outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Push outcome.
    pub push: ChannelOutcome,
    /// Email outcome.
    pub email: ChannelOutcome,
}

impl DispatchReport {
    /// At least one channel delivered.
    #[must_use]
    pub fn delivered(&self) -> bool {
        self.push.is_delivered() || self.email.is_delivered()
    }

    /// At least one channel was attempted.
    #[must_use]
    pub fn attempted(&self) -> bool {
        self.push != ChannelOutcome::Skipped || self.email != ChannelOutcome::Skipped
    }
}

/// Sends reminders over push and email concurrently.
///
/// Channel failures are logged and reported, never raised.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    push: Option<Arc<dyn PushNotifier>>,
    email: Option<Arc<dyn EmailNotifier>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher over the given channels.
    #[must_use]
    pub fn new(
        push: Option<Arc<dyn PushNotifier>>,
        email: Option<Arc<dyn EmailNotifier>>,
    ) -> Self {
        Self { push, email }
    }

    /// Send the reminder for `task` to `user`.
    pub async fn dispatch(&self, task: &Task, user: &User) -> DispatchReport {
        let push = async {
            let (Some(notifier), Some(token)) = (&self.push, user.push_token.as_deref()) else {
                return ChannelOutcome::Skipped;
            };
            let result = notifier.send(reminder_push(task, token)).await;
            record(Channel::Push, &task.id, result)
        };

        let email = async {
            let (Some(notifier), Some(address)) = (&self.email, user.email.as_deref()) else {
                return ChannelOutcome::Skipped;
            };
            let result = notifier.send(reminder_email(task, address)).await;
            record(Channel::Email, &task.id, result)
        };

        let (push, email) = tokio::join!(push, email);
        DispatchReport { push, email }
    }
}

fn record(channel: Channel, task_id: &str, result: crate::Result<()>) -> ChannelOutcome {
    match result {
        Ok(()) => {
            debug!(task_id, %channel, "reminder delivered");
            ChannelOutcome::Delivered
        }
        Err(err) => {
            warn!(task_id, %channel, %err, "reminder delivery failed");
            ChannelOutcome::Failed(err.to_string())
        }
    }
}
