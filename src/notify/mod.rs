//! Reminder delivery over push and email.
//!
//! Each channel sits behind a small trait so the dispatcher can run with
//! any subset of channels configured, and tests can substitute fakes.

pub mod dispatcher;
pub mod email;
pub mod fcm;
pub mod templates;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::Result;

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Mobile/web push notification.
    Push,
    /// Email message.
    Email,
}

impl Channel {
    /// Channel name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Email => "email",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push notification addressed to one device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Device registration token.
    pub token: String,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Key/value payload delivered alongside the notification.
    pub data: BTreeMap<String, String>,
}

/// Email addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// Optional HTML body.
    pub html: Option<String>,
}

/// Sends push notifications.
pub trait PushNotifier: Send + Sync {
    /// Deliver one push notification.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Notify` if the provider rejects the message or
    /// cannot be reached.
    fn send(&self, message: PushMessage) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Sends emails.
pub trait EmailNotifier: Send + Sync {
    /// Deliver one email.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Notify` if the relay rejects the message or
    /// cannot be reached.
    fn send(&self, message: EmailMessage)
        -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
