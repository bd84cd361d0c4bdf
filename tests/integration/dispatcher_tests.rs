//! Integration tests for the notification dispatcher.

use std::sync::Arc;

use chrono::Utc;

use taskpulse::notify::dispatcher::{ChannelOutcome, NotificationDispatcher};

use super::test_helpers::{Harness, RecordingEmail, RecordingPush};

#[tokio::test]
async fn sends_on_every_reachable_channel() {
    let harness = Harness::new().await;
    let now = Utc::now();
    let user = harness
        .user("u1", Some("u1@example.com"), Some("device-1"))
        .await;
    let task = harness.task("u1", "Pay rent", chrono::Duration::days(2), now).await;
    let push = Arc::new(RecordingPush::default());
    let email = Arc::new(RecordingEmail::default());
    let dispatcher = NotificationDispatcher::new(Some(push.clone()), Some(email.clone()));

    let report = dispatcher.dispatch(&task, &user).await;
    assert_eq!(report.push, ChannelOutcome::Delivered);
    assert_eq!(report.email, ChannelOutcome::Delivered);
    assert!(report.delivered());

    let mail = email.sent.lock().unwrap();
    assert_eq!(mail[0].to, "u1@example.com");
    assert_eq!(mail[0].subject, "Reminder: Pay rent");
}

#[tokio::test]
async fn missing_identifier_skips_channel() {
    let harness = Harness::new().await;
    let now = Utc::now();
    let user = harness.user("u1", Some("u1@example.com"), None).await;
    let task = harness.task("u1", "Pay rent", chrono::Duration::days(2), now).await;
    let push = Arc::new(RecordingPush::default());
    let dispatcher =
        NotificationDispatcher::new(Some(push.clone()), Some(Arc::new(RecordingEmail::default())));

    let report = dispatcher.dispatch(&task, &user).await;
    assert_eq!(report.push, ChannelOutcome::Skipped);
    assert_eq!(report.email, ChannelOutcome::Delivered);
    assert_eq!(push.count(), 0);
}

#[tokio::test]
async fn unconfigured_channels_are_skipped() {
    let harness = Harness::new().await;
    let now = Utc::now();
    let user = harness
        .user("u1", Some("u1@example.com"), Some("device-1"))
        .await;
    let task = harness.task("u1", "Pay rent", chrono::Duration::days(2), now).await;

    let report = NotificationDispatcher::default().dispatch(&task, &user).await;
    assert!(!report.attempted());
    assert!(!report.delivered());
}

#[tokio::test]
async fn failures_are_reported_not_raised() {
    let harness = Harness::new().await;
    let now = Utc::now();
    let user = harness
        .user("u1", Some("u1@example.com"), Some("device-1"))
        .await;
    let task = harness.task("u1", "Pay rent", chrono::Duration::days(2), now).await;
    let dispatcher = NotificationDispatcher::new(
        Some(Arc::new(RecordingPush::failing())),
        Some(Arc::new(RecordingEmail::failing())),
    );

    let report = dispatcher.dispatch(&task, &user).await;
    assert!(matches!(report.push, ChannelOutcome::Failed(_)));
    assert!(matches!(report.email, ChannelOutcome::Failed(_)));
    assert!(report.attempted());
    assert!(!report.delivered());
}
