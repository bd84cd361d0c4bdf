//! Unit tests for reminder message rendering.

use chrono::{TimeZone, Utc};

use taskpulse::models::task::{NewTask, Task};
use taskpulse::notify::templates::{reminder_body, reminder_email, reminder_push, REMINDER_TITLE};

fn task(title: &str, description: Option<&str>) -> Task {
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
    Task::new(
        "u1",
        NewTask {
            title: title.into(),
            description: description.map(str::to_owned),
            due_date: Some(Utc.with_ymd_and_hms(2025, 3, 12, 17, 30, 0).unwrap()),
            ..NewTask::default()
        },
        now,
    )
    .unwrap()
}

#[test]
fn push_carries_title_body_and_data() {
    let task = task("Pay rent", None);
    let message = reminder_push(&task, "device-1");

    assert_eq!(message.token, "device-1");
    assert_eq!(message.title, REMINDER_TITLE);
    assert_eq!(message.body, "Reminder: Pay rent is due soon!");
    assert_eq!(message.data.get("taskId"), Some(&task.id));
    assert_eq!(
        message.data.get("dueDate").map(String::as_str),
        Some("2025-03-12T17:30:00Z")
    );
}

#[test]
fn email_includes_due_date_and_description() {
    let task = task("Pay rent", Some("Transfer before noon"));
    let message = reminder_email(&task, "ada@example.com");

    assert_eq!(message.to, "ada@example.com");
    assert_eq!(message.subject, "Reminder: Pay rent");
    assert!(message.text.starts_with(&reminder_body(&task)));
    assert!(message.text.contains("Due: 2025-03-12 17:30 UTC"));
    assert!(message.text.contains("Transfer before noon"));
}

#[test]
fn email_html_is_escaped() {
    let task = task("<b>rent</b> & \"bills\"", None);
    let html = reminder_email(&task, "ada@example.com").html.unwrap();

    assert!(html.contains("&lt;b&gt;rent&lt;/b&gt; &amp; &quot;bills&quot;"));
    assert!(!html.contains("<b>rent"));
}
