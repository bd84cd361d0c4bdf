//! Reminder message rendering.

use std::collections::BTreeMap;

use chrono::SecondsFormat;

use crate::models::task::Task;

use super::{EmailMessage, PushMessage};

/// Title of every reminder push notification.
pub const REMINDER_TITLE: &str = "Task Reminder";

/// Push body for `task`.
#[must_use]
pub fn reminder_body(task: &Task) -> String {
    format!("Reminder: {} is due soon!", task.title)
}

/// Push notification for `task` addressed to `token`.
#[must_use]
pub fn reminder_push(task: &Task, token: &str) -> PushMessage {
    let mut data = BTreeMap::new();
    data.insert("taskId".to_owned(), task.id.clone());
    data.insert(
        "dueDate".to_owned(),
        task.due_date.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    PushMessage {
        token: token.to_owned(),
        title: REMINDER_TITLE.to_owned(),
        body: reminder_body(task),
        data,
    }
}

/// Reminder email for `task` addressed to `address`.
#[must_use]
pub fn reminder_email(task: &Task, address: &str) -> EmailMessage {
    let due = task.due_date.format("%Y-%m-%d %H:%M UTC");
    let mut text = format!("{}\n\nDue: {due}\n", reminder_body(task));
    if let Some(description) = &task.description {
        text.push('\n');
        text.push_str(description);
        text.push('\n');
    }

    let mut html = format!(
        "<p><strong>{}</strong> is due soon.</p><p>Due: {due}</p>",
        escape_html(&task.title)
    );
    if let Some(description) = &task.description {
        html.push_str(&format!("<p>{}</p>", escape_html(description)));
    }

    EmailMessage {
        to: address.to_owned(),
        subject: format!("Reminder: {}", task.title),
        text,
        html: Some(html),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
