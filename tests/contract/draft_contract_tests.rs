//! Contract tests for natural-language task drafts.

use chrono::{DateTime, TimeZone, Utc};

use taskpulse::advisory::drafter::{parse_draft, parse_draft_time, TaskDraft, UNTITLED_TASK};
use taskpulse::models::task::Priority;
use taskpulse::AppError;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

fn draft(due_date: &str) -> TaskDraft {
    TaskDraft {
        title: Some("Call the dentist".into()),
        due_date: Some(due_date.into()),
        ..TaskDraft::default()
    }
}

#[test]
fn full_draft_becomes_task_input() {
    let text = r#"```json
{"title":"Call the dentist","description":"Book a cleaning","priority":"high",
 "dueDate":"2025-03-12T17:00:00Z","reminderTime":"2025-03-12T09:00:00Z"}
```"#;
    let input = parse_draft(text).unwrap().into_new_task(now()).expect("valid");

    assert_eq!(input.title, "Call the dentist");
    assert_eq!(input.description.as_deref(), Some("Book a cleaning"));
    assert_eq!(input.priority, Some(Priority::High));
    assert_eq!(
        input.due_date,
        Some(Utc.with_ymd_and_hms(2025, 3, 12, 17, 0, 0).unwrap())
    );
    assert_eq!(
        input.reminder_time,
        Some(Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap())
    );
}

#[test]
fn missing_title_falls_back_to_untitled() {
    let mut raw = draft("2025-03-12T17:00:00Z");
    raw.title = Some("   ".into());
    let input = raw.into_new_task(now()).unwrap();
    assert_eq!(input.title, UNTITLED_TASK);
}

#[test]
fn blank_reminder_means_default() {
    let mut raw = draft("2025-03-12T17:00:00Z");
    raw.reminder_time = Some(String::new());
    let input = raw.into_new_task(now()).unwrap();
    assert!(input.reminder_time.is_none());
    assert!(input.priority.is_none());
}

#[test]
fn missing_or_unparsable_due_date_violates_contract() {
    let mut raw = draft("2025-03-12T17:00:00Z");
    raw.due_date = None;
    assert!(matches!(raw.into_new_task(now()), Err(AppError::Advisory(_))));

    assert!(matches!(
        draft("next friday").into_new_task(now()),
        Err(AppError::Advisory(_))
    ));
}

#[test]
fn past_due_date_is_a_validation_error() {
    assert!(matches!(
        draft("2025-03-01T12:00:00Z").into_new_task(now()),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn malformed_optional_fields_violate_contract() {
    let mut raw = draft("2025-03-12T17:00:00Z");
    raw.priority = Some("Completed".into());
    assert!(matches!(raw.into_new_task(now()), Err(AppError::Advisory(_))));

    let mut raw = draft("2025-03-12T17:00:00Z");
    raw.reminder_time = Some("soon".into());
    assert!(matches!(raw.into_new_task(now()), Err(AppError::Advisory(_))));
}

#[test]
fn draft_times_accept_common_shapes() {
    let expected = Utc.with_ymd_and_hms(2025, 3, 12, 17, 30, 0).unwrap();

    assert_eq!(parse_draft_time("2025-03-12T17:30:00Z"), Some(expected));
    assert_eq!(parse_draft_time("2025-03-12T19:30:00+02:00"), Some(expected));
    assert_eq!(parse_draft_time("2025-03-12T17:30:00.000"), Some(expected));
    assert_eq!(parse_draft_time("2025-03-12T17:30"), Some(expected));
    assert_eq!(parse_draft_time(" 2025-03-12 17:30 "), Some(expected));
    assert_eq!(parse_draft_time("tomorrow at five"), None);
}

#[test]
fn response_without_object_is_rejected() {
    assert!(matches!(
        parse_draft("Sorry, I cannot help with that."),
        Err(AppError::Advisory(_))
    ));
}
