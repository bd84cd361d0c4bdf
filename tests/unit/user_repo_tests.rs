//! Unit tests for `UserRepo` against in-memory `SQLite`.
//!
//! Validates:
//! - upsert inserts, then refreshes profile fields only
//! - push token updates
//! - schedule persistence and `list_scheduled`
//! - not-found handling for unknown users

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use taskpulse::models::user::{AnalysisSchedule, User};
use taskpulse::persistence::{db, user_repo::UserRepo};
use taskpulse::AppError;

async fn repo() -> UserRepo {
    let db = db::connect_memory().await.expect("db");
    UserRepo::new(Arc::new(db))
}

#[tokio::test]
async fn upsert_inserts_new_user() {
    let repo = repo().await;
    let user = User::new("u1", "Ada", Some("ada@example.com".into())).unwrap();

    let stored = repo.upsert(&user).await.expect("upsert");
    assert_eq!(stored.username, "Ada");
    assert_eq!(stored.email.as_deref(), Some("ada@example.com"));
    assert_eq!(stored.created_at, user.created_at);
}

#[tokio::test]
async fn upsert_keeps_push_token_and_schedule() {
    let repo = repo().await;
    let user = User::new("u1", "Ada", None).unwrap();
    repo.upsert(&user).await.unwrap();

    let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
    repo.update_push_token("u1", "device-token", now).await.unwrap();
    repo.save_schedule("u1", AnalysisSchedule::anchored_at(now), now)
        .await
        .unwrap();

    let renamed = User::new("u1", "Ada L.", Some("ada@example.org".into())).unwrap();
    let stored = repo.upsert(&renamed).await.unwrap();

    assert_eq!(stored.username, "Ada L.");
    assert_eq!(stored.email.as_deref(), Some("ada@example.org"));
    assert_eq!(stored.push_token.as_deref(), Some("device-token"));
    assert!(stored.task_analysis_schedule.enabled);
    assert_eq!(stored.created_at, user.created_at);
}

#[tokio::test]
async fn schedule_round_trips_and_lists() {
    let repo = repo().await;
    for id in ["u1", "u2"] {
        repo.upsert(&User::new(id, id, None).unwrap()).await.unwrap();
    }
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 23, 30, 0).unwrap();
    let schedule = AnalysisSchedule::anchored_at(now);
    repo.save_schedule("u2", schedule, now).await.unwrap();

    let scheduled = repo.list_scheduled().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, "u2");
    assert_eq!(scheduled[0].task_analysis_schedule, schedule);

    repo.save_schedule("u2", schedule.disabled(), now).await.unwrap();
    assert!(repo.list_scheduled().await.unwrap().is_empty());
    let stored = repo.get_by_id("u2").await.unwrap().unwrap();
    assert_eq!(stored.task_analysis_schedule.first_run_time, schedule.first_run_time);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let repo = repo().await;
    let now = Utc::now();

    assert!(repo.get_by_id("ghost").await.unwrap().is_none());
    assert!(matches!(
        repo.update_push_token("ghost", "t", now).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        repo.save_schedule("ghost", AnalysisSchedule::default(), now).await,
        Err(AppError::NotFound(_))
    ));
}
