//! User repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::user::{format_hhmm, parse_hhmm, AnalysisSchedule, User};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_ts, encode_ts};

/// Repository wrapper around `SQLite` for user records.
#[derive(Clone)]
pub struct UserRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: Option<String>,
    push_token: Option<String>,
    analysis_enabled: i64,
    first_run_time: Option<String>,
    second_run_time: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let first_run_time = match self.first_run_time.as_deref() {
            Some(raw) => parse_hhmm(raw).map_err(|e| AppError::Db(e.to_string()))?,
            None => None,
        };
        let second_run_time = match self.second_run_time.as_deref() {
            Some(raw) => parse_hhmm(raw).map_err(|e| AppError::Db(e.to_string()))?,
            None => None,
        };

        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            push_token: self.push_token,
            task_analysis_schedule: AnalysisSchedule {
                enabled: self.analysis_enabled != 0,
                first_run_time,
                second_run_time,
            },
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
        })
    }
}

impl UserRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a user or refresh the profile fields of an existing one.
    ///
    /// The push token and analysis schedule of an existing user are kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert(&self, user: &User) -> Result<User> {
        let schedule = user.task_analysis_schedule;
        sqlx::query(
            "INSERT INTO app_user (id, username, email, push_token, analysis_enabled,
             first_run_time, second_run_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                updated_at = excluded.updated_at",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.push_token)
        .bind(i64::from(schedule.enabled))
        .bind(schedule.first_run_time.map(format_hhmm))
        .bind(schedule.second_run_time.map(format_hhmm))
        .bind(encode_ts(user.created_at))
        .bind(encode_ts(user.updated_at))
        .execute(self.db.as_ref())
        .await?;

        self.get_by_id(&user.id)
            .await?
            .ok_or_else(|| AppError::Db(format!("user {} vanished after upsert", user.id)))
    }

    /// Retrieve a user by identifier.
    ///
    /// Returns `Ok(None)` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM app_user WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// All users whose analysis schedule is switched on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_scheduled(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM app_user WHERE analysis_enabled = 1")
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Replace the push token of a user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn update_push_token(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE app_user SET push_token = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(token)
                .bind(encode_ts(now))
                .bind(id)
                .execute(self.db.as_ref())
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user not found".into()));
        }
        Ok(())
    }

    /// Persist the analysis schedule of a user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn save_schedule(
        &self,
        id: &str,
        schedule: AnalysisSchedule,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE app_user SET analysis_enabled = ?1, first_run_time = ?2,
             second_run_time = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(i64::from(schedule.enabled))
        .bind(schedule.first_run_time.map(format_hhmm))
        .bind(schedule.second_run_time.map(format_hhmm))
        .bind(encode_ts(now))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user not found".into()));
        }
        Ok(())
    }
}
