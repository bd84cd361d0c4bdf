//! User record referenced by tasks, reminders and the analysis schedule.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").ok());

/// Twice-daily re-prioritization schedule.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSchedule {
    /// Whether the schedule is switched on.
    pub enabled: bool,
    /// First daily run (UTC, minute precision).
    #[serde(with = "hhmm")]
    pub first_run_time: Option<NaiveTime>,
    /// Second daily run, twelve hours after the first.
    #[serde(with = "hhmm")]
    pub second_run_time: Option<NaiveTime>,
}

impl AnalysisSchedule {
    /// Schedule anchored at the time-of-day of `now`.
    #[must_use]
    pub fn anchored_at(now: DateTime<Utc>) -> Self {
        let first = now
            .time()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(|| now.time());
        let (second, _) = first.overflowing_add_signed(chrono::Duration::hours(12));
        Self {
            enabled: true,
            first_run_time: Some(first),
            second_run_time: Some(second),
        }
    }

    /// Same run times, switched off.
    #[must_use]
    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }

    /// Both run times, when set.
    #[must_use]
    pub fn run_times(&self) -> Vec<NaiveTime> {
        [self.first_run_time, self.second_run_time]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Format a time of day as `HH:MM`.
#[must_use]
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse `HH:MM`; empty input means unset.
///
/// # Errors
///
/// Returns `AppError::Validation` on malformed input.
pub fn parse_hhmm(raw: &str) -> Result<Option<NaiveTime>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(Some)
        .map_err(|err| AppError::Validation(format!("invalid time of day {raw:?}: {err}")))
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.map(super::format_hhmm).unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).map_err(serde::de::Error::custom)
    }
}

/// User entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identifier issued by the upstream identity provider.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Reminder email address.
    pub email: Option<String>,
    /// Registered push token.
    pub push_token: Option<String>,
    /// Re-prioritization schedule.
    pub task_analysis_schedule: AnalysisSchedule,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Construct a validated user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank id or username, or a
    /// malformed email address.
    pub fn new(id: &str, username: &str, email: Option<String>) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(AppError::Validation("user id is required".into()));
        }
        if username.trim().is_empty() {
            return Err(AppError::Validation("username is required".into()));
        }
        let email = email.map(|e| e.trim().to_owned()).filter(|e| !e.is_empty());
        if let Some(ref address) = email {
            validate_email(address)?;
        }
        let now = Utc::now();
        Ok(Self {
            id: id.trim().to_owned(),
            username: username.trim().to_owned(),
            email,
            push_token: None,
            task_analysis_schedule: AnalysisSchedule::default(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Check an email address against the accepted shape.
///
/// # Errors
///
/// Returns `AppError::Validation` if the address is malformed.
pub fn validate_email(address: &str) -> Result<()> {
    match EMAIL_PATTERN.as_ref() {
        Some(pattern) if pattern.is_match(address) => Ok(()),
        _ => Err(AppError::Validation(format!(
            "please enter a valid email address: {address}"
        ))),
    }
}
