//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name under which runtime secrets are stored.
pub const KEYRING_SERVICE: &str = "taskpulse";

/// Reminder scan cadence and eligibility window.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReminderConfig {
    /// Whether the periodic reminder scanner runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between two scans.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,
    /// Lookahead (and retry tail) of the reminder window, in minutes.
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_seconds: default_scan_interval(),
            lookahead_minutes: default_lookahead_minutes(),
        }
    }
}

impl ReminderConfig {
    /// Interval between scans.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    /// Lookahead window as a `chrono` duration.
    #[must_use]
    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookahead_minutes))
    }
}

/// Advisory (LLM) client settings.
///
/// The API key is loaded at runtime via OS keychain or environment
/// variables, not from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AdvisoryConfig {
    /// Base URL of the generative language API.
    #[serde(default = "default_advisory_endpoint")]
    pub endpoint: String,
    /// Model identifier appended to the endpoint.
    #[serde(default = "default_advisory_model")]
    pub model: String,
    /// Upper bound for a single advisory or drafting call.
    #[serde(default = "default_advisory_timeout")]
    pub timeout_seconds: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_advisory_endpoint(),
            model: default_advisory_model(),
            timeout_seconds: default_advisory_timeout(),
            api_key: String::new(),
        }
    }
}

impl AdvisoryConfig {
    /// Timeout applied to every advisory call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Push (Firebase Cloud Messaging) settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PushConfig {
    /// FCM HTTP v1 base URL.
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,
    /// Firebase project identifier; empty disables push.
    #[serde(default)]
    pub project_id: String,
    /// Upper bound for a single send request.
    #[serde(default = "default_channel_timeout")]
    pub timeout_seconds: u64,
    /// OAuth access token (populated at runtime).
    #[serde(skip)]
    pub access_token: String,
}

/// Email relay settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EmailConfig {
    /// JSON mail relay endpoint; empty disables email.
    #[serde(default)]
    pub endpoint: String,
    /// Sender address used for reminder mails.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Upper bound for a single send request.
    #[serde(default = "default_channel_timeout")]
    pub timeout_seconds: u64,
    /// Relay API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            project_id: String::new(),
            timeout_seconds: default_channel_timeout(),
            access_token: String::new(),
        }
    }
}

impl PushConfig {
    /// Timeout applied to every push request.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            from_address: default_from_address(),
            timeout_seconds: default_channel_timeout(),
            api_key: String::new(),
        }
    }
}

impl EmailConfig {
    /// Timeout applied to every relay request.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    60
}

fn default_lookahead_minutes() -> u32 {
    15
}

fn default_advisory_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_advisory_model() -> String {
    "gemini-1.5-flash".into()
}

fn default_advisory_timeout() -> u64 {
    15
}

fn default_push_endpoint() -> String {
    "https://fcm.googleapis.com/v1".into()
}

fn default_channel_timeout() -> u64 {
    10
}

fn default_from_address() -> String {
    "reminders@taskpulse.local".into()
}

fn default_http_port() -> u16 {
    5000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/taskpulse.db")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// HTTP port for the task API.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Reminder scanner settings.
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// Advisory client settings.
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    /// Push channel settings.
    #[serde(default)]
    pub push: PushConfig,
    /// Email channel settings.
    #[serde(default)]
    pub email: EmailConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load runtime secrets from OS keychain with env-var fallback.
    ///
    /// Missing secrets are not fatal: the affected client stays disabled
    /// and a warning is logged.
    pub async fn load_credentials(&mut self) {
        self.advisory.api_key =
            load_optional_credential("advisory_api_key", "TASKPULSE_ADVISORY_API_KEY").await;
        self.push.access_token =
            load_optional_credential("push_access_token", "TASKPULSE_PUSH_ACCESS_TOKEN").await;
        self.email.api_key =
            load_optional_credential("email_api_key", "TASKPULSE_EMAIL_API_KEY").await;
    }

    /// Whether the push channel has everything it needs.
    #[must_use]
    pub fn push_enabled(&self) -> bool {
        !self.push.project_id.is_empty() && !self.push.access_token.is_empty()
    }

    /// Whether the email channel has everything it needs.
    #[must_use]
    pub fn email_enabled(&self) -> bool {
        !self.email.endpoint.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.reminders.scan_interval_seconds == 0 {
            return Err(AppError::Config(
                "reminders.scan_interval_seconds must be greater than zero".into(),
            ));
        }

        if u64::from(self.reminders.lookahead_minutes) * 60 < self.reminders.scan_interval_seconds {
            return Err(AppError::Config(
                "reminders.lookahead_minutes must cover at least one scan interval".into(),
            ));
        }

        if self.advisory.timeout_seconds == 0 {
            return Err(AppError::Config(
                "advisory.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.push.timeout_seconds == 0 || self.email.timeout_seconds == 0 {
            return Err(AppError::Config(
                "push.timeout_seconds and email.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.email.from_address.trim().is_empty() {
            return Err(AppError::Config("email.from_address must not be empty".into()));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
///
/// Returns an empty string when neither source provides a value.
async fn load_optional_credential(keyring_key: &str, env_key: &str) -> String {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return value,
        Ok(Ok(_)) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Ok(Err(err)) => {
            warn!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(key = keyring_key, %err, "keychain task panicked, trying env var");
        }
    }

    env::var(env_key).unwrap_or_else(|_| {
        warn!(
            key = keyring_key,
            env = env_key,
            "credential not configured; dependent client disabled"
        );
        String::new()
    })
}
