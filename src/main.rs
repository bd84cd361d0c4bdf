#![forbid(unsafe_code)]

//! `taskpulse` server binary.
//!
//! Bootstraps configuration, the database, the reminder scanner, the
//! analysis scheduler and the HTTP API, then waits for a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use taskpulse::advisory::gemini::GeminiClient;
use taskpulse::api::{self, AppState};
use taskpulse::config::GlobalConfig;
use taskpulse::notify::dispatcher::NotificationDispatcher;
use taskpulse::notify::email::HttpEmailNotifier;
use taskpulse::notify::fcm::FcmPushNotifier;
use taskpulse::notify::{EmailNotifier, PushNotifier};
use taskpulse::orchestrator::analysis::TaskAnalyzer;
use taskpulse::orchestrator::analysis_scheduler::AnalysisScheduler;
use taskpulse::orchestrator::nlp::NlpTaskService;
use taskpulse::orchestrator::reminder_scanner::{spawn_reminder_task, ReminderScanner};
use taskpulse::orchestrator::task_service::TaskService;
use taskpulse::persistence::db;
use taskpulse::persistence::task_repo::TaskRepo;
use taskpulse::persistence::user_repo::UserRepo;
use taskpulse::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "taskpulse", about = "Personal task service", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the database file from the configuration.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("taskpulse server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::from_toml_str("")?,
    };
    if let Some(path) = args.db_path {
        config.db_path = path;
    }
    config.load_credentials().await;
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    let tasks = TaskRepo::new(Arc::clone(&db));
    let users = UserRepo::new(Arc::clone(&db));
    let task_service = TaskService::new(tasks.clone());
    let ct = CancellationToken::new();

    // ── Model clients ───────────────────────────────────
    let gemini = Arc::new(GeminiClient::from_config(&config.advisory)?);
    if config.advisory.api_key.is_empty() {
        info!("advisory api key not configured; analysis and drafting calls will fail");
    }
    let analyzer = Arc::new(TaskAnalyzer::new(
        tasks.clone(),
        gemini.clone(),
        config.advisory.timeout(),
    ));
    let scheduler = Arc::new(AnalysisScheduler::new(
        users.clone(),
        Arc::clone(&analyzer),
        ct.clone(),
    ));
    let nlp = Arc::new(NlpTaskService::new(
        task_service.clone(),
        gemini,
        config.advisory.timeout(),
    ));

    // ── Notification channels ───────────────────────────
    let push: Option<Arc<dyn PushNotifier>> = if config.push_enabled() {
        Some(Arc::new(FcmPushNotifier::from_config(&config.push)?))
    } else {
        info!("push channel not configured");
        None
    };
    let email: Option<Arc<dyn EmailNotifier>> = if config.email_enabled() {
        Some(Arc::new(HttpEmailNotifier::from_config(&config.email)?))
    } else {
        info!("email channel not configured");
        None
    };
    let dispatcher = NotificationDispatcher::new(push, email);

    // ── Start reminder scanner ──────────────────────────
    let reminder_handle = if config.reminders.enabled {
        let scanner = Arc::new(ReminderScanner::new(
            tasks,
            users.clone(),
            dispatcher,
            config.reminders.lookahead(),
        ));
        info!(
            interval_secs = config.reminders.scan_interval_seconds,
            lookahead_minutes = config.reminders.lookahead_minutes,
            "reminder scanner started"
        );
        Some(spawn_reminder_task(
            scanner,
            config.reminders.scan_interval(),
            ct.clone(),
        ))
    } else {
        info!("reminder scanner disabled");
        None
    };

    // ── Start HTTP API ──────────────────────────────────
    let state = Arc::new(AppState {
        tasks: task_service,
        users,
        analyzer,
        scheduler: Arc::clone(&scheduler),
        nlp,
    });
    let api_ct = ct.clone();
    let port = config.http_port;
    let api_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(state, port, api_ct).await {
            error!(%err, "http api failed");
        }
    });

    info!("taskpulse ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    scheduler.shutdown().await;
    let _ = api_handle.await;
    if let Some(handle) = reminder_handle {
        let _ = handle.await;
    }
    info!("taskpulse shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
