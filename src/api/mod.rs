//! HTTP API.
//!
//! Callers are authenticated upstream; the gateway forwards the user id
//! in the `x-user-id` header. Handlers map [`AppError`] variants to status
//! codes with a `{"message": ...}` body.

mod assistant;
mod tasks;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::orchestrator::analysis::TaskAnalyzer;
use crate::orchestrator::analysis_scheduler::AnalysisScheduler;
use crate::orchestrator::nlp::NlpTaskService;
use crate::orchestrator::task_service::TaskService;
use crate::persistence::user_repo::UserRepo;
use crate::{AppError, Result};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for all handlers.
pub struct AppState {
    /// Task operations.
    pub tasks: TaskService,
    /// User records.
    pub users: UserRepo,
    /// One-off analysis passes.
    pub analyzer: Arc<TaskAnalyzer>,
    /// Per-user analysis triggers.
    pub scheduler: Arc<AnalysisScheduler>,
    /// Natural-language task creation.
    pub nlp: Arc<NlpTaskService>,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;
        let id = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?
            .trim();
        if id.is_empty() {
            return Err(AppError::Unauthorized(format!("empty {USER_ID_HEADER} header")));
        }
        Ok(Self(id.to_owned()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Advisory(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Db(_) | Self::Notify(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(err = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(users::register))
        .route("/api/users/me", get(users::me))
        .route("/api/users/push-token", put(users::update_push_token))
        .route("/api/tasks", post(tasks::create).get(tasks::list))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_one).patch(tasks::update).delete(tasks::remove),
        )
        .route("/api/tasks/{id}/complete", post(tasks::complete))
        .route("/api/tasks/{id}/incomplete", post(tasks::incomplete))
        .route(
            "/api/analysis/schedule",
            post(assistant::enable_schedule).delete(assistant::disable_schedule),
        )
        .route("/api/analysis/run", post(assistant::run_analysis))
        .route("/api/nlp/create-from-nlp", post(assistant::create_from_nlp))
        .route("/api/insights", get(assistant::insights))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Bind `0.0.0.0:port` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the port cannot be bound or the server
/// fails.
pub async fn serve(state: Arc<AppState>, port: u16, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(%local, "starting HTTP API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}
