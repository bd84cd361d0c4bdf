//! Analysis schedule, natural-language creation and insights endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::insights::HabitMetrics;
use crate::models::task::TaskDocument;
use crate::models::user::AnalysisSchedule;
use crate::orchestrator::analysis::AnalysisReport;
use crate::Result;

use super::{AppState, CallerId};

#[derive(Deserialize)]
pub(super) struct NlpCommand {
    #[serde(default)]
    command: String,
}

pub(super) async fn enable_schedule(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<AnalysisSchedule>> {
    let schedule = state.scheduler.enable(&user_id).await?;
    Ok(Json(schedule))
}

pub(super) async fn disable_schedule(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<Value>> {
    let changed = state.scheduler.disable(&user_id).await?;
    let message = if changed {
        "analysis schedule disabled"
    } else {
        "analysis schedule already disabled"
    };
    Ok(Json(json!({ "message": message })))
}

pub(super) async fn run_analysis(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<AnalysisReport>> {
    let report = state.analyzer.analyze_user(&user_id, Utc::now()).await?;
    Ok(Json(report))
}

pub(super) async fn create_from_nlp(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(body): Json<NlpCommand>,
) -> Result<(StatusCode, Json<TaskDocument>)> {
    let task = state
        .nlp
        .create_from_command(&user_id, &body.command, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(TaskDocument::from(&task))))
}

pub(super) async fn insights(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<HabitMetrics>> {
    let tasks = state.tasks.list(&user_id).await?;
    Ok(Json(HabitMetrics::compute(&tasks, Utc::now())))
}
