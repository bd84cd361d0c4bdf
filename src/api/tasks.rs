//! Task endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::models::task::{NewTask, TaskDocument, TaskPatch};
use crate::Result;

use super::{AppState, CallerId};

pub(super) async fn create(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<TaskDocument>)> {
    let task = state.tasks.create(&user_id, input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(TaskDocument::from(&task))))
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<Vec<TaskDocument>>> {
    let tasks = state.tasks.list(&user_id).await?;
    Ok(Json(tasks.iter().map(TaskDocument::from).collect()))
}

pub(super) async fn get_one(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<Json<TaskDocument>> {
    let task = state.tasks.get(&user_id, &id).await?;
    Ok(Json(TaskDocument::from(&task)))
}

pub(super) async fn update(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<TaskDocument>> {
    let task = state.tasks.update(&user_id, &id, patch, Utc::now()).await?;
    Ok(Json(TaskDocument::from(&task)))
}

pub(super) async fn remove(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.tasks.delete(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn complete(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<Json<TaskDocument>> {
    let task = state.tasks.complete(&user_id, &id, Utc::now()).await?;
    Ok(Json(TaskDocument::from(&task)))
}

pub(super) async fn incomplete(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<Json<TaskDocument>> {
    let task = state.tasks.incomplete(&user_id, &id, Utc::now()).await?;
    Ok(Json(TaskDocument::from(&task)))
}
