//! User endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::user::User;
use crate::{AppError, Result};

use super::{AppState, CallerId};

#[derive(Deserialize)]
pub(super) struct RegisterUser {
    username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PushTokenUpdate {
    push_token: String,
}

pub(super) async fn register(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(body): Json<RegisterUser>,
) -> Result<Json<User>> {
    let user = User::new(&user_id, &body.username, body.email)?;
    let user = state.users.upsert(&user).await?;
    Ok(Json(user))
}

pub(super) async fn me(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
) -> Result<Json<User>> {
    let user = state
        .users
        .get_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(user))
}

pub(super) async fn update_push_token(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(body): Json<PushTokenUpdate>,
) -> Result<Json<Value>> {
    let token = body.push_token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("pushToken is required".into()));
    }
    state
        .users
        .update_push_token(&user_id, token, Utc::now())
        .await?;
    Ok(Json(json!({ "message": "push token updated" })))
}
