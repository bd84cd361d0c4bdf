//! Integration tests for the task API over HTTP.
//!
//! Validates:
//! - caller identity is required
//! - error variants map to status codes with a `message` body
//! - task lifecycle through the endpoints
//! - user registration, push token, schedule and insights endpoints

use chrono::{Duration, SecondsFormat, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::health_endpoint_tests::spawn_server;
use super::test_helpers::Harness;

fn due_in(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct Api {
    base: String,
    http: Client,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        user: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self
            .http
            .request(method, self.url(path))
            .header("x-user-id", user);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("request");
        let status = response.status();
        let text = response.text().await.expect("body");
        let value = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, value)
    }
}

async fn api(harness: &Harness) -> (Api, CancellationToken) {
    let (base, ct) = spawn_server(harness).await;
    (
        Api {
            base,
            http: Client::new(),
        },
        ct,
    )
}

// ── Authentication and error mapping ────────────────

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let harness = Harness::new().await;
    let (api, ct) = api(&harness).await;

    let response = api.http.get(api.url("/api/tasks")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("x-user-id"));

    ct.cancel();
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let harness = Harness::new().await;
    let (api, ct) = api(&harness).await;

    let (status, body) = api
        .send(
            Method::POST,
            "/api/tasks",
            "u1",
            Some(json!({ "title": "late", "dueDate": "2000-01-01T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("validation"));

    ct.cancel();
}

#[tokio::test]
async fn model_timeout_is_bad_gateway() {
    let harness = Harness::new().await;
    let (api, ct) = api(&harness).await;

    let (status, _) = api
        .send(
            Method::POST,
            "/api/nlp/create-from-nlp",
            "u1",
            Some(json!({ "command": "buy milk tomorrow" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    ct.cancel();
}

// ── Task lifecycle ──────────────────────────────────

#[tokio::test]
async fn task_lifecycle_over_http() {
    let harness = Harness::new().await;
    let (api, ct) = api(&harness).await;

    let (status, created) = api
        .send(
            Method::POST,
            "/api/tasks",
            "u1",
            Some(json!({ "title": "Pay rent", "priority": "High", "dueDate": due_in(3) })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["priority"], "High");
    assert_eq!(created["status"], "Pending");
    assert_eq!(created["completed"], false);
    assert_eq!(created["retouchedByAI"], false);
    let id = created["id"].as_str().unwrap().to_owned();

    let (status, listed) = api.send(Method::GET, "/api/tasks", "u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = api
        .send(Method::GET, &format!("/api/tasks/{id}"), "u2", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, patched) = api
        .send(
            Method::PATCH,
            &format!("/api/tasks/{id}"),
            "u1",
            Some(json!({ "status": "In-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], "In-progress");

    let (status, done) = api
        .send(Method::POST, &format!("/api/tasks/{id}/complete"), "u1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["priority"], "Completed");
    assert_eq!(done["previousPriority"], "High");

    let (status, reopened) = api
        .send(Method::POST, &format!("/api/tasks/{id}/incomplete"), "u1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["priority"], "High");
    assert_eq!(reopened["priorityLogs"].as_array().unwrap().len(), 2);

    let (status, _) = api
        .send(Method::DELETE, &format!("/api/tasks/{id}"), "u2", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api
        .send(Method::DELETE, &format!("/api/tasks/{id}"), "u1", None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = api
        .send(Method::GET, &format!("/api/tasks/{id}"), "u1", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ct.cancel();
}

// ── Users, schedule and insights ────────────────────

#[tokio::test]
async fn user_registration_and_push_token() {
    let harness = Harness::new().await;
    let (api, ct) = api(&harness).await;

    let (status, _) = api.send(Method::GET, "/api/users/me", "u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, user) = api
        .send(
            Method::POST,
            "/api/users",
            "u1",
            Some(json!({ "username": "Ada", "email": "ada@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "ada@example.com");

    let (status, _) = api
        .send(
            Method::PUT,
            "/api/users/push-token",
            "u1",
            Some(json!({ "pushToken": "  " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api
        .send(
            Method::PUT,
            "/api/users/push-token",
            "u1",
            Some(json!({ "pushToken": "device-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = api.send(Method::GET, "/api/users/me", "u1", None).await;
    assert_eq!(me["pushToken"], "device-1");
    assert_eq!(me["taskAnalysisSchedule"]["enabled"], false);

    ct.cancel();
}

#[tokio::test]
async fn schedule_toggle_and_insights() {
    let harness = Harness::new().await;
    harness.user("u1", None, None).await;
    let (api, ct) = api(&harness).await;

    let (status, schedule) = api
        .send(Method::POST, "/api/analysis/schedule", "u1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schedule["enabled"], true);
    assert_eq!(schedule["firstRunTime"].as_str().unwrap().len(), 5);

    let (status, body) = api
        .send(Method::DELETE, "/api/analysis/schedule", "u1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "analysis schedule disabled");

    let (status, _) = api
        .send(Method::POST, "/api/analysis/schedule", "ghost", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = api.send(Method::POST, "/api/analysis/run", "u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["evaluated"], 0);

    let (status, metrics) = api.send(Method::GET, "/api/insights", "u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["totalTasks"], 0);
    assert!(metrics["mostProductiveHour"].is_null());

    ct.cancel();
}
