//! Contract tests for the push and email HTTP notifiers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskpulse::config::{EmailConfig, PushConfig};
use taskpulse::notify::email::HttpEmailNotifier;
use taskpulse::notify::fcm::FcmPushNotifier;
use taskpulse::notify::{EmailMessage, EmailNotifier, PushMessage, PushNotifier};
use taskpulse::AppError;

fn push_message() -> PushMessage {
    let mut data = BTreeMap::new();
    data.insert("taskId".to_owned(), "t1".to_owned());
    PushMessage {
        token: "device-1".into(),
        title: "Task Reminder".into(),
        body: "Reminder: Pay rent is due soon!".into(),
        data,
    }
}

fn email_message() -> EmailMessage {
    EmailMessage {
        to: "ada@example.com".into(),
        subject: "Reminder: Pay rent".into(),
        text: "Reminder: Pay rent is due soon!".into(),
        html: None,
    }
}

fn fcm(server: &MockServer) -> FcmPushNotifier {
    FcmPushNotifier::from_config(&PushConfig {
        endpoint: server.uri(),
        project_id: "p1".into(),
        timeout_seconds: 1,
        access_token: "oauth-token".into(),
    })
    .expect("push client")
}

fn relay(server: &MockServer, api_key: &str) -> HttpEmailNotifier {
    HttpEmailNotifier::from_config(&EmailConfig {
        endpoint: format!("{}/send", server.uri()),
        from_address: "reminders@example.com".into(),
        timeout_seconds: 1,
        api_key: api_key.into(),
    })
    .expect("email client")
}

// ── Push ────────────────────────────────────────────

#[tokio::test]
async fn fcm_posts_message_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/messages:send"))
        .and(header("authorization", "Bearer oauth-token"))
        .and(body_json(json!({
            "message": {
                "token": "device-1",
                "notification": {
                    "title": "Task Reminder",
                    "body": "Reminder: Pay rent is due soon!",
                },
                "data": { "taskId": "t1" },
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "m1" })))
        .expect(1)
        .mount(&server)
        .await;

    fcm(&server).send(push_message()).await.expect("delivered");
}

#[tokio::test]
async fn fcm_rejection_maps_to_notify_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/messages:send"))
        .respond_with(ResponseTemplate::new(404).set_body_string("UNREGISTERED"))
        .mount(&server)
        .await;

    let err = fcm(&server).send(push_message()).await.unwrap_err();
    assert!(matches!(err, AppError::Notify(msg) if msg.contains("UNREGISTERED")));
}

// ── Email ───────────────────────────────────────────

#[tokio::test]
async fn relay_receives_sender_and_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer relay-key"))
        .and(body_partial_json(json!({
            "from": "reminders@example.com",
            "to": "ada@example.com",
            "subject": "Reminder: Pay rent",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    relay(&server, "relay-key")
        .send(email_message())
        .await
        .expect("accepted");
}

#[tokio::test]
async fn relay_without_key_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    relay(&server, "").send(email_message()).await.expect("accepted");
}

#[tokio::test]
async fn relay_failure_maps_to_notify_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = relay(&server, "k").send(email_message()).await.unwrap_err();
    assert!(matches!(err, AppError::Notify(_)));
}

// ── Timeouts ────────────────────────────────────────

#[tokio::test]
async fn hanging_relay_times_out_as_notify_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let notifier = relay(&server, "k");
    let outcome = tokio::time::timeout(Duration::from_secs(4), notifier.send(email_message()))
        .await
        .expect("send bounded by the client timeout");
    assert!(matches!(outcome, Err(AppError::Notify(msg)) if msg.contains("timed out")));
}

#[tokio::test]
async fn hanging_fcm_times_out_as_notify_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/messages:send"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let notifier = fcm(&server);
    let outcome = tokio::time::timeout(Duration::from_secs(4), notifier.send(push_message()))
        .await
        .expect("send bounded by the client timeout");
    assert!(matches!(outcome, Err(AppError::Notify(msg)) if msg.contains("timed out")));
}
