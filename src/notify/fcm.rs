//! Firebase Cloud Messaging HTTP v1 push notifier.

use std::future::Future;
use std::pin::Pin;

use serde_json::json;
use tracing::debug;

use crate::config::PushConfig;
use crate::{AppError, Result};

use super::{PushMessage, PushNotifier};

/// Push notifier posting to `projects/{id}/messages:send`.
#[derive(Clone)]
pub struct FcmPushNotifier {
    http: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl FcmPushNotifier {
    /// Build a notifier from configuration. The timeout bounds every send.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &PushConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build push client: {err}")))?;
        Ok(Self {
            http,
            send_url: format!(
                "{}/projects/{}/messages:send",
                config.endpoint.trim_end_matches('/'),
                config.project_id
            ),
            access_token: config.access_token.clone(),
        })
    }
}

impl PushNotifier for FcmPushNotifier {
    fn send(&self, message: PushMessage) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let body = json!({
                "message": {
                    "token": message.token,
                    "notification": {
                        "title": message.title,
                        "body": message.body,
                    },
                    "data": message.data,
                }
            });

            let response = self
                .http
                .post(&self.send_url)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        AppError::Notify("push request timed out".into())
                    } else {
                        AppError::Notify(format!("push request failed: {err}"))
                    }
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Notify(format!("push rejected ({status}): {body}")));
            }

            debug!("push notification accepted");
            Ok(())
        })
    }
}
