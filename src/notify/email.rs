//! Email notifier backed by a JSON mail relay.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tracing::debug;

use crate::config::EmailConfig;
use crate::{AppError, Result};

use super::{EmailMessage, EmailNotifier};

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

/// Posts each email as one JSON document to the relay endpoint.
#[derive(Clone)]
pub struct HttpEmailNotifier {
    http: reqwest::Client,
    endpoint: String,
    from_address: String,
    api_key: String,
}

impl HttpEmailNotifier {
    /// Build a notifier from configuration. The timeout bounds every send.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build email client: {err}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            from_address: config.from_address.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl EmailNotifier for HttpEmailNotifier {
    fn send(
        &self,
        message: EmailMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let request = RelayRequest {
                from: &self.from_address,
                to: &message.to,
                subject: &message.subject,
                text: &message.text,
                html: message.html.as_deref(),
            };

            let mut builder = self.http.post(&self.endpoint).json(&request);
            if !self.api_key.is_empty() {
                builder = builder.bearer_auth(&self.api_key);
            }
            let response = builder
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        AppError::Notify("email relay timed out".into())
                    } else {
                        AppError::Notify(format!("email request failed: {err}"))
                    }
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Notify(format!("email rejected ({status}): {body}")));
            }

            debug!("email accepted by relay");
            Ok(())
        })
    }
}
