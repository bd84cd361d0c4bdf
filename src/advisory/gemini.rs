//! Gemini `generateContent` client implementing both model contracts.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::AdvisoryConfig;
use crate::models::advisory::Advisory;
use crate::{AppError, Result};

use super::contract::parse_advisory;
use super::drafter::{parse_draft, TaskDraft, TaskDrafter};
use super::{AdvisoryClient, AdvisoryRequest};

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Sampling parameters for one call.
struct Generation {
    max_output_tokens: u32,
    temperature: f32,
}

const ANALYSIS: Generation = Generation {
    max_output_tokens: 500,
    temperature: 0.6,
};

const DRAFTING: Generation = Generation {
    max_output_tokens: 300,
    temperature: 0.3,
};

/// HTTP client for the Gemini generative language API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client from configuration. The timeout bounds every call.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &AdvisoryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build advisory client: {err}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn generate(&self, prompt: &str, generation: &Generation) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": generation.max_output_tokens,
                "temperature": generation.temperature,
                "topP": 0.95,
            },
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Advisory(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Advisory(format!(
                "generateContent failed ({status}): {body}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| AppError::Advisory(format!("malformed response body: {err}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::Advisory("empty model response".into()));
        }
        debug!(model = %self.model, len = text.len(), "model response received");
        Ok(text)
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn analysis_prompt(request: &AdvisoryRequest) -> String {
    format!(
        "Analyze this task and return only a JSON object with priority/status recommendations:
Task: {title}
Description: {description}
Current Priority: {priority}
Current Status: {status}
Due Date: {due}
Reference Date: {reference}

Required JSON format:
{{
  \"newPriority\": \"Low\" | \"Medium\" | \"High\" | \"Completed\",
  \"newStatus\": \"Pending\" | \"In-progress\" | \"Completed\",
  \"reason\": \"string explanation\"
}}

Rules:
- If due date < reference date, set priority=\"High\" and status=\"Pending\"
- Explain any changes in the reason field
- Return only the JSON object, no other text",
        title = request.title,
        description = request
            .description
            .as_deref()
            .unwrap_or("No description provided"),
        priority = request.priority.as_str(),
        status = request.status.as_str(),
        due = iso(request.due_date),
        reference = iso(request.reference_time),
    )
}

fn drafting_prompt(command: &str, reference_time: DateTime<Utc>) -> String {
    format!(
        "Convert this command into a JSON task object. Return ONLY valid JSON without any explanation or additional text:
Command: {command}

JSON format:
{{
  \"title\": \"clear title\",
  \"description\": \"detailed description\",
  \"priority\": \"Low\" | \"Medium\" | \"High\",
  \"dueDate\": \"ISO date string\",
  \"reminderTime\": \"ISO date string\"
}}

Time handling:
1. Use {reference} (UTC) as the reference for today's date
2. Use the exact hour given in the command; do not convert time zones
3. If no time is given, use 23:59 of that day",
        reference = iso(reference_time),
    )
}

impl AdvisoryClient for GeminiClient {
    fn evaluate(
        &self,
        request: AdvisoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Advisory>> + Send + '_>> {
        Box::pin(async move {
            let text = self.generate(&analysis_prompt(&request), &ANALYSIS).await?;
            parse_advisory(&text)
        })
    }
}

impl TaskDrafter for GeminiClient {
    fn draft(
        &self,
        command: String,
        reference_time: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<TaskDraft>> + Send + '_>> {
        Box::pin(async move {
            let text = self
                .generate(&drafting_prompt(&command, reference_time), &DRAFTING)
                .await?;
            parse_draft(&text)
        })
    }
}
