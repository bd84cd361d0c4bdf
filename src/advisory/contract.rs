//! Strict validation of model output.
//!
//! Models wrap their JSON in prose or code fences. The extractor tries the
//! whole text first, then the outermost braces, then the longest flat
//! `{...}` span.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::advisory::Advisory;
use crate::models::task::{PriorityLevel, TaskStatus};
use crate::{AppError, Result};

static FLAT_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*?\}").ok());

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationWire {
    new_priority: String,
    new_status: String,
    reason: String,
}

/// Deserialize the first JSON object found in `text`.
///
/// # Errors
///
/// Returns `AppError::Advisory` if no candidate parses as `T`.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    let longest = FLAT_OBJECT
        .as_ref()
        .and_then(|pattern| pattern.find_iter(trimmed).max_by_key(|m| m.as_str().len()))
        .ok_or_else(|| AppError::Advisory("no JSON object found in response".into()))?;

    serde_json::from_str(longest.as_str())
        .map_err(|err| AppError::Advisory(format!("invalid JSON in response: {err}")))
}

/// Validate a raw recommendation response.
///
/// `newPriority`, `newStatus` and `reason` are all required; priority and
/// status must be known values that agree about completion.
///
/// # Errors
///
/// Returns `AppError::Advisory` on any contract violation.
pub fn parse_advisory(text: &str) -> Result<Advisory> {
    let wire: RecommendationWire = extract_json(text)?;

    let priority = PriorityLevel::parse(&wire.new_priority).ok_or_else(|| {
        AppError::Advisory(format!("unknown newPriority {:?}", wire.new_priority))
    })?;
    let status = TaskStatus::parse(&wire.new_status)
        .ok_or_else(|| AppError::Advisory(format!("unknown newStatus {:?}", wire.new_status)))?;

    Advisory::from_levels(priority, status, wire.reason.trim())
}
