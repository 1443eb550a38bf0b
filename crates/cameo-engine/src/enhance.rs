use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cameo_contracts::templates::enhancement_instruction;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::http::response_json_or_error;

/// Rewrites a prompt in a named style. Callers treat any error as "keep the
/// original prompt".
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    async fn enhance(&self, prompt: &str, template_id: &str) -> Result<String>;
}

/// Leaves every prompt untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnhancer;

#[async_trait]
impl PromptEnhancer for NoopEnhancer {
    async fn enhance(&self, prompt: &str, _template_id: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// Sends the template instruction plus prompt to a text model.
#[derive(Debug, Clone)]
pub struct GeminiPromptEnhancer {
    http: HttpClient,
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl GeminiPromptEnhancer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            http: HttpClient::new(),
            api_base: config.cloud_api_base.trim_end_matches('/').to_string(),
            api_key: config.cloud_api_key.clone(),
            model: config.enhancement_model.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl PromptEnhancer for GeminiPromptEnhancer {
    async fn enhance(&self, prompt: &str, template_id: &str) -> Result<String> {
        let Some(instruction) = enhancement_instruction(template_id, prompt) else {
            debug!(template_id, "unknown prompt template; leaving prompt as-is");
            return Ok(prompt.to_string());
        };
        let api_key = self
            .api_key
            .as_deref()
            .context("prompt enhancement needs an API key")?;
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(&json!({ "contents": [{ "parts": [{ "text": instruction }] }] }))
            .send()
            .await
            .with_context(|| format!("prompt enhancement request failed ({url})"))?;
        let payload = response_json_or_error("prompt enhancement", response).await?;
        Ok(reply_text(&payload).unwrap_or_else(|| prompt.to_string()))
    }
}

fn reply_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
