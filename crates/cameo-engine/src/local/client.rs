use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cameo_contracts::endpoint::join_url;
use cameo_contracts::models::{resolve_model, ModelInventory, CHECKPOINT_LOADER_NODE};
use cameo_contracts::workflow::{JobGraph, JobHandle, WorkflowTemplate, MAX_SEED};
use cameo_contracts::{
    normalize_base_url, EngineMode, GenerationError, GenerationRequest, GenerationResult,
};
use reqwest::{Client as HttpClient, Url};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::http::{error_chain_text, truncate_text};
use crate::provider::VideoProvider;

/// Output list keys scanned in each history node, in priority order.
const ARTIFACT_KEYS: &[&str] = &["images", "gifs", "videos"];

/// A file the local engine wrote for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub node_id: String,
    pub filename: String,
    pub subfolder: Option<String>,
    pub folder_type: Option<String>,
}

impl ArtifactRef {
    pub fn view_url(&self, endpoint: &str) -> Result<String, GenerationError> {
        let mut url = Url::parse(&join_url(endpoint, "view")).map_err(|err| {
            GenerationError::Protocol(format!("invalid local engine URL '{endpoint}': {err}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("filename", &self.filename);
            if let Some(subfolder) = self.subfolder.as_deref() {
                query.append_pair("subfolder", subfolder);
            }
            if let Some(folder_type) = self.folder_type.as_deref() {
                query.append_pair("type", folder_type);
            }
        }
        Ok(url.to_string())
    }
}

/// Talks to one ComfyUI-style server: inventory, queue, history, view.
#[derive(Debug, Clone)]
pub struct LocalEngineClient {
    http: HttpClient,
    template: Arc<WorkflowTemplate>,
    default_endpoint: String,
    inventory_timeout: Duration,
    request_timeout: Duration,
    poll_interval: Duration,
    max_attempts: u32,
}

impl LocalEngineClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            http: HttpClient::new(),
            template: Arc::new(WorkflowTemplate::text_to_image()),
            default_endpoint: normalize_base_url(&config.default_local_endpoint),
            inventory_timeout: config.inventory_timeout,
            request_timeout: config.request_timeout,
            poll_interval: config.local_poll_interval,
            max_attempts: config.local_max_attempts.max(1),
        }
    }

    pub fn with_template(mut self, template: Arc<WorkflowTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn with_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn default_endpoint(&self) -> &str {
        &self.default_endpoint
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    /// Any failure to obtain a list means the endpoint is unusable.
    pub async fn fetch_inventory(&self, endpoint: &str) -> Result<ModelInventory, GenerationError> {
        self.fetch_inventory_with_timeout(endpoint, self.inventory_timeout)
            .await
    }

    pub async fn fetch_inventory_with_timeout(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<ModelInventory, GenerationError> {
        let url = join_url(endpoint, &format!("object_info/{CHECKPOINT_LOADER_NODE}"));
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| GenerationError::connection(endpoint, error_chain_text(&err, 256)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::connection(
                endpoint,
                format!("model inventory request returned {}", status.as_u16()),
            ));
        }
        let payload: Value = response.json().await.map_err(|err| {
            GenerationError::connection(
                endpoint,
                format!("model inventory unreadable: {}", error_chain_text(&err, 256)),
            )
        })?;
        Ok(ModelInventory::from_object_info(&payload))
    }

    pub async fn submit(
        &self,
        endpoint: &str,
        graph: &JobGraph,
    ) -> Result<JobHandle, GenerationError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let body = json!({
            "client_id": client_id,
            "prompt": graph,
        });
        let response = self
            .http
            .post(join_url(endpoint, "prompt"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::connection(endpoint, error_chain_text(&err, 256)))?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| GenerationError::connection(endpoint, error_chain_text(&err, 256)))?;
        let payload = serde_json::from_str::<Value>(&raw).ok();
        if !status.is_success() {
            let message = payload
                .as_ref()
                .and_then(submission_error_message)
                .unwrap_or_else(|| format!("Failed to queue prompt: {}", status.as_u16()));
            return Err(GenerationError::Queue(message));
        }
        let prompt_id = payload
            .as_ref()
            .and_then(|value| value.get("prompt_id"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::Queue(format!(
                    "queue response missing prompt_id: {}",
                    truncate_text(&raw, 256)
                ))
            })?;
        info!(endpoint, prompt_id = %prompt_id, "queued job graph");
        Ok(JobHandle::new(prompt_id, client_id))
    }

    /// Sleeps, then reads history; first artifact seen wins.
    pub async fn wait_for_artifact(
        &self,
        endpoint: &str,
        handle: &JobHandle,
    ) -> Result<ArtifactRef, GenerationError> {
        let url = join_url(endpoint, &format!("history/{}", handle.id));
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .http
                .get(&url)
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(|err| GenerationError::connection(endpoint, error_chain_text(&err, 256)))?;
            if !response.status().is_success() {
                debug!(endpoint, attempt, status = response.status().as_u16(), "history not ready");
                continue;
            }
            let history = match response.json::<Value>().await {
                Ok(value) => value,
                Err(err) => {
                    debug!(endpoint, attempt, error = %err, "history unreadable");
                    continue;
                }
            };
            if let Some(artifact) = first_artifact(&history, &handle.id) {
                debug!(endpoint, attempt, filename = %artifact.filename, "artifact ready");
                return Ok(artifact);
            }
        }
        Err(GenerationError::Timeout {
            attempts: self.max_attempts,
        })
    }

    pub async fn generate(
        &self,
        endpoint: &str,
        prompt: &str,
        model_hint: Option<&str>,
        gpu_enabled: bool,
        seed: Option<u64>,
    ) -> Result<GenerationResult, GenerationError> {
        let endpoint = normalize_base_url(endpoint);
        let inventory = self.fetch_inventory(&endpoint).await?;
        let Some(resolution) = resolve_model(model_hint, &inventory) else {
            return Err(GenerationError::NoModels { endpoint });
        };
        if resolution.is_substitution() {
            warn!(
                endpoint = %endpoint,
                requested = resolution.requested.as_deref().unwrap_or(""),
                model = %resolution.model,
                "requested checkpoint not installed"
            );
        }
        let seed = seed.map(|value| value % MAX_SEED).unwrap_or_else(random_seed);
        info!(endpoint = %endpoint, model = %resolution.model, seed, gpu_enabled, "generating on local engine");

        let graph = self.template.build(prompt, &resolution.model, seed);
        let handle = self.submit(&endpoint, &graph).await?;
        let artifact = self.wait_for_artifact(&endpoint, &handle).await?;

        let mut result = GenerationResult::new(artifact.view_url(&endpoint)?, prompt, EngineMode::Direct)
            .with_model(resolution.model);
        if let Some(reason) = resolution.fallback_reason {
            result = result.with_fallback_reason(reason);
        }
        Ok(result)
    }
}

#[async_trait]
impl VideoProvider for LocalEngineClient {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let endpoint = request
            .local_endpoint
            .as_deref()
            .unwrap_or(&self.default_endpoint);
        LocalEngineClient::generate(
            self,
            endpoint,
            prompt,
            request.model_hint.as_deref(),
            request.gpu_enabled,
            request.seed,
        )
        .await
    }
}

fn random_seed() -> u64 {
    (uuid::Uuid::new_v4().as_u128() % u128::from(MAX_SEED)) as u64
}

/// First node error, then the top-level error, from a rejected submission.
fn submission_error_message(payload: &Value) -> Option<String> {
    let from_nodes = payload
        .get("node_errors")
        .and_then(Value::as_object)
        .and_then(|nodes| nodes.values().next())
        .and_then(|node| node.get("errors"))
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|error| {
            let message = error.get("message").and_then(Value::as_str)?.trim();
            let details = error
                .get("details")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or("");
            if details.is_empty() {
                Some(message.to_string())
            } else {
                Some(format!("{message}: {details}"))
            }
        });
    if from_nodes.is_some() {
        return from_nodes;
    }
    let from_error = match payload.get("error")? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Object(row) => row
            .get("message")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string()),
        _ => None,
    };
    from_error.filter(|text| !text.is_empty())
}

fn first_artifact(history: &Value, prompt_id: &str) -> Option<ArtifactRef> {
    let outputs = history.get(prompt_id)?.get("outputs")?.as_object()?;
    for (node_id, output) in outputs {
        for key in ARTIFACT_KEYS {
            let Some(first) = output
                .get(*key)
                .and_then(Value::as_array)
                .and_then(|items| items.first())
            else {
                continue;
            };
            let Some(filename) = first
                .get("filename")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
            else {
                continue;
            };
            let text_field = |field: &str| {
                first
                    .get(field)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            return Some(ArtifactRef {
                node_id: node_id.clone(),
                filename: filename.to_string(),
                subfolder: text_field("subfolder"),
                folder_type: text_field("type"),
            });
        }
    }
    None
}
