use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use cameo_contracts::{
    EngineMode, GenerationError, GenerationMode, GenerationRequest, GenerationResult, ImageAsset,
    MAX_REFERENCE_IMAGES,
};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::http::{error_chain_text, truncate_text};
use crate::provider::VideoProvider;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Hosted video generation through the long-running operation API.
#[derive(Debug, Clone)]
pub struct CloudEngineClient {
    http: HttpClient,
    api_base: String,
    api_key: Option<String>,
    poll_interval: Duration,
    request_timeout: Duration,
    download_timeout: Duration,
    artifact_dir: PathBuf,
}

impl CloudEngineClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            http: HttpClient::new(),
            api_base: config.cloud_api_base.trim_end_matches('/').to_string(),
            api_key: config.cloud_api_key.clone(),
            poll_interval: config.cloud_poll_interval,
            request_timeout: config.request_timeout,
            download_timeout: config.download_timeout,
            artifact_dir: config.artifact_dir.clone(),
        }
    }

    pub fn with_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.api_key.as_deref().ok_or_else(|| {
            GenerationError::InvalidCredentials(
                "no API key configured (set GEMINI_API_KEY, GOOGLE_API_KEY or API_KEY)".to_string(),
            )
        })
    }

    async fn submit(
        &self,
        model: &str,
        payload: &Value,
        api_key: &str,
    ) -> Result<Value, GenerationError> {
        let url = format!("{}/models/{}:predictLongRunning", self.api_base, model);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| transport_error("submit", &err))?;
        cloud_json("submit", response).await
    }

    /// Polls until `done`; the service's own error signaling is the only bound.
    async fn wait_for_operation(
        &self,
        mut operation: Value,
        api_key: &str,
    ) -> Result<Value, GenerationError> {
        let name = operation
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let mut attempt: u32 = 0;
        while !operation.get("done").and_then(Value::as_bool).unwrap_or(false) {
            let Some(name) = name.as_deref() else {
                return Err(GenerationError::Protocol(
                    "cloud operation missing name".to_string(),
                ));
            };
            tokio::time::sleep(self.poll_interval).await;
            attempt += 1;
            let response = self
                .http
                .get(format!("{}/{}", self.api_base, name))
                .header(API_KEY_HEADER, api_key)
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(|err| transport_error("poll", &err))?;
            operation = cloud_json("poll", response).await?;
            debug!(operation = name, attempt, "polled cloud operation");
        }
        if let Some(error) = operation.get("error").filter(|value| !value.is_null()) {
            return Err(classify_operation_error(error));
        }
        operation
            .get("response")
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| {
                GenerationError::EmptyResult(
                    "Video generation finished but no video was returned.".to_string(),
                )
            })
    }

    async fn fetch_artifact(&self, uri: &str, api_key: &str) -> Result<PathBuf, GenerationError> {
        let mut url = Url::parse(uri).map_err(|err| {
            GenerationError::ArtifactFetch(format!("invalid video locator '{uri}': {err}"))
        })?;
        url.query_pairs_mut().append_pair("key", api_key);
        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|err| GenerationError::ArtifactFetch(error_chain_text(&err, 256)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::ArtifactFetch(format!(
                "Failed to fetch video: {}",
                status
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GenerationError::ArtifactFetch(error_chain_text(&err, 256)))?;

        tokio::fs::create_dir_all(&self.artifact_dir)
            .await
            .map_err(|err| {
                GenerationError::ArtifactFetch(format!(
                    "failed to create {}: {err}",
                    self.artifact_dir.display()
                ))
            })?;
        let path = self
            .artifact_dir
            .join(format!("cameo-{}.mp4", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&path, &bytes).await.map_err(|err| {
            GenerationError::ArtifactFetch(format!("failed to write {}: {err}", path.display()))
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "downloaded cloud artifact");
        Ok(path)
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let api_key = self.api_key()?;
        let model = request.cloud_model.id();
        let payload = build_payload(request, prompt);
        info!(model, mode = ?request.mode, "submitting cloud generation");

        let operation = self.submit(model, &payload, api_key).await?;
        let response = self.wait_for_operation(operation, api_key).await?;
        let uri = first_video_uri(&response)?;
        let path = self.fetch_artifact(&uri, api_key).await?;
        let url = Url::from_file_path(&path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| path.display().to_string());
        Ok(GenerationResult::new(url, prompt, EngineMode::Direct).with_model(model))
    }
}

#[async_trait]
impl VideoProvider for CloudEngineClient {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        CloudEngineClient::generate(self, request, prompt).await
    }
}

/// Request body for one operation; shape depends on the request mode.
pub fn build_payload(request: &GenerationRequest, prompt: &str) -> Value {
    let mut instance = Map::new();
    instance.insert("prompt".to_string(), Value::String(prompt.to_string()));
    match request.mode {
        GenerationMode::Text => {}
        GenerationMode::Frames => {
            if let Some(start) = request.start_frame.as_ref() {
                instance.insert("image".to_string(), inline_image(start));
            }
            let end = if request.looping {
                request.start_frame.as_ref()
            } else {
                request.end_frame.as_ref()
            };
            if let Some(end) = end {
                instance.insert("lastFrame".to_string(), inline_image(end));
            }
        }
        GenerationMode::References => {
            if request.reference_images.len() > MAX_REFERENCE_IMAGES {
                warn!(
                    supplied = request.reference_images.len(),
                    kept = MAX_REFERENCE_IMAGES,
                    "dropping extra reference images"
                );
            }
            let mut references: Vec<Value> = request
                .reference_images
                .iter()
                .take(MAX_REFERENCE_IMAGES)
                .map(|image| json!({ "image": inline_image(image), "referenceType": "asset" }))
                .collect();
            if let Some(style) = request.style_image.as_ref() {
                references.push(json!({ "image": inline_image(style), "referenceType": "style" }));
            }
            if !references.is_empty() {
                instance.insert("referenceImages".to_string(), Value::Array(references));
            }
        }
    }
    json!({
        "instances": [Value::Object(instance)],
        "parameters": {
            "aspectRatio": request.aspect_ratio.as_str(),
            "resolution": request.resolution.as_str(),
            "sampleCount": 1,
        },
    })
}

fn inline_image(image: &ImageAsset) -> Value {
    json!({
        "bytesBase64Encoded": image.to_base64(),
        "mimeType": image.mime_type,
    })
}

fn first_video_uri(response: &Value) -> Result<String, GenerationError> {
    let videos = response
        .get("generatedVideos")
        .or_else(|| {
            response
                .get("generateVideoResponse")
                .and_then(|row| row.get("generatedSamples"))
        })
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| GenerationError::EmptyResult("No videos were generated.".to_string()))?;
    videos[0]
        .get("video")
        .and_then(|video| video.get("uri"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::EmptyResult("Generated video is missing a URI.".to_string())
        })
}

fn transport_error(stage: &str, err: &reqwest::Error) -> GenerationError {
    GenerationError::Service {
        service: format!("cloud {stage}"),
        status: 0,
        message: error_chain_text(err, 512),
    }
}

async fn cloud_json(stage: &str, response: Response) -> Result<Value, GenerationError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| transport_error(stage, &err))?;
    if !status.is_success() {
        return Err(classify_http_failure(stage, status, &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        GenerationError::Protocol(format!("cloud {stage} returned invalid JSON payload: {err}"))
    })
}

fn classify_http_failure(stage: &str, status: StatusCode, body: &str) -> GenerationError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));
    let message = error
        .and_then(|row| row.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_text(body.trim(), 512));
    let service_status = error
        .and_then(|row| row.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let key_rejected = error
        .and_then(|row| row.get("details"))
        .and_then(Value::as_array)
        .is_some_and(|details| {
            details.iter().any(|detail| {
                detail.get("reason").and_then(Value::as_str) == Some("API_KEY_INVALID")
            })
        });

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || key_rejected
        || matches!(service_status, "UNAUTHENTICATED" | "PERMISSION_DENIED")
    {
        return GenerationError::InvalidCredentials(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || service_status == "RESOURCE_EXHAUSTED" {
        return GenerationError::Quota(message);
    }
    GenerationError::Service {
        service: format!("cloud {stage}"),
        status: status.as_u16(),
        message,
    }
}

fn classify_operation_error(error: &Value) -> GenerationError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("Video generation failed.")
        .to_string();
    let status = error.get("status").and_then(Value::as_str).unwrap_or("");
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    match (status, code) {
        ("PERMISSION_DENIED" | "UNAUTHENTICATED", _) | (_, 7 | 16) => {
            GenerationError::InvalidCredentials(message)
        }
        ("RESOURCE_EXHAUSTED", _) | (_, 8) => GenerationError::Quota(message),
        _ => GenerationError::Operation(message),
    }
}
