#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cameo_engine::{EngineConfig, SimulationStage};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const FAKE_API_KEY: &str = "test-key";
pub const OUTPUT_FILENAME: &str = "cameo_00001_.png";

/// Millisecond-scale timings so fallback paths finish quickly.
pub fn fast_config(endpoint: &str, candidates: &[&str]) -> EngineConfig {
    EngineConfig {
        default_local_endpoint: endpoint.to_string(),
        candidate_endpoints: candidates.iter().map(|value| value.to_string()).collect(),
        discovery_probe_timeout: Duration::from_millis(300),
        inventory_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(2),
        local_poll_interval: Duration::from_millis(10),
        local_max_attempts: 5,
        cloud_poll_interval: Duration::from_millis(10),
        simulation_stages: vec![
            SimulationStage::new("queuing", Duration::from_millis(1)),
            SimulationStage::new("processing", Duration::from_millis(1)),
        ],
        ..EngineConfig::default()
    }
}

/// An address nothing listens on.
pub fn unused_endpoint() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let port = listener.local_addr().expect("probe addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("fake server addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

#[derive(Default)]
pub struct ComfyState {
    pub models: Vec<String>,
    pub reject: Option<Value>,
    /// History polls that answer empty before outputs appear; `None` never finishes.
    pub ready_after: Option<u32>,
    pub submissions: Mutex<Vec<Value>>,
    pub history_polls: AtomicU32,
}

impl ComfyState {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|value| value.to_string()).collect(),
            ready_after: Some(1),
            ..Self::default()
        }
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.submissions
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

pub struct FakeComfy {
    pub base_url: String,
    pub state: Arc<ComfyState>,
}

impl FakeComfy {
    pub async fn start(state: ComfyState) -> Self {
        let state = Arc::new(state);
        let router = Router::new()
            .route("/object_info/{node}", get(object_info))
            .route("/prompt", post(queue_prompt))
            .route("/history/{id}", get(history))
            .with_state(state.clone());
        Self {
            base_url: serve(router).await,
            state,
        }
    }
}

async fn object_info(Path(node): Path<String>, State(state): State<Arc<ComfyState>>) -> Json<Value> {
    Json(json!({
        node: {
            "input": { "required": { "ckpt_name": [state.models, {}] } },
            "output": ["MODEL", "CLIP", "VAE"],
        }
    }))
}

async fn queue_prompt(State(state): State<Arc<ComfyState>>, Json(body): Json<Value>) -> Response {
    if let Ok(mut rows) = state.submissions.lock() {
        rows.push(body);
    }
    if let Some(reject) = state.reject.clone() {
        return (StatusCode::BAD_REQUEST, Json(reject)).into_response();
    }
    Json(json!({ "prompt_id": "job-1", "number": 0, "node_errors": {} })).into_response()
}

async fn history(Path(id): Path<String>, State(state): State<Arc<ComfyState>>) -> Json<Value> {
    let polls = state.history_polls.fetch_add(1, Ordering::SeqCst) + 1;
    match state.ready_after {
        Some(ready) if polls >= ready => Json(json!({
            id: {
                "outputs": {
                    "9": {
                        "images": [{ "filename": OUTPUT_FILENAME, "subfolder": "", "type": "output" }]
                    }
                }
            }
        })),
        _ => Json(json!({})),
    }
}

pub struct VeoState {
    pub base_url: String,
    /// Final operation body once polling completes; `{base}` in URIs is replaced.
    pub final_operation: Value,
    pub submit_failure: Option<(u16, Value)>,
    pub pending_polls: u32,
    pub submissions: Mutex<Vec<(String, Value)>>,
    pub polls: AtomicU32,
}

impl VeoState {
    pub fn submissions(&self) -> Vec<(String, Value)> {
        self.submissions
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

pub struct FakeVeo {
    pub base_url: String,
    pub state: Arc<VeoState>,
}

impl FakeVeo {
    pub async fn start(
        final_operation: Value,
        submit_failure: Option<(u16, Value)>,
        pending_polls: u32,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake veo");
        let base_url = format!("http://{}", listener.local_addr().expect("fake veo addr"));
        let rendered = serde_json::to_string(&final_operation)
            .expect("serialize operation")
            .replace("{base}", &base_url);
        let state = Arc::new(VeoState {
            base_url: base_url.clone(),
            final_operation: serde_json::from_str(&rendered).expect("reparse operation"),
            submit_failure,
            pending_polls,
            submissions: Mutex::new(Vec::new()),
            polls: AtomicU32::new(0),
        });
        let router = Router::new()
            .route("/models/{action}", post(predict_long_running))
            .route("/operations/{id}", get(operation))
            .route("/files/{id}", get(download))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self { base_url, state }
    }
}

async fn predict_long_running(
    Path(action): Path<String>,
    State(state): State<Arc<VeoState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if key != FAKE_API_KEY {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT",
                           "details": [{ "reason": "API_KEY_INVALID" }] }
            })),
        )
            .into_response();
    }
    if let Ok(mut rows) = state.submissions.lock() {
        rows.push((action, body));
    }
    if let Some((status, body)) = state.submit_failure.clone() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(body)).into_response();
    }
    Json(json!({ "name": "operations/op-1", "done": false })).into_response()
}

async fn operation(Path(id): Path<String>, State(state): State<Arc<VeoState>>) -> Json<Value> {
    let polls = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if polls > state.pending_polls {
        Json(state.final_operation.clone())
    } else {
        Json(json!({ "name": format!("operations/{id}"), "done": false }))
    }
}

async fn download(Query(query): Query<HashMap<String, String>>) -> Response {
    if query.get("key").map(String::as_str) != Some(FAKE_API_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }
    b"fake-mp4-bytes".to_vec().into_response()
}
