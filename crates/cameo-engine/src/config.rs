use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cameo_contracts::normalize_base_url;

pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://127.0.0.1:8188";

/// Probed in order; the first live one wins.
pub const CANDIDATE_ENDPOINTS: &[&str] = &[
    "http://127.0.0.1:8188",
    "http://localhost:8188",
    "http://host.docker.internal:8188",
    "http://0.0.0.0:8188",
];

pub const DEFAULT_CLOUD_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ENHANCEMENT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationStage {
    pub label: String,
    pub delay: Duration,
}

impl SimulationStage {
    pub fn new(label: impl Into<String>, delay: Duration) -> Self {
        Self {
            label: label.into(),
            delay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_local_endpoint: String,
    pub candidate_endpoints: Vec<String>,
    pub discovery_probe_timeout: Duration,
    pub check_timeout: Duration,
    pub inventory_timeout: Duration,
    pub request_timeout: Duration,
    pub local_poll_interval: Duration,
    pub local_max_attempts: u32,
    pub cloud_api_base: String,
    pub cloud_api_key: Option<String>,
    pub cloud_poll_interval: Duration,
    pub download_timeout: Duration,
    pub enhancement_model: String,
    pub simulation_stages: Vec<SimulationStage>,
    pub allow_simulation: bool,
    pub artifact_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            candidate_endpoints: CANDIDATE_ENDPOINTS
                .iter()
                .map(|value| (*value).to_string())
                .collect(),
            discovery_probe_timeout: Duration::from_secs(1),
            check_timeout: Duration::from_secs(5),
            inventory_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            local_poll_interval: Duration::from_secs(2),
            local_max_attempts: 60,
            cloud_api_base: DEFAULT_CLOUD_API_BASE.to_string(),
            cloud_api_key: None,
            cloud_poll_interval: Duration::from_secs(10),
            download_timeout: Duration::from_secs(120),
            enhancement_model: DEFAULT_ENHANCEMENT_MODEL.to_string(),
            simulation_stages: vec![
                SimulationStage::new("queuing", Duration::from_millis(1000)),
                SimulationStage::new("processing", Duration::from_millis(1500)),
            ],
            allow_simulation: true,
            artifact_dir: env::temp_dir().join("cameo"),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `CAMEO_*` variables and the first non-empty API key.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env("CAMEO_LOCAL_ENGINE_URL") {
            config.default_local_endpoint = normalize_base_url(&url);
        }
        if let Some(base) = non_empty_env("CAMEO_CLOUD_API_BASE") {
            config.cloud_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(dir) = non_empty_env("CAMEO_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(flag) = non_empty_env("CAMEO_DISABLE_SIMULATION") {
            config.allow_simulation = !matches!(
                flag.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        config.cloud_api_key = cloud_api_key_from_env();
        config
    }

    pub fn simulation_delay(&self) -> Duration {
        self.simulation_stages.iter().map(|stage| stage.delay).sum()
    }
}

pub fn cloud_api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY")
        .or_else(|| non_empty_env("GOOGLE_API_KEY"))
        .or_else(|| non_empty_env("API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
