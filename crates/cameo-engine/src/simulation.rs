use reqwest::Url;
use tracing::info;

use cameo_contracts::{EngineMode, GenerationResult};

use crate::config::{EngineConfig, SimulationStage};

pub const SAMPLE_VIDEOS: &[&str] = &[
    "https://storage.googleapis.com/sideprojects-asronline/veo-cameos/cameo-alisa.mp4",
    "https://storage.googleapis.com/sideprojects-asronline/veo-cameos/cameo-omar.mp4",
    "https://storage.googleapis.com/sideprojects-asronline/veo-cameos/cameo-ammaar.mp4",
];

/// Terminal fallback: waits through fake stages and hands back a sample clip.
#[derive(Debug, Clone)]
pub struct SimulationBackend {
    stages: Vec<SimulationStage>,
    samples: Vec<String>,
}

impl SimulationBackend {
    pub fn new(stages: Vec<SimulationStage>, samples: Vec<String>) -> Self {
        let samples = if samples.is_empty() {
            SAMPLE_VIDEOS.iter().map(|value| (*value).to_string()).collect()
        } else {
            samples
        };
        Self { stages, samples }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.simulation_stages.clone(), Vec::new())
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Never fails.
    pub async fn generate(&self, prompt: &str) -> GenerationResult {
        for stage in &self.stages {
            info!(stage = %stage.label, "simulated generation");
            tokio::time::sleep(stage.delay).await;
        }
        let index = (uuid::Uuid::new_v4().as_u128() % self.samples.len() as u128) as usize;
        let url = tag_simulated(&self.samples[index], prompt);
        GenerationResult::new(url, prompt, EngineMode::Simulated)
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

fn tag_simulated(sample: &str, prompt: &str) -> String {
    match Url::parse(sample) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("simulated", "true")
                .append_pair("prompt", prompt);
            url.to_string()
        }
        Err(_) => format!("{sample}?simulated=true"),
    }
}
