use std::sync::Arc;
use std::time::Duration;

use cameo_contracts::{normalize_base_url, Endpoint};
use tracing::{debug, info};

use super::prober::Probe;
use crate::config::EngineConfig;

/// Walks a fixed candidate list and returns the first live endpoint.
#[derive(Clone)]
pub struct EndpointDiscoverer {
    candidates: Arc<[String]>,
    prober: Arc<dyn Probe>,
    timeout: Duration,
}

impl EndpointDiscoverer {
    pub fn new(candidates: Vec<String>, prober: Arc<dyn Probe>, timeout: Duration) -> Self {
        let candidates: Vec<String> = candidates
            .iter()
            .map(|raw| normalize_base_url(raw))
            .filter(|value| !value.is_empty())
            .collect();
        Self {
            candidates: candidates.into(),
            prober,
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig, prober: Arc<dyn Probe>) -> Self {
        Self::new(
            config.candidate_endpoints.clone(),
            prober,
            config.discovery_probe_timeout,
        )
    }

    pub fn with_prober(mut self, prober: Arc<dyn Probe>) -> Self {
        self.prober = prober;
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub async fn discover(&self) -> Option<Endpoint> {
        for candidate in self.candidates.iter() {
            if self.prober.probe(candidate, self.timeout).await {
                info!(endpoint = %candidate, "discovered live local engine");
                return Some(Endpoint::checked(candidate, true));
            }
            debug!(endpoint = %candidate, "discovery candidate not live");
        }
        None
    }
}

impl std::fmt::Debug for EndpointDiscoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDiscoverer")
            .field("candidates", &self.candidates)
            .field("timeout", &self.timeout)
            .finish()
    }
}
