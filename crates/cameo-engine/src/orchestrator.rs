use std::sync::Arc;

use cameo_contracts::{
    normalize_base_url, EngineKind, EngineMode, GenerationError, GenerationRequest,
    GenerationResult,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cloud::CloudEngineClient;
use crate::config::EngineConfig;
use crate::enhance::{GeminiPromptEnhancer, PromptEnhancer};
use crate::events::{EventKind, EventWriter};
use crate::local::{ConnectivityProber, EndpointDiscoverer, LocalEngineClient, Probe};
use crate::provider::VideoProvider;
use crate::simulation::SimulationBackend;

/// Routes one request to an engine and applies the local fallback chain:
/// direct endpoint, then a discovered endpoint, then simulation.
///
/// Holds no per-request state, so one instance serves concurrent `run` calls.
#[derive(Clone)]
pub struct Orchestrator {
    enhancer: Arc<dyn PromptEnhancer>,
    cloud: Arc<dyn VideoProvider>,
    local: LocalEngineClient,
    discoverer: EndpointDiscoverer,
    simulation: SimulationBackend,
    events: Option<EventWriter>,
    allow_simulation: bool,
}

impl Orchestrator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enhancer: Arc::new(GeminiPromptEnhancer::new(config)),
            cloud: Arc::new(CloudEngineClient::new(config)),
            local: LocalEngineClient::new(config),
            discoverer: EndpointDiscoverer::from_config(config, Arc::new(ConnectivityProber::new())),
            simulation: SimulationBackend::from_config(config),
            events: None,
            allow_simulation: config.allow_simulation,
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn with_cloud_provider(mut self, cloud: Arc<dyn VideoProvider>) -> Self {
        self.cloud = cloud;
        self
    }

    pub fn with_local_client(mut self, local: LocalEngineClient) -> Self {
        self.local = local;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Probe>) -> Self {
        self.discoverer = self.discoverer.with_prober(prober);
        self
    }

    pub fn with_discoverer(mut self, discoverer: EndpointDiscoverer) -> Self {
        self.discoverer = discoverer;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationBackend) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_allow_simulation(mut self, allow: bool) -> Self {
        self.allow_simulation = allow;
        self
    }

    pub fn local(&self) -> &LocalEngineClient {
        &self.local
    }

    pub fn discoverer(&self) -> &EndpointDiscoverer {
        &self.discoverer
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        let request_id = request.fingerprint();
        self.emit(
            EventKind::GenerationStarted,
            json!({
                "request": request_id,
                "engine": request.engine.as_str(),
                "template_id": request.template_id,
                "model_hint": request.model_hint,
            }),
        )
        .await;

        let prompt = self.final_prompt(request).await;
        let outcome = match request.engine {
            EngineKind::Cloud => self.cloud.generate(request, &prompt).await,
            EngineKind::Local => self.run_local(request, &prompt).await,
        };

        match &outcome {
            Ok(result) => {
                info!(request = %request_id, mode = %result.mode, "generation finished");
                self.emit(
                    EventKind::GenerationFinished,
                    json!({
                        "request": request_id,
                        "mode": result.mode.as_str(),
                        "url": result.url,
                        "model": result.model,
                        "fallback_reason": result.fallback_reason,
                    }),
                )
                .await;
            }
            Err(err) => {
                warn!(request = %request_id, error = %err, "generation failed");
                self.emit(
                    EventKind::GenerationFailed,
                    json!({
                        "request": request_id,
                        "kind": format!("{:?}", err.kind()),
                        "error": err.to_string(),
                    }),
                )
                .await;
            }
        }
        outcome
    }

    /// Best effort: any enhancer failure keeps the original prompt.
    async fn final_prompt(&self, request: &GenerationRequest) -> String {
        let Some(template_id) = request.template_id.as_deref() else {
            return request.prompt.clone();
        };
        match self.enhancer.enhance(&request.prompt, template_id).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => {
                let enhanced = enhanced.trim().to_string();
                if enhanced != request.prompt {
                    self.emit(
                        EventKind::PromptEnhanced,
                        json!({ "template_id": template_id, "prompt": enhanced }),
                    )
                    .await;
                }
                enhanced
            }
            Ok(_) => request.prompt.clone(),
            Err(err) => {
                warn!(template_id, error = %format!("{err:#}"), "prompt enhancement failed; using original prompt");
                request.prompt.clone()
            }
        }
    }

    async fn run_local(
        &self,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let direct = request
            .local_endpoint
            .as_deref()
            .map(normalize_base_url)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.local.default_endpoint().to_string());

        let direct_error = match self.generate_local(request, &direct, prompt).await {
            Ok(result) => return Ok(result.with_mode(EngineMode::Direct)),
            Err(err) if err.is_connectivity() => err,
            Err(err) if err.is_recoverable_locally() => {
                return self.simulate(prompt, &direct, err).await;
            }
            Err(err) => return Err(err),
        };
        warn!(endpoint = %direct, error = %direct_error, "local engine unreachable; discovering");

        let Some(endpoint) = self.discoverer.discover().await else {
            return self.simulate(prompt, &direct, direct_error).await;
        };
        self.emit(
            EventKind::EndpointDiscovered,
            json!({ "endpoint": endpoint.base_url, "replaces": direct }),
        )
        .await;

        match self.generate_local(request, &endpoint.base_url, prompt).await {
            Ok(result) => Ok(result.with_mode(EngineMode::Discovered).with_fallback_reason(
                format!(
                    "Local engine unreachable at {direct}; used discovered endpoint {}.",
                    endpoint.base_url
                ),
            )),
            Err(err) if err.is_recoverable_locally() => {
                self.simulate(prompt, &endpoint.base_url, err).await
            }
            Err(err) => Err(err),
        }
    }

    async fn generate_local(
        &self,
        request: &GenerationRequest,
        endpoint: &str,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError> {
        self.local
            .generate(
                endpoint,
                prompt,
                request.model_hint.as_deref(),
                request.gpu_enabled,
                request.seed,
            )
            .await
    }

    async fn simulate(
        &self,
        prompt: &str,
        endpoint: &str,
        cause: GenerationError,
    ) -> Result<GenerationResult, GenerationError> {
        if !self.allow_simulation {
            return Err(cause);
        }
        warn!(endpoint, error = %cause, "falling back to simulated generation");
        self.emit(
            EventKind::EngineFallback,
            json!({
                "from": endpoint,
                "to": EngineMode::Simulated.as_str(),
                "kind": format!("{:?}", cause.kind()),
                "error": cause.to_string(),
            }),
        )
        .await;
        Ok(self
            .simulation
            .generate(prompt)
            .await
            .with_fallback_reason(format!("{cause}; returned a simulated result.")))
    }

    /// Event log failures are logged and never fail the request.
    async fn emit(&self, kind: EventKind, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(kind, payload).await {
            warn!(event = kind.as_str(), error = %format!("{err:#}"), "failed to write event");
        }
    }
}
