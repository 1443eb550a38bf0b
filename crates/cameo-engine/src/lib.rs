pub mod cloud;
pub mod config;
pub mod enhance;
pub mod events;
mod http;
pub mod local;
pub mod orchestrator;
pub mod provider;
pub mod simulation;

pub use cloud::CloudEngineClient;
pub use config::{EngineConfig, SimulationStage};
pub use enhance::{GeminiPromptEnhancer, NoopEnhancer, PromptEnhancer};
pub use events::{EventKind, EventWriter};
pub use local::{ConnectivityProber, EndpointDiscoverer, LocalEngineClient, Probe};
pub use orchestrator::Orchestrator;
pub use provider::VideoProvider;
pub use simulation::SimulationBackend;
