mod client;
mod discovery;
mod prober;

pub use client::{ArtifactRef, LocalEngineClient};
pub use discovery::EndpointDiscoverer;
pub use prober::{ConnectivityProber, Probe};
