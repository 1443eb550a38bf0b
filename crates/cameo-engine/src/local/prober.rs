use std::time::Duration;

use async_trait::async_trait;
use cameo_contracts::models::CHECKPOINT_LOADER_NODE;
use cameo_contracts::Endpoint;
use reqwest::Client as HttpClient;
use tracing::debug;

/// Liveness check for a candidate local engine. Never errors: anything but a
/// timely success status counts as "not live".
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityProber {
    http: HttpClient,
}

impl ConnectivityProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }

    /// Probes and records the outcome with the check time.
    pub async fn check(&self, endpoint: &str, timeout: Duration) -> Endpoint {
        let mut checked = Endpoint::checked(endpoint, false);
        let url = checked.url(&format!("object_info/{CHECKPOINT_LOADER_NODE}"));
        checked.live = match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(endpoint = %checked.base_url, status = response.status().as_u16(), "probe answered");
                ok
            }
            Err(err) => {
                debug!(endpoint = %checked.base_url, error = %err, "probe failed");
                false
            }
        };
        checked
    }
}

#[async_trait]
impl Probe for ConnectivityProber {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> bool {
        self.check(endpoint, timeout).await.live
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    use super::{ConnectivityProber, Probe};

    fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn refused_connection_is_not_live() {
        let prober = ConnectivityProber::new();
        let started = Instant::now();
        assert!(!prober.probe(&closed_port_url(), Duration::from_secs(1)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn malformed_url_is_not_live() {
        let prober = ConnectivityProber::new();
        let checked = prober.check("http://[::1", Duration::from_millis(200)).await;
        assert!(!checked.live);
    }
}
