use chrono::{DateTime, Utc};

/// A local engine base URL plus the outcome of its last liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub live: bool,
    pub checked_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn checked(raw: &str, live: bool) -> Self {
        Self {
            base_url: normalize_base_url(raw),
            live,
            checked_at: Utc::now(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Trims whitespace and trailing slashes; bare `host:port` gets an `http://` scheme.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::{join_url, normalize_base_url, Endpoint};

    #[test]
    fn normalizes_trailing_slashes_and_scheme() {
        assert_eq!(normalize_base_url(" http://127.0.0.1:8188/ "), "http://127.0.0.1:8188");
        assert_eq!(normalize_base_url("localhost:8188"), "http://localhost:8188");
        assert_eq!(normalize_base_url("https://gpu.lan//"), "https://gpu.lan");
        assert_eq!(normalize_base_url("  "), "");
    }

    #[test]
    fn joins_paths_with_single_slash() {
        assert_eq!(join_url("http://h:1/", "/history/abc"), "http://h:1/history/abc");
        let endpoint = Endpoint::checked("http://h:1/", true);
        assert_eq!(endpoint.url("prompt"), "http://h:1/prompt");
        assert!(endpoint.live);
    }
}
