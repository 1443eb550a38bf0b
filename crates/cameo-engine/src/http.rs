use std::error::Error as StdError;

use cameo_contracts::GenerationError;
use reqwest::Response;
use serde_json::Value;

pub(crate) async fn response_json_or_error(
    service: &str,
    response: Response,
) -> Result<Value, GenerationError> {
    let status = response.status();
    let body = response.text().await.map_err(|err| {
        GenerationError::Protocol(format!(
            "{service} response body read failed: {}",
            error_chain_text(&err, 512)
        ))
    })?;
    if !status.is_success() {
        return Err(GenerationError::Service {
            service: service.to_string(),
            status: status.as_u16(),
            message: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|err| {
        GenerationError::Protocol(format!("{service} returned invalid JSON payload: {err}"))
    })
}

/// `err` and its sources joined, skipping repeats.
pub(crate) fn error_chain_text(err: &(dyn StdError + 'static), max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(|last| last != trimmed).unwrap_or(true) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::{error_chain_text, truncate_text};

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|inner| inner as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn chain_text_joins_sources_without_repeats() {
        let err = Layer(
            "request failed",
            Some(Box::new(Layer(
                "connect error",
                Some(Box::new(Layer("connect error", None))),
            ))),
        );
        assert_eq!(
            error_chain_text(&err, 200),
            "request failed | caused by: connect error"
        );
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
