use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Orchestration milestones recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    GenerationStarted,
    PromptEnhanced,
    EndpointDiscovered,
    EngineFallback,
    GenerationFinished,
    GenerationFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerationStarted => "generation_started",
            Self::PromptEnhanced => "prompt_enhanced",
            Self::EndpointDiscovered => "endpoint_discovered",
            Self::EngineFallback => "engine_fallback",
            Self::GenerationFinished => "generation_finished",
            Self::GenerationFailed => "generation_failed",
        }
    }
}

/// Append-only JSONL event log shared by every request of one session.
///
/// Each record is `type`, `session_id` and `ts` followed by the payload
/// fields. The file is opened on first use and every record goes out in a
/// single write under an async lock, so concurrent requests never split a line.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Non-object payloads contribute no fields.
    pub async fn emit(&self, kind: EventKind, payload: Value) -> Result<Value> {
        let record = self.record(kind, payload);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut slot = self.shared.file.lock().await;
        if slot.is_none() {
            *slot = Some(self.open().await?);
        }
        let Some(file) = slot.as_mut() else {
            anyhow::bail!("event log {} is not open", self.shared.path.display());
        };
        file.write_all(&line)
            .await
            .with_context(|| format!("failed to append to {}", self.shared.path.display()))?;
        file.flush().await?;
        Ok(record)
    }

    fn record(&self, kind: EventKind, payload: Value) -> Value {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::from(kind.as_str()));
        record.insert(
            "session_id".to_string(),
            Value::from(self.shared.session_id.as_str()),
        );
        record.insert(
            "ts".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        if let Value::Object(fields) = payload {
            record.extend(fields);
        }
        Value::Object(record)
    }

    async fn open(&self) -> Result<File> {
        if let Some(parent) = self
            .shared
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.shared.path)
            .await
            .with_context(|| format!("failed to open {}", self.shared.path.display()))
    }
}

/// `type` of every parseable line, in file order.
pub async fn read_event_types(path: &Path) -> Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_event_types, EventKind, EventWriter};

    #[tokio::test]
    async fn records_carry_session_fields_and_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let emitted = writer
            .emit(EventKind::EngineFallback, json!({ "from": "http://127.0.0.1:8188" }))
            .await?;

        let content = tokio::fs::read_to_string(&path).await?;
        assert_eq!(content.lines().count(), 1);
        let parsed: Value = serde_json::from_str(content.trim_end())?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("engine_fallback"));
        assert_eq!(parsed["session_id"], json!("session-1"));
        assert_eq!(parsed["from"], json!("http://127.0.0.1:8188"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[tokio::test]
    async fn payload_fields_override_defaults_and_scalars_are_ignored() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let overridden = writer
            .emit(EventKind::GenerationStarted, json!({ "session_id": "other" }))
            .await?;
        assert_eq!(overridden["session_id"], json!("other"));

        let bare = writer.emit(EventKind::GenerationFailed, json!("oops")).await?;
        assert_eq!(bare.as_object().map(|row| row.len()), Some(3));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_clones_write_whole_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");
        let filler = "x".repeat(16 * 1024);

        let mut tasks = tokio::task::JoinSet::new();
        for idx in 0..32 {
            let writer = writer.clone();
            let filler = filler.clone();
            tasks.spawn(async move {
                writer
                    .emit(
                        EventKind::GenerationFinished,
                        json!({ "idx": idx, "filler": filler }),
                    )
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined??;
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let mut seen: Vec<u64> = Vec::new();
        for line in content.lines() {
            let row: Value = serde_json::from_str(line)?;
            assert_eq!(row["filler"].as_str().map(str::len), Some(filler.len()));
            seen.push(row["idx"].as_u64().unwrap_or(u64::MAX));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<u64>>());
        assert_eq!(read_event_types(&path).await?.len(), 32);
        Ok(())
    }
}
