use crate::tracker_core::config::BackendType;
use crate::tracker_core::csv_sink::CsvSink;
use crate::tracker_core::jsonl_sink::JsonlSink;
use crate::tracker_core::label::Label;
use crate::tracker_core::sqlite_sink::SqliteSink;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// A new outcome confirmed by the reconciler, stamped when it was confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedEvent {
    pub timestamp: DateTime<Utc>,
    pub label: Label,
}

impl ConfirmedEvent {
    pub fn new(timestamp: DateTime<Utc>, label: Label) -> Self {
        Self { timestamp, label }
    }

    /// RFC 3339 UTC timestamp with microseconds, as written to every backend
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
    NotInitialized,
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SinkError::Database(e) => write!(f, "Database error: {}", e),
            SinkError::NotInitialized => write!(f, "Event log not initialized"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Append-only durable log of confirmed events
#[async_trait]
pub trait EventSink: Send {
    /// Create the log (and header) if absent. Never truncates existing data.
    async fn ensure_initialized(&mut self) -> Result<(), SinkError>;

    /// Durably append a single event before returning
    async fn append(&mut self, event: &ConfirmedEvent) -> Result<(), SinkError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

pub fn open_sink(backend: &BackendType, path: impl AsRef<Path>) -> Box<dyn EventSink> {
    match backend {
        BackendType::Csv => Box::new(CsvSink::new(path)),
        BackendType::Jsonl => Box::new(JsonlSink::new(path)),
        BackendType::Sqlite => Box::new(SqliteSink::new(path)),
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
