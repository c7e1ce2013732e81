use crate::tracker_core::sink_backend::{ensure_parent_dir, ConfirmedEvent, EventSink, SinkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollRecord {
    pub timestamp: String,
    pub roll: String,
}

impl From<&ConfirmedEvent> for RollRecord {
    fn from(event: &ConfirmedEvent) -> Self {
        Self {
            timestamp: event.timestamp_iso(),
            roll: event.label.to_string(),
        }
    }
}

pub struct JsonlSink {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }
}

#[async_trait]
impl EventSink for JsonlSink {
    async fn ensure_initialized(&mut self) -> Result<(), SinkError> {
        if self.file.is_none() {
            ensure_parent_dir(&self.path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
            log::info!("📝 Writing events to: {}", self.path.display());
        }
        Ok(())
    }

    async fn append(&mut self, event: &ConfirmedEvent) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotInitialized)?;
        let json = serde_json::to_string(&RollRecord::from(event))?;
        writeln!(file, "{}", json)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
