use crate::tracker_core::sink_backend::{ensure_parent_dir, ConfirmedEvent, EventSink, SinkError};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "timestamp,roll";

/// `timestamp,roll` log, safe to tail while it is being written
pub struct CsvSink {
    path: PathBuf,
    file: Option<File>,
}

impl CsvSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    fn write_row(&mut self, row: &str) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotInitialized)?;
        writeln!(file, "{}", row)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for CsvSink {
    async fn ensure_initialized(&mut self) -> Result<(), SinkError> {
        if self.file.is_some() {
            return Ok(());
        }

        ensure_parent_dir(&self.path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        // A row cut short by a crash has no newline; start the next row on its own line
        let mut last_byte = [0u8; 1];
        if len > 0 {
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last_byte)?;
        }
        self.file = Some(file);

        if len == 0 {
            self.write_row(CSV_HEADER)?;
            log::info!("📝 Created event log: {}", self.path.display());
        } else {
            if last_byte[0] != b'\n' {
                log::warn!("⚠️  Event log {} ends mid-row, terminating it", self.path.display());
                self.write_row("")?;
            }
            log::info!("📝 Appending to existing event log: {}", self.path.display());
        }

        Ok(())
    }

    async fn append(&mut self, event: &ConfirmedEvent) -> Result<(), SinkError> {
        let row = format!("{},{}", event.timestamp_iso(), event.label);
        self.write_row(&row)
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "CSV"
    }
}
