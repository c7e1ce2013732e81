use crate::tracker_core::sink_backend::{ensure_parent_dir, ConfirmedEvent, EventSink, SinkError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub struct SqliteSink {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteSink {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            conn: None,
        }
    }
}

#[async_trait]
impl EventSink for SqliteSink {
    async fn ensure_initialized(&mut self) -> Result<(), SinkError> {
        if self.conn.is_some() {
            return Ok(());
        }

        ensure_parent_dir(&self.path)?;
        let conn = Connection::open(&self.path)?;

        // WAL lets readers tail the table while rows are appended
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", journal_mode);
        // FULL fsyncs the WAL on every commit so an acknowledged append survives power loss
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS rolls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                roll TEXT NOT NULL
            )",
            [],
        )?;

        log::info!("✅ SQLite event log initialized: {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    async fn append(&mut self, event: &ConfirmedEvent) -> Result<(), SinkError> {
        let conn = self.conn.as_ref().ok_or(SinkError::NotInitialized)?;
        conn.execute(
            "INSERT INTO rolls (timestamp, roll) VALUES (?1, ?2)",
            params![event.timestamp_iso(), event.label.as_str()],
        )?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
