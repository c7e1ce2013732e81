use crate::tracker_core::source::{parse_window_line, SnapshotSource, SourceError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Reads the current window from a local file.
///
/// Each line of the file is one window; the last non-empty line is the current one. A
/// producer may either rewrite the file or keep appending lines.
pub struct FileSnapshotSource {
    path: PathBuf,
}

pub struct FileHandle {
    opened_at: Instant,
    reads: u64,
}

impl FileSnapshotSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    type Handle = FileHandle;

    async fn acquire(&mut self) -> Result<FileHandle, SourceError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a regular file",
                self.path.display()
            )));
        }

        log::info!("📖 Watching snapshot file: {}", self.path.display());
        Ok(FileHandle {
            opened_at: Instant::now(),
            reads: 0,
        })
    }

    async fn snapshot(&mut self, handle: &mut FileHandle) -> Result<Vec<String>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        handle.reads += 1;

        let window = contents
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(parse_window_line)
            .unwrap_or_default();

        Ok(window)
    }

    async fn release(&mut self, handle: FileHandle) {
        log::debug!(
            "Released snapshot file {} after {} reads ({:?})",
            self.path.display(),
            handle.reads,
            handle.opened_at.elapsed()
        );
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_last_non_empty_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("windows.txt");
        std::fs::write(&path, "CT T T\nT T BONUS\n\n").unwrap();

        let mut source = FileSnapshotSource::new(&path);
        let mut handle = source.acquire().await.unwrap();
        assert_eq!(source.snapshot(&mut handle).await.unwrap(), vec!["T", "T", "BONUS"]);

        std::fs::write(&path, "coin-t,coin-ct\n").unwrap();
        assert_eq!(source.snapshot(&mut handle).await.unwrap(), vec!["coin-t", "coin-ct"]);

        source.release(handle).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let mut source = FileSnapshotSource::new(dir.path().join("missing.txt"));

        assert!(matches!(source.acquire().await, Err(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_file_yields_empty_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("windows.txt");
        std::fs::write(&path, "").unwrap();

        let mut source = FileSnapshotSource::new(&path);
        let mut handle = source.acquire().await.unwrap();
        assert!(source.snapshot(&mut handle).await.unwrap().is_empty());
    }
}
