//! End-to-end tests: file snapshot source → coordinator → every event log backend
//!
//! The snapshot file is rewritten between ticks the way an external capture process
//! would, and the resulting log is read back in its native format.

#[cfg(test)]
mod event_sink_tests {
    use rolltrack::tracker_core::file_source::FileSnapshotSource;
    use rolltrack::tracker_core::jsonl_sink::RollRecord;
    use rolltrack::tracker_core::{open_sink, BackendType, PollConfig, PollCoordinator};
    use rusqlite::Connection;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    const WINDOWS: [&str; 5] = [
        "coin-ct coin-t coin-t coin-bonus",
        "coin-t coin-t coin-bonus coin-ct",
        // Three new rolls in one poll
        "coin-ct coin-t coin-t coin-ct",
        "coin-ct coin-t coin-t coin-ct",
        "coin-t coin-t coin-ct coin-spinner",
    ];

    const EXPECTED: [&str; 4] = ["CT", "T", "T", "CT"];

    async fn track(backend: BackendType, file_name: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let window_path = dir.path().join("window.txt");
        let log_path = dir.path().join("logs").join(file_name);

        std::fs::write(&window_path, format!("{}\n", WINDOWS[0])).unwrap();

        let sink = open_sink(&backend, &log_path);
        let mut coord = PollCoordinator::new(
            FileSnapshotSource::new(&window_path),
            sink,
            PollConfig::default(),
        );
        coord.start().await.unwrap();

        for window in WINDOWS {
            std::fs::write(&window_path, format!("{}\n", window)).unwrap();
            coord.tick().await.unwrap();
        }
        coord.stop().await;

        assert_eq!(coord.summary().events_persisted, EXPECTED.len() as u64);
        (dir, log_path)
    }

    fn read_csv(path: &Path) -> Vec<String> {
        let contents = std::fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("timestamp,roll"));
        lines
            .map(|row| row.rsplit(',').next().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_csv_event_log() {
        let (_dir, log_path) = track(BackendType::Csv, "rolls.csv").await;
        assert_eq!(read_csv(&log_path), EXPECTED);
    }

    #[tokio::test]
    async fn test_jsonl_event_log() {
        let (_dir, log_path) = track(BackendType::Jsonl, "rolls.jsonl").await;

        let rolls: Vec<String> = std::fs::read_to_string(&log_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<RollRecord>(line).unwrap().roll)
            .collect();
        assert_eq!(rolls, EXPECTED);
    }

    #[tokio::test]
    async fn test_sqlite_event_log() {
        let (_dir, log_path) = track(BackendType::Sqlite, "rolls.db").await;

        let conn = Connection::open(&log_path).unwrap();
        let mut stmt = conn.prepare("SELECT roll FROM rolls ORDER BY id").unwrap();
        let rolls: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rolls, EXPECTED);
    }

    #[tokio::test]
    async fn test_restart_appends_to_existing_log() {
        // Test: A second session appends rows without a second header
        let dir = tempdir().unwrap();
        let window_path = dir.path().join("window.txt");
        let log_path = dir.path().join("rolls.csv");

        for pair in [["CT T", "T BONUS"], ["BONUS CT", "CT T"]] {
            std::fs::write(&window_path, pair[0]).unwrap();
            let mut coord = PollCoordinator::new(
                FileSnapshotSource::new(&window_path),
                open_sink(&BackendType::Csv, &log_path),
                PollConfig::default(),
            );
            coord.start().await.unwrap();
            coord.tick().await.unwrap();
            std::fs::write(&window_path, pair[1]).unwrap();
            coord.tick().await.unwrap();
            coord.stop().await;
        }

        assert_eq!(read_csv(&log_path), vec!["BONUS", "T"]);
    }
}
