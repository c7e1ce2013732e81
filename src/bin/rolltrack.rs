//! Roll tracker
//!
//! Polls the visible window of a roll feed, reconciles consecutive windows and appends
//! every newly confirmed roll to an event log.
//!
//! Usage:
//!   cargo run --release --bin rolltrack -- --backend csv
//!
//! Environment variables:
//!   ROLLTRACK_SOURCE - Snapshot file path or http(s) URL (required)
//!   ROLLTRACK_OUTPUT_PATH - Event log path (default depends on backend)
//!   ROLLTRACK_POLL_INTERVAL_SECS - Poll interval (default: 10)
//!   ROLLTRACK_MAX_RUNTIME_MINUTES - Stop after this many minutes (default: unbounded)
//!   ROLLTRACK_STALE_THRESHOLD_SECS - Resync after this long without new rolls (default: 300)

use dotenv::dotenv;
use log::{error, info, warn};
use rolltrack::tracker_core::{
    file_source::FileSnapshotSource, http_source::HttpSnapshotSource, open_sink, BackendType,
    EventSink, PollConfig, PollCoordinator, RunSummary, SnapshotSource, SourceSpec,
    TrackerConfig, TrackerError,
};
use std::env;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let backend = BackendType::parse_from_args(&args);

    let config = match TrackerConfig::from_env(backend) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };

    info!("🚀 Roll Tracker");
    info!("   ├─ Source: {:?}", config.source);
    info!("   ├─ Backend: {:?}", config.backend);
    info!("   ├─ Output: {}", config.output_path.display());
    info!("   ├─ Poll interval: {:?}", config.poll_interval);
    info!("   ├─ Stale threshold: {:?}", config.stale_threshold);
    match config.max_runtime {
        Some(runtime) => info!("   └─ Max runtime: {:?}", runtime),
        None => info!("   └─ Max runtime: unbounded"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("");
                info!("⚠️  Received CTRL+C, shutting down...");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                error!("❌ Failed to listen for CTRL+C: {}", err);
                // Keep the sender alive so the tracker only stops on its own terms
                let _keep = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    let sink = open_sink(&config.backend, &config.output_path);
    let poll_config = config.poll_config();

    let result = match config.source.clone() {
        SourceSpec::File(path) => {
            run_tracker(FileSnapshotSource::new(path), sink, poll_config, shutdown_rx).await
        }
        SourceSpec::Http(url) => {
            let source = HttpSnapshotSource::new(url, config.read_timeout);
            run_tracker(source, sink, poll_config, shutdown_rx).await
        }
    };

    match result {
        Ok(summary) => {
            if summary.events_confirmed > summary.events_persisted {
                warn!(
                    "⚠️  {} confirmed rolls were not persisted",
                    summary.events_confirmed - summary.events_persisted
                );
            }
            info!("✅ Roll tracker stopped");
            Ok(())
        }
        Err(e) => {
            error!("❌ Roll tracker failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_tracker<S: SnapshotSource>(
    source: S,
    sink: Box<dyn EventSink>,
    config: PollConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, TrackerError> {
    let mut coordinator = PollCoordinator::new(source, sink, config);
    coordinator.run(shutdown).await
}
