pub mod config;
pub mod coordinator;
pub mod csv_sink;
pub mod error_handler;
pub mod file_source;
pub mod http_source;
pub mod jsonl_sink;
pub mod label;
pub mod reconciler;
pub mod sink_backend;
pub mod source;
pub mod sqlite_sink;
pub mod watchdog;

pub use config::{BackendType, SourceSpec, TrackerConfig};
pub use coordinator::{CoordinatorState, EngineState, PollConfig, PollCoordinator, RunSummary, TickOutcome, TrackerError};
pub use label::{classify, Label};
pub use reconciler::{reconcile, ReconciliationResult, Window, WindowReconciler};
pub use sink_backend::{open_sink, ConfirmedEvent, EventSink, SinkError};
pub use source::{SnapshotSource, SourceError};
pub use watchdog::LivenessWatchdog;
