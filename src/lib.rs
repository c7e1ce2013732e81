//! rolltrack - reconstructs a live feed of round outcomes from overlapping window snapshots
//!
//! ```text
//! SnapshotSource (file / HTTP) → classify → WindowReconciler
//!     ↓
//! ConfirmedEvent queue → EventSink (CSV / JSONL / SQLite)
//!     ↓
//! LivenessWatchdog → resync (release + reacquire source, drop baseline)
//! ```

pub mod tracker_core;
