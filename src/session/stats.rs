use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time statistics for a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_name: String,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// Seconds since the session started.
    pub duration_secs: f64,

    /// Participants that have produced audio so far.
    pub participants: usize,

    /// Segments handed to the worker transport (including any the
    /// transport later dropped).
    pub segments_dispatched: u64,

    /// Log entries committed, voice and text combined.
    pub entries_committed: u64,

    /// Per-job errors reported by the worker.
    pub worker_errors: u64,
}
