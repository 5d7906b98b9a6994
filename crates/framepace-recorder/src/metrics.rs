//! Per-session counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the producer and consumer sides of a session.
#[derive(Debug, Default)]
pub(crate) struct SessionMetrics {
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    write_failures: AtomicU64,
    frames_discarded: AtomicU64,
    layout_mismatches: AtomicU64,
}

impl SessionMetrics {
    /// Record a frame delivered to the encoder.
    pub fn record_written(&self, bytes: usize) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a frame the encoder did not accept.
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frames thrown away without being written.
    pub fn record_discarded(&self, count: usize) {
        self.frames_discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a frame whose layout differs from the encoder input.
    /// Returns the previous count.
    pub fn record_layout_mismatch(&self) -> u64 {
        self.layout_mismatches.fetch_add(1, Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded.load(Ordering::Relaxed)
    }

    pub fn layout_mismatches(&self) -> u64 {
        self.layout_mismatches.load(Ordering::Relaxed)
    }
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecorderStats {
    /// Session the numbers belong to (0 before the first session).
    pub session_id: u64,

    /// Frames accepted by `add_frame`, reset once the session drains.
    pub frames_added: u64,

    /// Frames written to the encoder.
    pub frames_written: u64,

    /// Bytes written to the encoder.
    pub bytes_written: u64,

    /// Frames the encoder did not accept.
    pub write_failures: u64,

    /// Frames discarded without being written.
    pub frames_discarded: u64,

    /// Accepted frames whose size or pixel format differs from the
    /// encoder input.
    pub layout_mismatches: u64,

    /// Frames waiting in the queue.
    pub queued: usize,

    /// `frames_added / fps` in seconds.
    pub recorded_duration_secs: f64,
}
