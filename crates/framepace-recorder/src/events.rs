//! Recorder lifecycle events.

use std::path::PathBuf;

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics::RecorderStats;

/// Observable recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecorderState {
    /// No session, nothing queued.
    #[default]
    Idle,

    /// Accepting frames.
    Recording,

    /// Stopped; the consumer is still writing queued frames.
    Draining,
}

impl RecorderState {
    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Recording => "Recording",
            Self::Draining => "Draining",
        }
    }
}

/// Events published by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderEvent {
    /// A session opened its encoder stream.
    SessionStarted {
        session_id: u64,
        output_path: PathBuf,
        command_line: String,
    },

    /// `stop` was called; queued frames are still being written.
    Stopping { session_id: u64, queued: usize },

    /// A draining session was cancelled by a forced start.
    ForceCancelled { session_id: u64, discarded: usize },

    /// The consumer drained the queue and closed the encoder stream.
    SessionFinished {
        session_id: u64,
        stats: RecorderStats,
    },
}

/// Publish without blocking; a lagging subscriber loses events.
pub(crate) fn send_event(tx: &Sender<RecorderEvent>, event: RecorderEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            debug!(?event, "Event channel full, dropping event");
        }
        Err(TrySendError::Disconnected(_)) => {
            warn!("Event channel disconnected");
        }
    }
}
