//! Frame-paced recorder feeding an external encoder process.
//!
//! The caller hands images to [`PacedRecorder::add_frame`] at whatever
//! cadence its render loop runs. The recorder enqueues as many copies as
//! needed to keep output time in step with the wall clock, and a background
//! thread writes them as raw RGBA into the encoder's stdin.

mod consumer;
mod error;
mod events;
mod metrics;
pub mod pacing;
mod recorder;
mod session;

pub use error::RecorderError;
pub use events::{RecorderEvent, RecorderState};
pub use metrics::RecorderStats;
pub use recorder::PacedRecorder;

pub use framepace_encoder::{Frame, PixelFormat, RecorderSettings};

use std::time::Duration;

/// Result type for recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Channel capacity for recorder events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long the consumer sleeps when it finds the queue empty.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);
