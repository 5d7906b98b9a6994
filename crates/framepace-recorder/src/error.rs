//! Error types for the recorder module.

use std::path::PathBuf;

use framepace_encoder::EncoderError;
use thiserror::Error;

/// Reasons a recording session could not be started.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A session is already recording.
    #[error("Recording already started")]
    AlreadyRecording,

    /// The previous session is still draining its queue.
    #[error("Previous recording is still processing {queued} frames")]
    NotReady { queued: usize },

    /// No output path was configured.
    #[error("Output path is not set")]
    EmptyOutputPath,

    /// The output exists and overwriting is disabled.
    #[error("Output file already exists and overwriting is disabled: {}", .0.display())]
    OutputExists(PathBuf),

    /// Settings that cannot drive a session.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The encoder could not be set up.
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}
