//! Error types for the encoder module.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors that can occur while launching or feeding the encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The encoder process could not be started.
    #[error("Failed to spawn encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but its stdin was not captured.
    #[error("Encoder stdin is not available")]
    StdinUnavailable,

    /// Writing or flushing a frame failed.
    #[error("Failed to write frame to encoder: {0}")]
    Write(#[source] std::io::Error),

    /// The stream was already closed.
    #[error("Encoder stream is closed")]
    Closed,

    /// Waiting for the encoder to exit failed.
    #[error("Failed to wait for encoder: {0}")]
    Wait(#[source] std::io::Error),

    /// The encoder exited unsuccessfully.
    #[error("Encoder exited with {0}")]
    Exit(ExitStatus),

    /// An argument string has an unterminated quote.
    #[error("Unbalanced quote in argument string: {0}")]
    UnbalancedQuote(String),
}
