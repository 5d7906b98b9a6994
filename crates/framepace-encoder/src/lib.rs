//! Encoder settings, argument assembly and the raw-video stdin pipe.
//!
//! This crate describes how an external encoder process is launched and
//! fed: [`RecorderSettings`] configure it, [`EncoderCommand`] turns them
//! into an argument list, and a [`FrameSink`] carries raw RGBA frames to
//! the process's standard input.

mod args;
mod error;
mod frame;
mod pipe;
mod settings;

pub use args::{split_args, EncoderCommand};
pub use error::EncoderError;
pub use frame::{Frame, PixelFormat};
pub use pipe::{EncoderLauncher, EncoderPipe, FfmpegLauncher, FrameSink};
pub use settings::RecorderSettings;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Encoder executable used when the settings leave the path empty.
pub const DEFAULT_ENCODER_PROGRAM: &str = "ffmpeg";

/// Pixel format the encoder is told to expect on its input.
pub const INPUT_PIXEL_FORMAT: PixelFormat = PixelFormat::Rgba;
