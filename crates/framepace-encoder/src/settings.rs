//! Recording configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_ENCODER_PROGRAM, INPUT_PIXEL_FORMAT};

/// Configuration for one recording session.
///
/// A recorder copies these when a session starts; later edits to the
/// caller's copy do not affect the running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// File the encoder writes to.
    pub output_path: PathBuf,

    /// Frames per second the pacing emulates (encoder input rate).
    pub fps: f32,

    /// Output frame rate hint for the encoded file.
    pub out_fps: f32,

    /// Input width in pixels.
    pub width: u32,

    /// Input height in pixels.
    pub height: u32,

    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Output codec. Empty means raw passthrough (no codec arguments).
    pub video_codec: String,

    /// Arguments placed before the input description.
    pub extra_pre_args: String,

    /// Arguments placed right before the pipe input.
    pub extra_input_args: String,

    /// Arguments placed right before the output path.
    pub extra_output_args: String,

    /// Whether an existing output file may be replaced.
    pub allow_overwrite: bool,

    /// Encoder executable.
    pub ffmpeg_path: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.mp4"),
            fps: 30.0,
            out_fps: 30.0,
            width: 640,
            height: 480,
            bitrate_kbps: 20_000,
            video_codec: "libx264".to_string(),
            extra_pre_args: String::new(),
            extra_input_args: String::new(),
            extra_output_args: String::new(),
            allow_overwrite: true,
            ffmpeg_path: DEFAULT_ENCODER_PROGRAM.to_string(),
        }
    }
}

impl RecorderSettings {
    /// Bytes the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        INPUT_PIXEL_FORMAT.frame_len(self.width, self.height)
    }

    /// Encoder executable, falling back to the default when unset.
    pub fn encoder_program(&self) -> &str {
        let path = self.ffmpeg_path.trim();
        if path.is_empty() {
            DEFAULT_ENCODER_PROGRAM
        } else {
            path
        }
    }
}
