//! Stdin pipe to the encoder process.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, instrument, warn};

use crate::error::EncoderError;
use crate::{EncoderCommand, EncoderResult};

/// Destination for raw frame bytes.
pub trait FrameSink: Send {
    /// Write one frame in full and flush it.
    fn write_frame(&mut self, data: &[u8]) -> EncoderResult<()>;

    /// Signal end of stream and release the destination.
    fn close(self: Box<Self>) -> EncoderResult<()>;

    /// Name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Opens a [`FrameSink`] for a session.
pub trait EncoderLauncher: Send + Sync {
    /// Start the encoder described by `command`.
    fn launch(&self, command: &EncoderCommand) -> EncoderResult<Box<dyn FrameSink>>;
}

/// Launches the encoder as a child process reading from its stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLauncher;

impl EncoderLauncher for FfmpegLauncher {
    fn launch(&self, command: &EncoderCommand) -> EncoderResult<Box<dyn FrameSink>> {
        let pipe = EncoderPipe::spawn(command)?;
        Ok(Box::new(pipe))
    }
}

/// A running encoder process and its stdin.
pub struct EncoderPipe {
    child: Child,
    stdin: Option<ChildStdin>,
    bytes_written: u64,
}

impl EncoderPipe {
    /// Spawn the encoder with a piped stdin.
    #[instrument(name = "encoder_spawn", skip_all, fields(program = %command.program))]
    pub fn spawn(command: &EncoderCommand) -> EncoderResult<Self> {
        info!(command = %command.command_line(), "Launching encoder");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncoderError::StdinUnavailable);
        };

        debug!(pid = child.id(), "Encoder pipe opened");

        Ok(Self {
            child,
            stdin: Some(stdin),
            bytes_written: 0,
        })
    }

    /// Close stdin and wait for the encoder to exit.
    pub fn finish(&mut self) -> EncoderResult<()> {
        // Dropping stdin delivers EOF.
        if self.stdin.take().is_none() {
            return Err(EncoderError::Closed);
        }

        let status = self.child.wait().map_err(EncoderError::Wait)?;
        debug!(%status, bytes = self.bytes_written, "Encoder exited");

        if status.success() {
            Ok(())
        } else {
            Err(EncoderError::Exit(status))
        }
    }
}

impl FrameSink for EncoderPipe {
    fn write_frame(&mut self, data: &[u8]) -> EncoderResult<()> {
        let stdin = self.stdin.as_mut().ok_or(EncoderError::Closed)?;
        stdin.write_all(data).map_err(EncoderError::Write)?;
        stdin.flush().map_err(EncoderError::Write)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> EncoderResult<()> {
        self.finish()
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

impl Drop for EncoderPipe {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            warn!(pid = self.child.id(), "Encoder pipe dropped without close");
            if let Err(e) = self.finish() {
                warn!("Encoder did not exit cleanly: {}", e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> EncoderCommand {
        EncoderCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[test]
    fn test_spawn_missing_program() {
        let command = EncoderCommand {
            program: "/nonexistent/framepace-encoder".to_string(),
            args: Vec::new(),
        };
        assert!(matches!(
            EncoderPipe::spawn(&command),
            Err(EncoderError::Spawn { .. })
        ));
    }

    #[test]
    fn test_write_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bytes.raw");
        let command = sh(&format!("cat > '{}'", out.display()));

        let mut sink: Box<dyn FrameSink> = FfmpegLauncher.launch(&command).unwrap();
        sink.write_frame(&[1u8; 16]).unwrap();
        sink.write_frame(&[2u8; 16]).unwrap();
        sink.close().unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(written.len(), 32);
        assert!(written[..16].iter().all(|b| *b == 1));
        assert!(written[16..].iter().all(|b| *b == 2));
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let mut pipe = EncoderPipe::spawn(&sh("cat > /dev/null; exit 3")).unwrap();
        pipe.write_frame(&[0u8; 8]).unwrap();
        assert!(matches!(pipe.finish(), Err(EncoderError::Exit(_))));
        assert!(matches!(pipe.finish(), Err(EncoderError::Closed)));
        assert!(matches!(pipe.write_frame(&[0u8; 8]), Err(EncoderError::Closed)));
    }
}
