//! `framepace`: records an animated test pattern through the paced recorder.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{select, RecvTimeoutError};
use framepace_encoder::{EncoderCommand, Frame, PixelFormat, RecorderSettings};
use framepace_recorder::{PacedRecorder, RecorderEvent, RecorderStats};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Record a synthetic test pattern at a steady frame rate.
#[derive(Parser)]
#[command(name = "framepace")]
#[command(version, about)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the pattern and record it through the encoder
    Record {
        #[command(flatten)]
        settings: SettingsArgs,

        /// How long to record, in seconds
        #[arg(long, default_value_t = 5.0)]
        duration: f64,

        /// Render loop rate (defaults to the capture rate)
        #[arg(long)]
        render_fps: Option<f32>,
    },

    /// Print the encoder command line without launching it
    PrintCommand {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Settings file plus per-field overrides.
#[derive(Args)]
struct SettingsArgs {
    /// JSON settings file; flags below override its fields
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output media file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Capture frame rate
    #[arg(long)]
    fps: Option<f32>,

    /// Output frame rate
    #[arg(long)]
    out_fps: Option<f32>,

    /// Video codec; an empty string keeps raw video
    #[arg(long)]
    codec: Option<String>,

    /// Bitrate in kbps
    #[arg(long)]
    bitrate: Option<u32>,

    /// Encoder executable
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Refuse to replace an existing output file
    #[arg(long)]
    no_overwrite: bool,
}

impl SettingsArgs {
    fn resolve(&self) -> Result<RecorderSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading settings from {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing settings from {}", path.display()))?
            }
            None => RecorderSettings::default(),
        };

        if let Some(output) = &self.output {
            settings.output_path = output.clone();
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(fps) = self.fps {
            settings.fps = fps;
            // Keep output rate in step unless asked otherwise.
            if self.out_fps.is_none() {
                settings.out_fps = fps;
            }
        }
        if let Some(out_fps) = self.out_fps {
            settings.out_fps = out_fps;
        }
        if let Some(codec) = &self.codec {
            settings.video_codec = codec.clone();
        }
        if let Some(bitrate) = self.bitrate {
            settings.bitrate_kbps = bitrate;
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            settings.ffmpeg_path = ffmpeg.clone();
        }
        if self.no_overwrite {
            settings.allow_overwrite = false;
        }

        Ok(settings)
    }
}

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "framepace=info,framepace_recorder=info,framepace_encoder=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Moving color bars, regenerated per tick.
struct TestPattern {
    width: u32,
    height: u32,
}

impl TestPattern {
    fn render(&self, tick: u64) -> Frame {
        let shift = (tick % 256) as u32;
        let len = PixelFormat::Rgba.frame_len(self.width, self.height);
        let mut pixels = BytesMut::with_capacity(len);

        for y in 0..self.height {
            for x in 0..self.width {
                let bar = (x * 8 / self.width.max(1) + shift / 32) % 8;
                pixels.extend_from_slice(&[
                    if bar & 1 != 0 { 255 } else { 0 },
                    if bar & 2 != 0 { 255 } else { 0 },
                    if bar & 4 != 0 { 255 } else { 0 },
                    255,
                ]);
                // Scanline that walks down the frame.
                if y == (shift * self.height / 256) {
                    let end = pixels.len();
                    pixels[end - 4..end - 1].fill(255);
                }
            }
        }

        Frame::from_bytes(pixels.freeze(), self.width, self.height, PixelFormat::Rgba)
    }
}

fn report(event: &RecorderEvent) -> Option<RecorderStats> {
    match event {
        RecorderEvent::SessionStarted {
            session_id,
            command_line,
            ..
        } => info!(session = session_id, %command_line, "Session started"),
        RecorderEvent::Stopping { session_id, queued } => {
            info!(session = session_id, queued, "Session stopping")
        }
        RecorderEvent::ForceCancelled {
            session_id,
            discarded,
        } => warn!(session = session_id, discarded, "Previous session cancelled"),
        RecorderEvent::SessionFinished { session_id, stats } => {
            info!(session = session_id, "Session finished");
            return Some(stats.clone());
        }
    }
    None
}

/// Recording length from `--duration` seconds.
fn record_length(duration: f64) -> Result<Duration> {
    if duration <= 0.0 {
        bail!("duration must be positive, got {duration}");
    }
    Duration::try_from_secs_f64(duration)
        .with_context(|| format!("duration {duration} is out of range"))
}

/// Time between render ticks at `render_fps`.
fn render_interval(render_fps: f32) -> Result<Duration> {
    if render_fps <= 0.0 {
        bail!("render rate must be positive, got {render_fps}");
    }
    let interval = Duration::try_from_secs_f32(1.0 / render_fps)
        .with_context(|| format!("render rate {render_fps} is out of range"))?;
    if interval.is_zero() {
        bail!("render rate {render_fps} is out of range");
    }
    Ok(interval)
}

fn record(settings: RecorderSettings, duration: f64, render_fps: Option<f32>) -> Result<()> {
    let length = record_length(duration)?;
    let render_fps = render_fps.unwrap_or(settings.fps);
    let interval = render_interval(render_fps)?;

    let recorder = PacedRecorder::new();
    let events = recorder.subscribe();
    recorder
        .start(&settings, false)
        .context("starting the recording")?;

    let pattern = TestPattern {
        width: settings.width,
        height: settings.height,
    };
    let ticker = crossbeam_channel::tick(interval);
    let deadline = Instant::now()
        .checked_add(length)
        .with_context(|| format!("duration {duration} is out of range"))?;
    let mut tick = 0u64;
    let mut skipped = 0u64;
    let mut finished = None;

    info!(duration, render_fps, "Rendering test pattern");
    while Instant::now() < deadline {
        select! {
            recv(ticker) -> _ => {
                if recorder.wants_frame() {
                    let added = recorder.add_frame(&pattern.render(tick));
                    debug!(tick, added, queued = recorder.num_frames_in_queue(), "Tick");
                } else {
                    skipped += 1;
                }
                tick += 1;
            }
            recv(events) -> event => {
                if let Ok(event) = event {
                    finished = report(&event).or(finished);
                }
            }
        }
    }

    info!(
        recorded = recorder.recorded_duration(),
        ticks = tick,
        skipped,
        "Render loop done"
    );
    recorder.stop();

    while !recorder.is_ready() {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => finished = report(&event).or(finished),
            Err(RecvTimeoutError::Timeout) => debug!(
                state = recorder.state().name(),
                queued = recorder.num_frames_in_queue(),
                "Waiting for the encoder"
            ),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    for event in events.try_iter() {
        finished = report(&event).or(finished);
    }

    let stats = finished.unwrap_or_else(|| recorder.stats());
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if stats.write_failures > 0 {
        bail!("{} frames could not be written", stats.write_failures);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Record {
            settings,
            duration,
            render_fps,
        } => record(settings.resolve()?, duration, render_fps),
        Commands::PrintCommand { settings } => {
            let command = EncoderCommand::from_settings(&settings.resolve()?)?;
            println!("{}", command.command_line());
            Ok(())
        }
    }
}
