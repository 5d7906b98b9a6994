//! The paced recorder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use framepace_encoder::{
    EncoderCommand, EncoderLauncher, FfmpegLauncher, Frame, RecorderSettings, INPUT_PIXEL_FORMAT,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::consumer;
use crate::error::RecorderError;
use crate::events::{send_event, RecorderEvent, RecorderState};
use crate::metrics::RecorderStats;
use crate::pacing;
use crate::session::Session;
use crate::{RecorderResult, EVENT_CHANNEL_CAPACITY};

/// Re-times frames from an irregular render loop into a constant-rate raw
/// video stream for an external encoder.
///
/// `start`, `add_frame`, `wants_frame` and `stop` are meant to be driven
/// from one thread. The query methods may be called from anywhere.
pub struct PacedRecorder {
    launcher: Arc<dyn EncoderLauncher>,
    session: RwLock<Arc<Session>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    next_session_id: AtomicU64,
    event_tx: Sender<RecorderEvent>,
    event_rx: Receiver<RecorderEvent>,
}

impl PacedRecorder {
    /// Create a recorder that launches the encoder as a subprocess.
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(FfmpegLauncher))
    }

    /// Create a recorder with a custom way of opening the encoder stream.
    pub fn with_launcher(launcher: Arc<dyn EncoderLauncher>) -> Self {
        let (event_tx, event_rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            launcher,
            session: RwLock::new(Arc::new(Session::idle(RecorderSettings::default()))),
            consumers: Mutex::new(Vec::new()),
            next_session_id: AtomicU64::new(1),
            event_tx,
            event_rx,
        }
    }

    fn current(&self) -> Arc<Session> {
        Arc::clone(&self.session.read())
    }

    /// Start a new recording session.
    ///
    /// Fails without side effects if a session is recording, or if the
    /// previous one is still draining and `force_if_not_ready` is false.
    /// With `force_if_not_ready`, frames the previous session has not
    /// written yet are discarded.
    #[instrument(
        name = "recorder_start",
        skip_all,
        fields(output = %settings.output_path.display(), force = force_if_not_ready)
    )]
    pub fn start(&self, settings: &RecorderSettings, force_if_not_ready: bool) -> RecorderResult<()> {
        let previous = self.current();

        if previous.is_recording() {
            warn!("Can't start recording - already started");
            return Err(RecorderError::AlreadyRecording);
        }

        let ready = previous.is_ready();
        if !ready && !force_if_not_ready {
            let queued = previous.queue.len();
            error!(
                queued,
                "Can't start recording - previous recording is still processing"
            );
            return Err(RecorderError::NotReady { queued });
        }

        let settings = freeze_settings(settings)?;
        let command = EncoderCommand::from_settings(&settings)?;

        if !ready {
            self.cancel(&previous);
        }

        // A session whose consumer never ran still owns its stream.
        if !previous.consumer_started() && previous.encoder.close() {
            debug!(session = previous.id, "Closed stale encoder stream");
        }

        info!(command = %command.command_line(), "Starting recording");
        let sink = self.launcher.launch(&command).map_err(|e| {
            error!("Unable to open encoder stream to start recording: {}", e);
            e
        })?;

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let output_path = settings.output_path.clone();
        *self.session.write() = Arc::new(Session::recording(id, settings, sink));

        info!(session = id, "Encoder stream opened");
        send_event(
            &self.event_tx,
            RecorderEvent::SessionStarted {
                session_id: id,
                output_path,
                command_line: command.command_line(),
            },
        );

        Ok(())
    }

    /// Discard everything a draining session still has queued.
    fn cancel(&self, previous: &Session) {
        warn!(
            previous = %previous.settings.output_path.display(),
            queued = previous.queue.len(),
            "Starting new recording - cancelling previous still-processing recording"
        );

        let discarded = previous.queue.drain_with(drop);
        previous.metrics.record_discarded(discarded);

        send_event(
            &self.event_tx,
            RecorderEvent::ForceCancelled {
                session_id: previous.id,
                discarded,
            },
        );
    }

    /// Stop accepting frames.
    ///
    /// Queued frames keep being written in the background; the consumer
    /// closes the encoder stream once the queue is empty. Calling this again
    /// has no further effect.
    pub fn stop(&self) {
        let session = self.current();
        if !session.stop_recording() {
            return;
        }

        let queued = session.queue.len();
        info!(session = session.id, queued, "Stopping recording");
        send_event(
            &self.event_tx,
            RecorderEvent::Stopping {
                session_id: session.id,
                queued,
            },
        );

        // No frame ever arrived, so no consumer exists to close the stream.
        if session.claim_consumer() {
            self.spawn_consumer(&session, false);
        }
    }

    /// Whether an output frame is due right now.
    pub fn wants_frame(&self) -> bool {
        let session = self.current();
        if !session.is_recording() || !session.encoder.is_open() {
            return false;
        }

        match session.started_at() {
            // The first frame of a session is always wanted.
            None => true,
            Some(started_at) => {
                pacing::frames_due(
                    started_at.elapsed(),
                    session.frames_added(),
                    session.settings.fps,
                ) > 0
            }
        }
    }

    /// Offer the current image. Returns how many output frames it filled.
    ///
    /// Returns 0 when not recording, when the encoder stream is gone, or
    /// when the frame has no pixel data.
    pub fn add_frame(&self, frame: &Frame) -> usize {
        let session = self.current();

        if !session.is_recording() {
            warn!("Can't add new frame - not in recording mode");
            return 0;
        }
        if !session.encoder.is_open() {
            error!("Can't add new frame - encoder stream is invalid");
            return 0;
        }
        if !frame.is_allocated() {
            error!("Can't add new frame - input frame has no pixel data");
            return 0;
        }

        let settings = &session.settings;
        if !frame.matches_layout(settings.width, settings.height, INPUT_PIXEL_FORMAT)
            && session.metrics.record_layout_mismatch() == 0
        {
            // Once per session; later mismatches only show up in the stats.
            warn!(
                width = frame.width,
                height = frame.height,
                format = ?frame.format,
                bytes = frame.byte_len(),
                expected = settings.frame_size(),
                "Frame does not match the encoder input layout"
            );
        }

        if session.claim_consumer() {
            self.spawn_consumer(&session, true);
            session.mark_started(Instant::now());
        }

        let elapsed = session
            .started_at()
            .map_or(Duration::ZERO, |started_at| started_at.elapsed());
        let count = pacing::frames_to_enqueue(elapsed, session.frames_added(), session.settings.fps);

        for _ in 0..count {
            session.enqueue(frame.clone());
        }

        trace!(
            count,
            total = session.frames_added(),
            queued = session.queue.len(),
            "Frames added"
        );
        count
    }

    fn spawn_consumer(&self, session: &Arc<Session>, join_previous: bool) {
        let mut consumers = self.consumers.lock();

        if join_previous {
            for handle in consumers.drain(..) {
                if handle.join().is_err() {
                    error!("Previous consumer thread panicked");
                }
            }
        } else {
            let (finished, running): (Vec<_>, Vec<_>) =
                consumers.drain(..).partition(|handle| handle.is_finished());
            for handle in finished {
                let _ = handle.join();
            }
            *consumers = running;
        }

        let worker = Arc::clone(session);
        let events = self.event_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("framepace-consumer-{}", session.id))
            .spawn(move || consumer::run(worker, events));

        match spawned {
            Ok(handle) => consumers.push(handle),
            Err(e) => {
                error!("Failed to spawn consumer thread: {}", e);
                let discarded = session.queue.drain_with(drop);
                session.metrics.record_discarded(discarded);
                session.encoder.close();
                session.reset_frames_added();
                session.mark_finished();
            }
        }
    }

    /// Whether a session is accepting frames.
    pub fn is_recording(&self) -> bool {
        self.current().is_recording()
    }

    /// Not recording, nothing queued and the encoder stream closed.
    pub fn is_ready(&self) -> bool {
        self.current().is_ready()
    }

    /// Lifecycle state of the current session.
    pub fn state(&self) -> RecorderState {
        let session = self.current();
        if session.is_recording() {
            RecorderState::Recording
        } else if session.is_ready() {
            RecorderState::Idle
        } else {
            RecorderState::Draining
        }
    }

    /// Output time accepted so far, in seconds.
    pub fn recorded_duration(&self) -> f64 {
        self.current().recorded_duration()
    }

    /// Frames waiting to be written.
    pub fn num_frames_in_queue(&self) -> usize {
        self.current().queue.len()
    }

    /// Settings of the current (or last) session.
    pub fn settings(&self) -> RecorderSettings {
        self.current().settings.clone()
    }

    /// When the last output frame was enqueued.
    pub fn last_frame_time(&self) -> Option<Instant> {
        self.current().last_frame_at()
    }

    /// Counters for the current session.
    pub fn stats(&self) -> RecorderStats {
        self.current().stats()
    }

    /// Receiver for lifecycle events.
    ///
    /// All receivers share one bounded feed; events are dropped while it is
    /// full.
    pub fn subscribe(&self) -> Receiver<RecorderEvent> {
        self.event_rx.clone()
    }
}

impl Default for PacedRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PacedRecorder {
    fn drop(&mut self) {
        self.stop();
        for handle in self.consumers.get_mut().drain(..) {
            if handle.join().is_err() {
                error!("Consumer thread panicked");
            }
        }
    }
}

/// Validate settings and pin the values the session will use.
fn freeze_settings(settings: &RecorderSettings) -> RecorderResult<RecorderSettings> {
    if settings.output_path.as_os_str().is_empty() {
        error!("Can't start recording - output path is not set");
        return Err(RecorderError::EmptyOutputPath);
    }

    if !settings.allow_overwrite && settings.output_path.exists() {
        error!(
            path = %settings.output_path.display(),
            "The output file already exists and overwriting is disabled"
        );
        return Err(RecorderError::OutputExists(settings.output_path.clone()));
    }

    if !settings.fps.is_finite() || settings.fps <= 0.0 {
        return Err(RecorderError::InvalidSettings(format!(
            "capture frame rate must be positive, got {}",
            settings.fps
        )));
    }

    if settings.width == 0 || settings.height == 0 {
        return Err(RecorderError::InvalidSettings(format!(
            "resolution must be non-zero, got {}x{}",
            settings.width, settings.height
        )));
    }

    let mut frozen = settings.clone();
    frozen.ffmpeg_path = settings.encoder_program().to_string();
    Ok(frozen)
}
