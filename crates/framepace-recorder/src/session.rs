//! State owned by one recording session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use framepace_encoder::{EncoderError, EncoderResult, Frame, FrameSink, RecorderSettings};
use framepace_queue::SynchronizedQueue;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::metrics::{RecorderStats, SessionMetrics};

/// The encoder stream behind its own lock.
///
/// Opened by the thread calling `start`, written and closed by the
/// consumer thread. The stream is only touched with the lock held, and the
/// lock is never taken while the queue lock is held. `open` mirrors the
/// slot's occupancy and only changes under the lock, so the producer can
/// check it without waiting for an in-flight write.
pub(crate) struct EncoderSlot {
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    open: AtomicBool,
}

impl EncoderSlot {
    fn new(sink: Option<Box<dyn FrameSink>>) -> Self {
        Self {
            open: AtomicBool::new(sink.is_some()),
            sink: Mutex::new(sink),
        }
    }

    /// Whether a stream is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Write and flush one frame.
    pub fn write(&self, data: &[u8]) -> EncoderResult<()> {
        match self.sink.lock().as_mut() {
            Some(sink) => sink.write_frame(data),
            None => Err(EncoderError::Closed),
        }
    }

    /// Close the stream if it is open. Returns whether one was closed.
    pub fn close(&self) -> bool {
        let mut slot = self.sink.lock();
        let Some(sink) = slot.take() else {
            return false;
        };
        self.open.store(false, Ordering::SeqCst);

        let name = sink.name();
        match sink.close() {
            Ok(()) => info!(sink = name, "Encoder stream closed"),
            Err(e) => error!(sink = name, "Error closing encoder stream: {}", e),
        }
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SessionTiming {
    started_at: Option<Instant>,
    last_frame_at: Option<Instant>,
}

/// One recording: frozen settings, the frame queue, the encoder stream and
/// the counters the pacing relies on.
pub(crate) struct Session {
    pub id: u64,
    pub settings: RecorderSettings,
    pub queue: SynchronizedQueue<Frame>,
    pub encoder: EncoderSlot,
    pub metrics: SessionMetrics,
    recording: AtomicBool,
    frames_added: AtomicU64,
    consumer_started: AtomicBool,
    consumer_finished: AtomicBool,
    timing: Mutex<SessionTiming>,
}

impl Session {
    /// Placeholder used before the first recording.
    pub fn idle(settings: RecorderSettings) -> Self {
        Self::build(0, settings, None, false)
    }

    /// A recording session writing to `sink`.
    pub fn recording(id: u64, settings: RecorderSettings, sink: Box<dyn FrameSink>) -> Self {
        Self::build(id, settings, Some(sink), true)
    }

    fn build(
        id: u64,
        settings: RecorderSettings,
        sink: Option<Box<dyn FrameSink>>,
        recording: bool,
    ) -> Self {
        Self {
            id,
            settings,
            queue: SynchronizedQueue::new(),
            encoder: EncoderSlot::new(sink),
            metrics: SessionMetrics::default(),
            recording: AtomicBool::new(recording),
            frames_added: AtomicU64::new(0),
            consumer_started: AtomicBool::new(false),
            consumer_finished: AtomicBool::new(false),
            timing: Mutex::new(SessionTiming::default()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Clear the recording flag. Returns whether it was set.
    pub fn stop_recording(&self) -> bool {
        self.recording.swap(false, Ordering::SeqCst)
    }

    pub fn frames_added(&self) -> u64 {
        self.frames_added.load(Ordering::SeqCst)
    }

    /// Queue one output frame and account for it.
    pub fn enqueue(&self, frame: Frame) {
        self.queue.push(frame);
        self.frames_added.fetch_add(1, Ordering::SeqCst);
        self.timing.lock().last_frame_at = Some(Instant::now());
    }

    pub fn reset_frames_added(&self) {
        self.frames_added.store(0, Ordering::SeqCst);
    }

    /// Mark the consumer as spawned. Returns false if it already was.
    pub fn claim_consumer(&self) -> bool {
        !self.consumer_started.swap(true, Ordering::SeqCst)
    }

    pub fn consumer_started(&self) -> bool {
        self.consumer_started.load(Ordering::SeqCst)
    }

    pub fn mark_finished(&self) {
        self.consumer_finished.store(true, Ordering::SeqCst);
    }

    /// Whether the consumer is still writing or closing the stream.
    pub fn is_draining(&self) -> bool {
        self.consumer_started() && !self.consumer_finished.load(Ordering::SeqCst)
    }

    /// No recording, nothing queued and no consumer at work.
    pub fn is_ready(&self) -> bool {
        !self.is_recording() && self.queue.is_empty() && !self.is_draining()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.timing.lock().started_at
    }

    pub fn last_frame_at(&self) -> Option<Instant> {
        self.timing.lock().last_frame_at
    }

    /// Start the session clock.
    pub fn mark_started(&self, now: Instant) {
        let mut timing = self.timing.lock();
        timing.started_at = Some(now);
        timing.last_frame_at = Some(now);
    }

    /// `frames_added / fps` in seconds.
    pub fn recorded_duration(&self) -> f64 {
        self.frames_added() as f64 / self.settings.fps as f64
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            session_id: self.id,
            frames_added: self.frames_added(),
            frames_written: self.metrics.frames_written(),
            bytes_written: self.metrics.bytes_written(),
            write_failures: self.metrics.write_failures(),
            frames_discarded: self.metrics.frames_discarded(),
            layout_mismatches: self.metrics.layout_mismatches(),
            queued: self.queue.len(),
            recorded_duration_secs: self.recorded_duration(),
        }
    }
}
