//! Background thread draining a session's queue into the encoder.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use framepace_encoder::Frame;
use tracing::{debug, info, instrument, trace, warn};

use crate::events::{send_event, RecorderEvent};
use crate::session::Session;
use crate::IDLE_POLL_INTERVAL;

/// Write queued frames until the session is stopped and drained, then close
/// the encoder stream.
#[instrument(name = "consumer_loop", skip_all, fields(session = session.id))]
pub(crate) fn run(session: Arc<Session>, events: Sender<RecorderEvent>) {
    debug!("Consumer thread started");

    let mut announced_drain = false;

    loop {
        while let Some(frame) = session.queue.pop() {
            if !session.is_recording() && !announced_drain {
                info!(
                    remaining = session.queue.len() + 1,
                    fps = session.settings.fps,
                    "Recording stopped, finishing frame queue"
                );
                announced_drain = true;
            }
            write_frame(&session, frame);
        }

        // Empty snapshot while still recording: keep polling.
        if !session.is_recording() && session.queue.is_empty() {
            break;
        }
        thread::sleep(IDLE_POLL_INTERVAL);
    }

    info!("Recording finished, closing encoder stream");
    session.encoder.close();

    // A push racing with `stop` from another thread can land after the last
    // poll; those frames are released here.
    let late = session.queue.drain_with(drop);
    if late > 0 {
        warn!(late, "Discarded frames queued after the stream closed");
        session.metrics.record_discarded(late);
    }

    let stats = session.stats();
    session.reset_frames_added();
    session.mark_finished();

    info!(
        frames_written = stats.frames_written,
        bytes_written = stats.bytes_written,
        write_failures = stats.write_failures,
        "Recording session finished"
    );

    send_event(
        &events,
        RecorderEvent::SessionFinished {
            session_id: session.id,
            stats,
        },
    );
}

fn write_frame(session: &Session, frame: Frame) {
    if !frame.is_allocated() {
        return;
    }

    let len = frame.byte_len();
    match session.encoder.write(frame.as_bytes()) {
        Ok(()) => {
            session.metrics.record_written(len);
            trace!(bytes = len, queued = session.queue.len(), "Frame sent to encoder");
        }
        Err(e) => {
            warn!("Unable to write the frame: {}", e);
            session.metrics.record_write_failure();
        }
    }
    // `frame` is released here, after the write completed.
}
