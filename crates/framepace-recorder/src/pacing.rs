//! Frame pacing.
//!
//! Output time is `frames_added / fps`. Each call compares it with the wall
//! clock and reports how many copies of the current image close the gap.

use std::time::Duration;

/// Output frames owed at `elapsed` after `frames_added` were accepted.
///
/// Negative when output time is ahead of the wall clock.
pub fn frames_due(elapsed: Duration, frames_added: u64, fps: f32) -> i64 {
    let fps = fps as f64;
    let accounted = frames_added as f64 / fps;
    ((elapsed.as_secs_f64() - accounted) * fps).floor() as i64
}

/// Copies of the current image to enqueue.
///
/// The first frame of a session is always accepted; after that the call
/// enqueues exactly the owed frames, duplicating when the caller is slow
/// and enqueuing nothing when it is ahead.
pub fn frames_to_enqueue(elapsed: Duration, frames_added: u64, fps: f32) -> usize {
    let due = frames_due(elapsed, frames_added, fps);
    if frames_added == 0 {
        due.max(1) as usize
    } else {
        due.max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_always_enqueued() {
        assert_eq!(frames_to_enqueue(Duration::ZERO, 0, 30.0), 1);
        assert_eq!(frames_to_enqueue(Duration::from_millis(5), 0, 30.0), 1);
    }

    #[test]
    fn test_first_call_late_catches_up() {
        // 250ms at 30 fps owes 7 frames.
        assert_eq!(frames_to_enqueue(Duration::from_millis(250), 0, 30.0), 7);
    }

    #[test]
    fn test_ahead_of_clock_enqueues_nothing() {
        assert!(frames_due(Duration::from_millis(10), 5, 30.0) < 0);
        assert_eq!(frames_to_enqueue(Duration::from_millis(10), 5, 30.0), 0);
    }

    #[test]
    fn test_slow_caller_duplicates() {
        // One frame accounted, caller returns after 210ms at 30 fps.
        // Output time 33.3ms, gap 176.7ms -> 5 frames.
        assert_eq!(frames_due(Duration::from_millis(210), 1, 30.0), 5);
    }

    #[test]
    fn test_total_tracks_wall_clock() {
        let fps = 30.0_f32;
        // Irregular call times in milliseconds.
        let calls = [0u64, 3, 40, 41, 90, 250, 251, 252, 600, 605, 1_010, 2_500, 2_501, 4_999];

        let mut total: u64 = 0;
        for &ms in &calls {
            let elapsed = Duration::from_millis(ms);
            let before = total;
            total += frames_to_enqueue(elapsed, total, fps) as u64;
            assert!(total >= before);

            let ideal = (elapsed.as_secs_f64() * fps as f64).floor() as u64;
            assert!(
                total.abs_diff(ideal) <= 1,
                "at {ms}ms: total {total}, ideal {ideal}"
            );
        }
    }
}
