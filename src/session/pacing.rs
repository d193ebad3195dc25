//! Frame-rate pacing over one-second accounting windows.
//!
//! The pacer decides, for a given instant, whether the streaming loop
//! should capture, wait out the rest of a saturated window, or close the
//! window and report how many frames fell short of the target.

use std::time::{Duration, Instant};

/// Length of an accounting window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// What the loop should do on this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The window elapsed; a new one starts now.
    WindowClosed {
        /// Shortfall against the target rate, zero when it was met.
        dropped: u32,
    },
    /// Target already reached in this window; sleep for the remainder.
    Throttle(Duration),
    /// Capture and send one frame set.
    Capture,
}

/// Per-window frame accounting for a fixed target rate.
#[derive(Debug, Clone)]
pub struct Pacer {
    target_fps: u32,
    interval: Duration,
    window_start: Instant,
    captured: u32,
}

impl Pacer {
    /// Starts the first window at `now`. `target_fps` must be positive.
    pub fn new(target_fps: u32, now: Instant) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            target_fps,
            interval: WINDOW / target_fps,
            window_start: now,
            captured: 0,
        }
    }

    /// Decides the next step at `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= WINDOW {
            let dropped = self.target_fps.saturating_sub(self.captured);
            self.captured = 0;
            self.window_start = now;
            Tick::WindowClosed { dropped }
        } else if self.captured >= self.target_fps {
            Tick::Throttle(WINDOW - elapsed)
        } else {
            Tick::Capture
        }
    }

    /// Counts a captured frame set against the current window.
    pub fn record_capture(&mut self) {
        self.captured += 1;
    }

    /// Spacing between consecutive captures.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Frames allowed per window.
    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Frames captured in the current window.
    pub fn captured(&self) -> u32 {
        self.captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Drives a pacer with a synthetic clock where each capture costs
    /// `capture_cost` and returns (captures per closed window, drops).
    fn simulate(fps: u32, capture_cost: Duration, windows: usize) -> Vec<(u32, u32)> {
        let start = Instant::now();
        let mut now = start;
        let mut pacer = Pacer::new(fps, start);
        let mut closed = Vec::new();
        let mut in_window = 0;

        while closed.len() < windows {
            match pacer.tick(now) {
                Tick::WindowClosed { dropped } => {
                    closed.push((in_window, dropped));
                    in_window = 0;
                }
                Tick::Throttle(wait) => now += wait,
                Tick::Capture => {
                    pacer.record_capture();
                    in_window += 1;
                    now += capture_cost + pacer.interval();
                }
            }
        }
        closed
    }

    #[test]
    fn test_meets_target_with_instant_capture() {
        for (captured, dropped) in simulate(5, Duration::ZERO, 4) {
            assert_eq!(captured, 5);
            assert_eq!(dropped, 0);
        }
    }

    #[test]
    fn test_slow_capture_reports_shortfall() {
        // 400ms per capture + 250ms spacing: two frames fit in a window.
        let windows = simulate(4, Duration::from_millis(400), 3);
        assert_eq!(windows[0], (2, 2));
    }

    #[test]
    fn test_throttles_when_saturated() {
        let start = Instant::now();
        let mut pacer = Pacer::new(2, start);
        assert_eq!(pacer.tick(start), Tick::Capture);
        pacer.record_capture();
        assert_eq!(pacer.tick(start), Tick::Capture);
        pacer.record_capture();

        let later = start + Duration::from_millis(300);
        assert_eq!(pacer.tick(later), Tick::Throttle(Duration::from_millis(700)));

        let next = start + WINDOW;
        assert_eq!(pacer.tick(next), Tick::WindowClosed { dropped: 0 });
        assert_eq!(pacer.captured(), 0);
        assert_eq!(pacer.tick(next), Tick::Capture);
    }

    #[test]
    fn test_interval() {
        let pacer = Pacer::new(4, Instant::now());
        assert_eq!(pacer.interval(), Duration::from_millis(250));
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_target(fps in 1u32..=60, cost_ms in 0u64..300) {
            for (captured, dropped) in simulate(fps, Duration::from_millis(cost_ms), 3) {
                prop_assert!(captured <= fps);
                prop_assert_eq!(captured + dropped, fps);
            }
        }
    }
}
