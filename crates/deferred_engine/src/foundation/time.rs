//! Time management utilities

/// Frame timer driven by an external clock
///
/// The window reports absolute time in seconds; the timer turns successive
/// readings into per-frame deltas. Elapsed time is measured from the first
/// reading in `f64`, so it does not drift over long runs.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    first_time: Option<f64>,
    last_time: Option<f64>,
    delta_time: f32,
    frame_count: u64,
}

impl FrameTimer {
    /// Create a new timer
    pub const fn new() -> Self {
        Self {
            first_time: None,
            last_time: None,
            delta_time: 0.0,
            frame_count: 0,
        }
    }

    /// Advance the timer to `now_seconds` (call once per frame)
    ///
    /// The first tick yields a zero delta. Returns the new delta.
    pub fn tick(&mut self, now_seconds: f64) -> f32 {
        self.delta_time = self
            .last_time
            .map_or(0.0, |last| (now_seconds - last).max(0.0) as f32);
        self.first_time.get_or_insert(now_seconds);
        self.last_time = Some(now_seconds);
        self.frame_count += 1;
        self.delta_time
    }

    /// Get the time since the last frame in seconds
    pub const fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds between the first and the latest tick
    pub fn total_time(&self) -> f32 {
        match (self.first_time, self.last_time) {
            (Some(first), Some(last)) => (last - first).max(0.0) as f32,
            _ => 0.0,
        }
    }

    /// Get the current frame count
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since the first tick
    pub fn average_fps(&self) -> f32 {
        let total_time = self.total_time();
        if total_time > 0.0 {
            self.frame_count as f32 / total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_tick_has_zero_delta() {
        let mut timer = FrameTimer::new();
        assert_relative_eq!(timer.tick(10.0), 0.0);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn test_delta_between_ticks() {
        let mut timer = FrameTimer::new();
        timer.tick(1.0);
        assert_relative_eq!(timer.tick(1.25), 0.25);
        assert_relative_eq!(timer.tick(1.5), 0.25);
        assert_relative_eq!(timer.total_time(), 0.5);
        assert_relative_eq!(timer.average_fps(), 6.0);
    }

    #[test]
    fn test_clock_going_backwards_clamps_to_zero() {
        let mut timer = FrameTimer::new();
        timer.tick(2.0);
        assert_relative_eq!(timer.tick(1.0), 0.0);
    }

    #[test]
    fn test_total_time_does_not_drift_over_long_runs() {
        let mut timer = FrameTimer::new();
        let start = 5000.0;
        let frames = 600_000_u32;
        for frame in 0..frames {
            timer.tick(start + f64::from(frame) / 60.0);
        }
        let expected = (f64::from(frames - 1) / 60.0) as f32;
        assert_relative_eq!(timer.total_time(), expected, epsilon = 1e-2);
    }
}
