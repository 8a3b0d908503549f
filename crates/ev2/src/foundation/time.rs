//! Frame timing for the main loop

use std::time::{Duration, Instant};

/// Frame timer feeding the per-frame delta into the scene passes
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
    max_delta: f32,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Longest frame the timer will report; longer stalls (debugger, window drag) are clipped
    pub const DEFAULT_MAX_DELTA: f32 = 0.25;

    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            max_delta: Self::DEFAULT_MAX_DELTA,
        }
    }

    /// Override the delta clip
    #[must_use]
    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta.max(0.0);
        self
    }

    /// Advance to a new frame and return its delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        if elapsed > self.max_delta {
            log::debug!("Clipping frame delta {:.3}s to {:.3}s", elapsed, self.max_delta);
        }
        self.delta_time = elapsed.min(self.max_delta);
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
        self.delta_time
    }

    /// Sleep away whatever is left of the frame budget for `target_fps`
    pub fn limit_frame_rate(&self, target_fps: u32) {
        if target_fps == 0 {
            return;
        }
        let budget = Duration::from_secs_f64(1.0 / f64::from(target_fps));
        let spent = self.last_frame.elapsed();
        if let Some(remaining) = budget.checked_sub(spent) {
            std::thread::sleep(remaining);
        }
    }

    /// Delta returned by the last `tick`
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Sum of all clipped deltas
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Ticks per second of accumulated time
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}
