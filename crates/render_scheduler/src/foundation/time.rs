//! Time management utilities

use std::time::{Duration, Instant};

/// Frame timer driving the FPS counter
///
/// `tick` is called once at the end of every rendered frame.
pub struct FrameTimer {
    last_frame: Instant,
    delta_time: f32,
    frames_per_second: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            frames_per_second: 0.0,
            frame_count: 0,
        }
    }

    /// Close the current frame
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.frames_per_second = if self.delta_time > 0.0 {
            1.0 / self.delta_time
        } else {
            0.0
        };
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Duration of the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Frames per second derived from the last frame duration
    pub fn fps(&self) -> f32 {
        self.frames_per_second
    }

    /// Number of frames closed so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Wall time since a frame started
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start measuring now
    pub fn start_new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since the stopwatch was started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
