//! Frame timing and delta time.
//!
//! [`FrameContext`] is the immutable timing payload handed to every hook during
//! one [`Scene::update`](crate::scene::Scene::update) call. [`FrameClock`]
//! produces successive contexts for a driver, either from the wall clock or
//! from a fixed delta for deterministic stepping.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Timing for one frame. Passed by reference to every hook; never retained by
/// the scheduler across frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameContext {
    /// Total elapsed time in seconds when the frame started.
    pub time: f32,
    /// Seconds since the previous frame (unscaled).
    pub delta_time: f32,
    /// Zero-based frame counter.
    pub frame_count: u64,
    /// Multiplier applied by [`scaled_delta`](Self::scaled_delta).
    pub time_scale: f32,
}

impl FrameContext {
    pub fn new(time: f32, delta_time: f32, frame_count: u64, time_scale: f32) -> Self {
        Self {
            time,
            delta_time,
            frame_count,
            time_scale,
        }
    }

    /// Delta time with the time scale applied, the most common way to use it.
    pub fn scaled_delta(&self) -> f32 {
        self.delta_time * self.time_scale
    }
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0, 1.0)
    }
}

/// Produces a [`FrameContext`] per tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    /// When the current frame started (wall-clock mode only).
    frame_start: Instant,
    /// Total time accumulated over all ticks.
    elapsed: Duration,
    /// Frames produced so far.
    frame_count: u64,
    time_scale: f32,
    /// When set, every tick advances by exactly this much.
    fixed_delta: Option<Duration>,
}

impl FrameClock {
    /// A clock measuring real time between ticks.
    pub fn new() -> Self {
        Self {
            frame_start: Instant::now(),
            elapsed: Duration::ZERO,
            frame_count: 0,
            time_scale: 1.0,
            fixed_delta: None,
        }
    }

    /// A clock that advances by `delta` every tick regardless of wall time.
    pub fn fixed(delta: Duration) -> Self {
        Self {
            fixed_delta: Some(delta),
            ..Self::new()
        }
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Number of frames produced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advance to the next frame and return its context.
    pub fn tick(&mut self) -> FrameContext {
        let delta = match self.fixed_delta {
            Some(delta) => delta,
            None => {
                let now = Instant::now();
                let delta = now - self.frame_start;
                self.frame_start = now;
                delta
            }
        };
        self.elapsed += delta;

        let frame = FrameContext::new(
            self.elapsed.as_secs_f32(),
            delta.as_secs_f32(),
            self.frame_count,
            self.time_scale,
        );
        self.frame_count += 1;
        frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let mut clock = FrameClock::fixed(Duration::from_millis(500)).with_time_scale(2.0);

        let first = clock.tick();
        assert_eq!(first.frame_count, 0);
        assert!((first.delta_time - 0.5).abs() < 1e-6);
        assert!((first.time - 0.5).abs() < 1e-6);
        assert!((first.scaled_delta() - 1.0).abs() < 1e-6);

        let second = clock.tick();
        assert_eq!(second.frame_count, 1);
        assert!((second.time - 1.0).abs() < 1e-6);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn default_context_has_unit_scale() {
        let frame = FrameContext::default();
        assert_eq!(frame.frame_count, 0);
        assert_eq!(frame.time_scale, 1.0);
        assert_eq!(frame.scaled_delta(), 0.0);
    }
}
