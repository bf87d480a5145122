//! # Driver — Pulling Frames Out of a Scene
//!
//! The scheduler never decides when a frame happens. A [`Driver`] is the
//! simplest host for it: each [`tick`](Driver::tick) asks the clock for a new
//! [`FrameContext`](crate::time::FrameContext), starts a frame, and pulls steps
//! until the frame is done or the per-tick step budget runs out. Whatever is
//! left of an over-budget frame is abandoned; the next tick starts a fresh one.
//!
//! ## Configuration
//!
//! [`DriverConfig`] is plain serde data, so it can live in a JSON file:
//!
//! ```json
//! { "time_scale": 0.5, "step_budget": 64, "fixed_delta": 0.016 }
//! ```
//!
//! Missing fields fall back to [`DriverConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SceneError};
use crate::scene::{FrameSummary, Scene};
use crate::time::FrameClock;

/// Settings for a [`Driver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Copied into every frame's context.
    pub time_scale: f32,
    /// Maximum steps pulled per tick. `None` runs every frame to the end.
    pub step_budget: Option<usize>,
    /// Seconds per frame for deterministic stepping. `None` uses wall time.
    pub fixed_delta: Option<f32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            step_budget: None,
            fixed_delta: None,
        }
    }
}

impl DriverConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::InvalidTimeScale(self.time_scale));
        }
        if self.step_budget == Some(0) {
            return Err(ConfigError::ZeroStepBudget);
        }
        if let Some(delta) = self.fixed_delta {
            if !delta.is_finite() || delta <= 0.0 {
                return Err(ConfigError::InvalidFixedDelta(delta));
            }
        }
        Ok(())
    }

    fn clock(&self) -> FrameClock {
        let clock = match self.fixed_delta {
            Some(delta) => FrameClock::fixed(Duration::from_secs_f32(delta)),
            None => FrameClock::new(),
        };
        clock.with_time_scale(self.time_scale)
    }
}

/// What one [`Driver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub summary: FrameSummary,
    /// `false` if the step budget ran out with work left in the frame.
    pub completed: bool,
}

/// Owns a scene and a clock and runs one frame per tick.
pub struct Driver {
    scene: Scene,
    clock: FrameClock,
    config: DriverConfig,
}

impl Driver {
    pub fn new(scene: Scene, config: DriverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clock: config.clock(),
            scene,
            config,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access for tree edits between ticks.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn set_time_scale(&mut self, time_scale: f32) -> Result<(), ConfigError> {
        let candidate = DriverConfig {
            time_scale,
            ..self.config.clone()
        };
        candidate.validate()?;
        self.config = candidate;
        self.clock.set_time_scale(time_scale);
        Ok(())
    }

    /// Run one frame, up to the step budget.
    pub fn tick(&mut self) -> Result<TickReport, SceneError> {
        let frame = self.clock.tick();
        let budget = self.config.step_budget.unwrap_or(usize::MAX);

        let mut stepper = self.scene.update(frame);
        while stepper.steps_taken() < budget {
            match stepper.next() {
                Some(step) => {
                    step?;
                }
                None => break,
            }
        }

        let completed = stepper.is_exhausted();
        let summary = stepper.summary();
        if !completed {
            log::warn!(
                "frame {} hit the step budget ({}), abandoning the rest",
                frame.frame_count,
                budget
            );
        }
        Ok(TickReport { summary, completed })
    }

    /// Tick `frames` times, stopping at the first error.
    pub fn run_frames(&mut self, frames: usize) -> Result<Vec<TickReport>, SceneError> {
        (0..frames).map(|_| self.tick()).collect()
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }
}
