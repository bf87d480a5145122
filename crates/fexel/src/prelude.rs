//! Convenience re-exports — `use fexel::prelude::*` for the common items.
//!
//! Routine combinators stay behind their module (`routine::repeat(..)`) so
//! call sites read clearly.

// Scene
pub use crate::scene::routine::{self, Sequence};
pub use crate::scene::{
    Behavior, Entity, EntityId, FrameSummary, HookContext, LookupScope, Phase, Resume, Routine,
    Scene, Step, StepKind, Stepper, Update,
};

// Errors
pub use crate::error::{BehaviorError, ConfigError, SceneError};

// Driving frames
pub use crate::driver::{Driver, DriverConfig, TickReport};
pub use crate::time::{FrameClock, FrameContext};

// Math and input
pub use crate::input::{Button, Gamepad, Input};
pub use crate::math::{Color, Mat4, Quat, Transform, Vec2, Vec3, Vec4};
