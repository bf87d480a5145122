//! Error types.
//!
//! [`BehaviorError`] is what a hook returns when it fails. The scheduler wraps
//! it in [`SceneError::Hook`] with the entity and behavior that produced it and
//! hands it to whoever is pulling the step sequence. Nothing is retried within
//! the frame.

use thiserror::Error;

use crate::scene::{EntityId, StepKind};

/// Failure raised by a behavior hook or routine.
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("{0}")]
    Message(String),
    /// A sibling lookup the behavior depends on came back empty.
    #[error("required behavior `{behavior}` is not attached")]
    MissingBehavior { behavior: &'static str },
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl BehaviorError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Shorthand for a failed lookup of behavior type `T`.
    pub fn missing<T: 'static>() -> Self {
        Self::MissingBehavior {
            behavior: crate::scene::short_type_name(std::any::type_name::<T>()),
        }
    }
}

/// Errors surfaced by the scene tree and the frame scheduler.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("{kind} hook of `{behavior}` on entity '{entity_name}' ({entity}) failed: {source}")]
    Hook {
        kind: StepKind,
        entity: EntityId,
        entity_name: String,
        behavior: &'static str,
        #[source]
        source: BehaviorError,
    },
    /// A behavior was missing from its slot when the scheduler reached it.
    /// Slots are refilled even when a hook panics.
    #[error("behavior slot {slot} on entity {entity} is vacant")]
    VacantSlot { entity: EntityId, slot: usize },
    #[error("traversal path no longer resolves to an entity")]
    StalePath,
    #[error("entity {0} is not part of this scene")]
    EntityNotFound(EntityId),
}

/// Errors loading a [`DriverConfig`](crate::driver::DriverConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse driver config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("time scale must be finite and non-negative, got {0}")]
    InvalidTimeScale(f32),
    #[error("step budget must be at least 1")]
    ZeroStepBudget,
    #[error("fixed delta must be positive, got {0}")]
    InvalidFixedDelta(f32),
}
