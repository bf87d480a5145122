//! # Behavior — Logic Attached to an Entity
//!
//! A behavior is any `'static` type implementing [`Behavior`]. Every hook has a
//! no-op default, so a behavior only writes the hooks it cares about:
//!
//! - [`on_mount`](Behavior::on_mount) — once, the first frame the scheduler
//!   reaches it, before its first update.
//! - [`on_update`](Behavior::on_update) — every frame, in execution order.
//!   Either finishes in one call ([`Update::Complete`]) or hands back a
//!   [`Routine`] that spreads the work over several scheduler steps.
//! - [`on_unmount`](Behavior::on_unmount) — when its entity is detached from
//!   the scene.
//!
//! The scheduler only ever sees `Box<dyn Behavior>`. Typed lookups from one
//! behavior to a sibling go through [`AsAny`] downcasts.

use std::any::Any;

use super::context::HookContext;
use super::routine::Routine;
use crate::error::BehaviorError;

/// Upcast helper so `dyn Behavior` can be downcast to its concrete type.
///
/// Blanket-implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What an update hook left behind.
pub enum Update {
    /// All of this frame's work is done.
    Complete,
    /// Keep going: the scheduler starts driving this routine in the same step
    /// and resumes it at every yield until it completes.
    Run(Box<dyn Routine>),
}

impl Update {
    pub fn run(routine: impl Routine + 'static) -> Self {
        Self::Run(Box::new(routine))
    }
}

impl std::fmt::Debug for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => f.write_str("Complete"),
            Self::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// A logic unit owned by exactly one [`Entity`](super::Entity).
pub trait Behavior: AsAny {
    /// Sort key for the update pass. Lower runs earlier; ties keep tree order.
    /// Read once per frame, after the mount pass.
    fn execution_order(&self) -> i32 {
        0
    }

    /// Short type name used in steps, logs, and errors.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn on_mount(&mut self, cx: &mut HookContext<'_>) -> Result<(), BehaviorError> {
        let _ = cx;
        Ok(())
    }

    fn on_update(&mut self, cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        let _ = cx;
        Ok(Update::Complete)
    }

    fn on_unmount(&mut self) {}
}

pub(crate) fn downcast_ref<'a, T: Behavior>(
    behavior: &'a (dyn Behavior + 'static),
) -> Option<&'a T> {
    <dyn Behavior as AsAny>::as_any(behavior).downcast_ref::<T>()
}

pub(crate) fn downcast_mut<'a, T: Behavior>(
    behavior: &'a mut (dyn Behavior + 'static),
) -> Option<&'a mut T> {
    <dyn Behavior as AsAny>::as_any_mut(behavior).downcast_mut::<T>()
}

/// One behavior plus the scheduler's bookkeeping for it.
pub(crate) struct BehaviorSlot {
    /// `None` only while one of its own hooks is running.
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) name: &'static str,
    /// Frame in which `on_mount` succeeded. `None` means unmounted.
    pub(crate) mounted_at: Option<u64>,
}

impl BehaviorSlot {
    pub(crate) fn new(behavior: Box<dyn Behavior>) -> Self {
        Self {
            name: behavior.name(),
            behavior: Some(behavior),
            mounted_at: None,
        }
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted_at.is_some()
    }
}

/// Strip the module path (and generic arguments) from a fully-qualified type
/// name, e.g. `game::prefab::PlayerGun` → `PlayerGun`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(idx) => &full[..idx],
        None => full,
    };
    base.rsplit("::").next().unwrap_or(base)
}
