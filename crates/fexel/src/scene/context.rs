//! The view of the world a hook or routine gets while it runs.

use super::behavior::{Behavior, downcast_mut, downcast_ref};
use super::entity::{Entity, EntityId};
use crate::error::BehaviorError;
use crate::time::FrameContext;

/// Passed to every hook and routine resume.
///
/// Exposes the frame timing and the owning entity's behaviors. Tree shape is
/// read-only from here: entities cannot be added or removed mid-frame.
///
/// While a behavior's own hook runs, that behavior is lifted out of its slot,
/// so sibling lookups never alias `&mut self`. Routines run with the owner back
/// in place and reach it through [`owner`](Self::owner)/[`owner_mut`](Self::owner_mut).
pub struct HookContext<'a> {
    frame: &'a FrameContext,
    entity: &'a mut Entity,
    slot: usize,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(frame: &'a FrameContext, entity: &'a mut Entity, slot: usize) -> Self {
        Self {
            frame,
            entity,
            slot,
        }
    }

    pub fn frame(&self) -> &FrameContext {
        self.frame
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn entity_name(&self) -> &str {
        self.entity.name()
    }

    /// Back-reference to the parent entity, if any.
    pub fn parent_id(&self) -> Option<EntityId> {
        self.entity.parent()
    }

    pub fn child_count(&self) -> usize {
        self.entity.children().len()
    }

    /// First sibling behavior of type `T`.
    pub fn behavior<T: Behavior>(&self) -> Option<&T> {
        self.entity.find_behavior::<T>()
    }

    pub fn behavior_mut<T: Behavior>(&mut self) -> Option<&mut T> {
        self.entity.find_behavior_mut::<T>()
    }

    /// Like [`behavior_mut`](Self::behavior_mut), but a missing sibling is an
    /// error the hook can propagate with `?`.
    pub fn require_mut<T: Behavior>(&mut self) -> Result<&mut T, BehaviorError> {
        self.entity
            .find_behavior_mut::<T>()
            .ok_or_else(BehaviorError::missing::<T>)
    }

    /// First sibling behavior matching `predicate`.
    pub fn find_behavior(
        &self,
        predicate: impl FnMut(&dyn Behavior) -> bool,
    ) -> Option<&dyn Behavior> {
        self.entity.find_behavior_where(predicate)
    }

    /// First behavior of type `T` on this entity or anywhere beneath it.
    pub fn find_in_descendants<T: Behavior>(&self) -> Option<&T> {
        self.entity.find_in_descendants::<T>()
    }

    /// The behavior this hook or routine belongs to. `None` inside the owner's
    /// own hooks, where it is already borrowed as `self`.
    pub fn owner<T: Behavior>(&self) -> Option<&T> {
        let slot = self.entity.behaviors.get(self.slot)?;
        downcast_ref::<T>(slot.behavior.as_deref()?)
    }

    pub fn owner_mut<T: Behavior>(&mut self) -> Option<&mut T> {
        let slot = self.entity.behaviors.get_mut(self.slot)?;
        downcast_mut::<T>(slot.behavior.as_deref_mut()?)
    }
}
