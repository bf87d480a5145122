//! # Scene — The Tree Root and Its Frame Scheduler
//!
//! A [`Scene`] owns the top-level entities. Everything the rest of an
//! application needs from it is one call:
//!
//! ```ignore
//! let mut stepper = scene.update(frame);
//! while let Some(step) = stepper.next() {
//!     let step = step?;
//!     // one unit of work just happened
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`behavior`] — The [`Behavior`] trait and its lifecycle hooks
//! - [`routine`] — Resumable update logic and combinators
//! - [`entity`] — Tree nodes, identity, typed lookups
//! - [`context`] — What a hook sees while it runs
//! - [`stepper`] — The two-phase, step-granular frame scheduler
//!
//! ## Editing the tree
//!
//! [`update`](Scene::update) borrows the scene mutably for as long as the
//! returned [`Stepper`] lives, so the tree can only change between frames.
//! Drop the stepper (finished or not) before attaching or detaching entities.

pub mod behavior;
pub mod context;
pub mod entity;
pub mod routine;
pub mod stepper;

pub use behavior::{AsAny, Behavior, Update, short_type_name};
pub use context::HookContext;
pub use entity::{Entity, EntityId};
pub use routine::{Resume, Routine};
pub use stepper::{FrameSummary, Phase, Step, StepKind, Stepper};

use stepper::{resolve, resolve_mut};

use crate::error::SceneError;
use crate::time::FrameContext;

/// Where [`Scene::find_behavior`] looks, always starting at the given entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    /// Only the entity itself (its sibling behaviors).
    Entity,
    /// The entity, then its ancestors nearest-first.
    Ancestors,
    /// The entity, then its subtree in pre-order.
    Descendants,
}

/// The root of an entity tree.
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) roots: Vec<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level entity (builder style).
    pub fn add_child(mut self, entity: Entity) -> Self {
        self.spawn(entity);
        self
    }

    /// Append a top-level entity, returning its id.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = entity.id();
        entity.set_parent(None);
        self.roots.push(entity);
        id
    }

    /// Append `entity` as the last child of `parent`.
    pub fn spawn_child(
        &mut self,
        parent: EntityId,
        entity: Entity,
    ) -> Result<EntityId, SceneError> {
        let id = entity.id();
        self.entity_mut(parent)
            .ok_or(SceneError::EntityNotFound(parent))?
            .push_child(entity);
        Ok(id)
    }

    pub fn children(&self) -> &[Entity] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of entities in the tree.
    pub fn entity_count(&self) -> usize {
        self.roots.iter().map(Entity::subtree_len).sum()
    }

    /// Total number of behaviors in the tree.
    pub fn behavior_count(&self) -> usize {
        self.roots.iter().map(Entity::subtree_behavior_count).sum()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.roots.iter().find_map(|root| root.find_entity(id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.roots.iter_mut().find_map(|root| root.find_entity_mut(id))
    }

    /// Ids of the ancestors of `id`, nearest first. Empty for a root or an
    /// unknown id.
    pub fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let Some(path) = self.path_to(id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = (1..path.len())
            .filter_map(|depth| resolve(&self.roots, &path[..depth]))
            .map(Entity::id)
            .collect();
        out.reverse();
        out
    }

    /// Child-index path from the roots to `id`, found by walking the tree.
    fn path_to(&self, id: EntityId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        find_path(&self.roots, id, &mut path).then_some(path)
    }

    /// First behavior of type `T` reachable from `id` within `scope`.
    pub fn find_behavior<T: Behavior>(&self, id: EntityId, scope: LookupScope) -> Option<&T> {
        let entity = self.entity(id)?;
        match scope {
            LookupScope::Entity => entity.find_behavior::<T>(),
            LookupScope::Descendants => entity.find_in_descendants::<T>(),
            LookupScope::Ancestors => entity.find_behavior::<T>().or_else(|| {
                self.ancestors(id)
                    .into_iter()
                    .filter_map(|ancestor| self.entity(ancestor))
                    .find_map(Entity::find_behavior::<T>)
            }),
        }
    }

    /// Remove the subtree rooted at `id` from the scene.
    ///
    /// Every mounted behavior in it gets `on_unmount` (pre-order) and is
    /// flagged unmounted, so attaching the entity again mounts it afresh.
    pub fn detach(&mut self, id: EntityId) -> Option<Entity> {
        let path = self.path_to(id)?;
        let (&index, parent_path) = path.split_last()?;
        let mut detached = if parent_path.is_empty() {
            self.roots.remove(index)
        } else {
            resolve_mut(&mut self.roots, parent_path)?.children.remove(index)
        };

        let unmounted = detached.unmount_subtree();
        detached.set_parent(None);
        log::debug!(
            "detached entity '{}' ({}), {} behaviors unmounted",
            detached.name(),
            id,
            unmounted
        );
        Some(detached)
    }

    /// Start a frame. See [`Stepper`] for what each pull does.
    pub fn update(&mut self, frame: FrameContext) -> Stepper<'_> {
        for root in &mut self.roots {
            root.set_parent(None);
            root.relink_children();
        }
        Stepper::new(self, frame)
    }
}

fn find_path(entities: &[Entity], id: EntityId, path: &mut Vec<usize>) -> bool {
    for (index, entity) in entities.iter().enumerate() {
        path.push(index);
        if entity.id() == id || find_path(&entity.children, id, path) {
            return true;
        }
        path.pop();
    }
    false
}

#[cfg(test)]
mod tests;
