//! # Entity — A Node in the Scene Tree
//!
//! An [`Entity`] owns an ordered list of behaviors and an ordered list of child
//! entities. Ownership flows strictly downward: dropping an entity drops its
//! whole subtree. The only upward link is [`parent`](Entity::parent), a plain
//! [`EntityId`] used for lookups, never for ownership.
//!
//! Insertion order matters. Children are visited in the order they were added,
//! and that pre-order walk is the order behaviors mount in.
//!
//! ```text
//!  A            traversal: A, B, D, C
//!  ├── B
//!  │   └── D
//!  └── C
//! ```
//!
//! Because children are held by value, a cycle cannot be built.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::behavior::{Behavior, BehaviorSlot, downcast_mut, downcast_ref};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Entity`]. Stable for the entity's lifetime,
/// including across detach/re-attach.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id. Useful for diagnostics.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tree node carrying behaviors and children.
///
/// # Example
///
/// ```ignore
/// let player = Entity::new("player")
///     .with(Transform::from_xyz(0.0, 0.0, 0.0))
///     .with(PlayerMovement::default())
///     .add_child(Entity::new("gun").with(PlayerGun::default()));
/// ```
pub struct Entity {
    id: EntityId,
    name: String,
    parent: Option<EntityId>,
    pub(crate) behaviors: Vec<BehaviorSlot>,
    pub(crate) children: Vec<Entity>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::next(),
            name: name.into(),
            parent: None,
            behaviors: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an entity with an initial list of behaviors.
    pub fn with_behaviors(name: impl Into<String>, behaviors: Vec<Box<dyn Behavior>>) -> Self {
        let mut entity = Self::new(name);
        entity
            .behaviors
            .extend(behaviors.into_iter().map(BehaviorSlot::new));
        entity
    }

    /// Attach a behavior (builder style).
    pub fn with(mut self, behavior: impl Behavior) -> Self {
        self.push_behavior(behavior);
        self
    }

    /// Attach a behavior after construction. Only safe between frames; the
    /// scheduler holds the scene mutably while a frame is in flight.
    pub fn push_behavior(&mut self, behavior: impl Behavior) {
        self.behaviors.push(BehaviorSlot::new(Box::new(behavior)));
    }

    /// Append a child (builder style).
    pub fn add_child(mut self, child: Entity) -> Self {
        self.push_child(child);
        self
    }

    /// Append a child after construction.
    pub fn push_child(&mut self, mut child: Entity) {
        child.parent = Some(self.id);
        self.children.push(child);
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the parent entity. Set when the entity is added as a child and
    /// re-derived from the tree at the start of every frame.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    /// Iterate over attached behaviors. A behavior whose hook is currently
    /// running is skipped.
    pub fn behaviors(&self) -> impl Iterator<Item = &dyn Behavior> {
        self.behaviors
            .iter()
            .filter_map(|slot| slot.behavior.as_deref())
    }

    /// Whether the behavior at `index` has been mounted.
    pub fn is_mounted(&self, index: usize) -> bool {
        self.behaviors
            .get(index)
            .is_some_and(BehaviorSlot::is_mounted)
    }

    /// The frame in which the behavior at `index` was mounted.
    pub fn mounted_at(&self, index: usize) -> Option<u64> {
        self.behaviors.get(index).and_then(|slot| slot.mounted_at)
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// First behavior of type `T` on this entity.
    pub fn find_behavior<T: Behavior>(&self) -> Option<&T> {
        self.behaviors
            .iter()
            .filter_map(|slot| slot.behavior.as_deref())
            .find_map(downcast_ref::<T>)
    }

    pub fn find_behavior_mut<T: Behavior>(&mut self) -> Option<&mut T> {
        self.behaviors
            .iter_mut()
            .filter_map(|slot| slot.behavior.as_deref_mut())
            .find_map(downcast_mut::<T>)
    }

    /// First behavior on this entity matching `predicate`.
    pub fn find_behavior_where(
        &self,
        mut predicate: impl FnMut(&dyn Behavior) -> bool,
    ) -> Option<&dyn Behavior> {
        self.behaviors().find(|behavior| predicate(*behavior))
    }

    /// First behavior of type `T` on this entity or its descendants, searched
    /// in pre-order.
    pub fn find_in_descendants<T: Behavior>(&self) -> Option<&T> {
        self.find_behavior::<T>().or_else(|| {
            self.children
                .iter()
                .find_map(|child| child.find_in_descendants::<T>())
        })
    }

    /// Find an entity in this subtree (including `self`) by id.
    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_entity(id))
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_entity_mut(id))
    }

    /// Number of entities in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Entity::subtree_len).sum::<usize>()
    }

    /// Number of behaviors in this subtree.
    pub fn subtree_behavior_count(&self) -> usize {
        self.behaviors.len()
            + self
                .children
                .iter()
                .map(Entity::subtree_behavior_count)
                .sum::<usize>()
    }

    /// Point every child in this subtree back at its owner.
    pub(crate) fn relink_children(&mut self) {
        let id = self.id;
        for child in &mut self.children {
            child.parent = Some(id);
            child.relink_children();
        }
    }

    /// Run `on_unmount` for every mounted behavior in this subtree (pre-order)
    /// and clear their mount flags.
    pub(crate) fn unmount_subtree(&mut self) -> usize {
        let mut count = 0;
        for slot in &mut self.behaviors {
            if slot.mounted_at.take().is_some() {
                if let Some(behavior) = slot.behavior.as_deref_mut() {
                    behavior.on_unmount();
                }
                count += 1;
            }
        }
        for child in &mut self.children {
            count += child.unmount_subtree();
        }
        count
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field(
                "behaviors",
                &self.behaviors.iter().map(|slot| slot.name).collect::<Vec<_>>(),
            )
            .field("children", &self.children.len())
            .finish()
    }
}
