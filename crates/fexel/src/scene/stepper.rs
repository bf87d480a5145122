//! # Stepper — The Frame Scheduler
//!
//! [`Scene::update`] returns a [`Stepper`]: a lazy, single-use iterator where
//! every `next()` performs exactly one unit of work and then stops.
//!
//! ## Two phases
//!
//! The tree is walked once, pre-order, when the stepper is created. That walk
//! is the canonical order for the frame.
//!
//! ```text
//!  tree: [A[B], C]        C has execution order -10
//!
//!  Phase::Mount   walk order, unmounted only   mount A · mount B · mount C
//!  Phase::Update  stable sort by order         update C · update A · update B
//! ```
//!
//! 1. **Mount** — each behavior that has never mounted gets `on_mount`, one
//!    step each. Already-mounted behaviors cost nothing.
//! 2. **Update** — every mounted behavior from the walk, stable-sorted by
//!    [`execution_order`](super::Behavior::execution_order) so equal keys keep
//!    tree order. One step per `on_update`, plus one per routine yield.
//!
//! ## Abandoning a frame
//!
//! Dropping a stepper early is always safe. Mount flags already set stay set;
//! in-flight routines are dropped. The next [`Scene::update`] starts both
//! phases over, so every mounted behavior is updated again.
//!
//! ## Failures
//!
//! A hook error comes back as `Some(Err(_))` from the pull that ran it, and
//! the stepper is finished after that. A behavior whose `on_mount` failed stays
//! unmounted and will be mounted again on a later frame.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::Scene;
use super::behavior::{Behavior, Update};
use super::context::HookContext;
use super::entity::{Entity, EntityId};
use super::routine::{Resume, Routine};
use crate::error::{BehaviorError, SceneError};
use crate::time::FrameContext;

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// `on_mount` ran.
    Mount,
    /// The update for this behavior finished in this step.
    Update,
    /// The update suspended at a routine yield; it resumes on the next pull.
    Suspend,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mount => "mount",
            Self::Update => "update",
            Self::Suspend => "update",
        })
    }
}

/// One unit of scheduler work, attributed to a behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub entity: EntityId,
    /// Index of the behavior on its entity.
    pub slot: usize,
    pub behavior: &'static str,
}

/// Where a [`Stepper`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Mount,
    Update,
    Done,
}

/// Counters for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSummary {
    pub frame_count: u64,
    pub steps: usize,
    pub mounts: usize,
    pub updates: usize,
    pub suspensions: usize,
    /// Wall time spent inside steps.
    #[cfg(feature = "diagnostics")]
    pub busy: std::time::Duration,
}

/// A behavior in the captured walk: entity index into `paths`, slot on it.
#[derive(Debug, Clone, Copy)]
struct BehaviorRef {
    entity: usize,
    slot: usize,
}

/// A behavior whose update is mid-routine.
struct Active {
    target: BehaviorRef,
    stack: Vec<Box<dyn Routine>>,
}

/// The lazily-pulled step sequence for one frame. See the module docs.
pub struct Stepper<'s> {
    scene: &'s mut Scene,
    frame: FrameContext,
    /// Child-index path from the roots to each visited entity, in walk order.
    paths: Vec<Vec<usize>>,
    /// Every behavior in walk order.
    walk: Vec<BehaviorRef>,
    /// Update order, built when the mount pass finishes.
    order: Vec<BehaviorRef>,
    cursor: usize,
    phase: Phase,
    active: Option<Active>,
    summary: FrameSummary,
}

impl<'s> Stepper<'s> {
    pub(crate) fn new(scene: &'s mut Scene, frame: FrameContext) -> Self {
        let mut paths = Vec::new();
        let mut walk = Vec::new();
        let mut path = Vec::new();
        for (index, root) in scene.roots.iter().enumerate() {
            path.push(index);
            capture(root, &mut path, &mut paths, &mut walk);
            path.pop();
        }

        log::trace!(
            "frame {}: captured {} entities, {} behaviors",
            frame.frame_count,
            paths.len(),
            walk.len()
        );

        Self {
            scene,
            frame,
            paths,
            walk,
            order: Vec::new(),
            cursor: 0,
            phase: Phase::Mount,
            active: None,
            summary: FrameSummary {
                frame_count: frame.frame_count,
                ..FrameSummary::default()
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    pub fn steps_taken(&self) -> usize {
        self.summary.steps
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// True once no work is left, even if the final `None` has not been
    /// pulled yet.
    pub fn is_exhausted(&self) -> bool {
        match self.phase {
            Phase::Mount => false,
            Phase::Update => self.active.is_none() && self.cursor >= self.order.len(),
            Phase::Done => true,
        }
    }

    pub fn summary(&self) -> FrameSummary {
        self.summary
    }

    /// Pull every remaining step.
    pub fn run_to_end(mut self) -> Result<FrameSummary, SceneError> {
        for step in &mut self {
            step?;
        }
        Ok(self.summary)
    }

    // ── Phase 1 ─────────────────────────────────────────────────────────

    fn next_mount(&mut self) -> Result<Option<Step>, SceneError> {
        while let Some(&target) = self.walk.get(self.cursor) {
            self.cursor += 1;

            let entity = self.entity_mut(target)?;
            let mounted = entity
                .behaviors
                .get(target.slot)
                .ok_or(SceneError::StalePath)?
                .is_mounted();
            if mounted {
                continue;
            }

            let frame_count = self.frame.frame_count;
            self.with_behavior(target, StepKind::Mount, |behavior, cx| {
                behavior.on_mount(cx)
            })?;
            let entity = self.entity_mut(target)?;
            entity.behaviors[target.slot].mounted_at = Some(frame_count);
            self.summary.mounts += 1;
            return self.step(target, StepKind::Mount).map(Some);
        }

        self.begin_update_pass()?;
        self.next_update()
    }

    fn begin_update_pass(&mut self) -> Result<(), SceneError> {
        let mut keyed = Vec::with_capacity(self.walk.len());
        for &target in &self.walk {
            let entity = resolve(&self.scene.roots, &self.paths[target.entity])
                .ok_or(SceneError::StalePath)?;
            let slot = entity
                .behaviors
                .get(target.slot)
                .ok_or(SceneError::StalePath)?;
            if !slot.is_mounted() {
                continue;
            }
            let behavior = slot.behavior.as_deref().ok_or(SceneError::VacantSlot {
                entity: entity.id(),
                slot: target.slot,
            })?;
            keyed.push((behavior.execution_order(), target));
        }
        // Stable: equal keys keep walk order.
        keyed.sort_by_key(|&(order, _)| order);

        self.order = keyed.into_iter().map(|(_, target)| target).collect();
        self.cursor = 0;
        self.phase = Phase::Update;
        log::debug!(
            "frame {}: mount pass done ({} mounted), updating {} behaviors",
            self.frame.frame_count,
            self.summary.mounts,
            self.order.len()
        );
        Ok(())
    }

    // ── Phase 2 ─────────────────────────────────────────────────────────

    fn next_update(&mut self) -> Result<Option<Step>, SceneError> {
        if let Some(active) = self.active.take() {
            return self.drive(active.target, active.stack).map(Some);
        }

        let Some(&target) = self.order.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let update = self.with_behavior(target, StepKind::Update, |behavior, cx| {
            behavior.on_update(cx)
        })?;
        match update {
            Update::Complete => {
                self.summary.updates += 1;
                self.step(target, StepKind::Update).map(Some)
            }
            Update::Run(routine) => self.drive(target, vec![routine]).map(Some),
        }
    }

    /// Resume the routine stack until something yields or everything is done.
    fn drive(
        &mut self,
        target: BehaviorRef,
        mut stack: Vec<Box<dyn Routine>>,
    ) -> Result<Step, SceneError> {
        let frame = self.frame;
        let entity = resolve_mut(&mut self.scene.roots, &self.paths[target.entity])
            .ok_or(SceneError::StalePath)?;

        loop {
            let Some(top) = stack.last_mut() else {
                self.summary.updates += 1;
                return self.step(target, StepKind::Update);
            };

            let resumed = {
                let mut cx = HookContext::new(&frame, entity, target.slot);
                top.resume(&mut cx)
            };
            match resumed {
                Ok(Resume::Yield) => {
                    self.active = Some(Active { target, stack });
                    self.summary.suspensions += 1;
                    return self.step(target, StepKind::Suspend);
                }
                Ok(Resume::Complete) => {
                    stack.pop();
                }
                Ok(Resume::Call(sub)) => stack.push(sub),
                Err(source) => return Err(hook_error(entity, target.slot, StepKind::Update, source)),
            }
        }
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    fn entity_mut(&mut self, target: BehaviorRef) -> Result<&mut Entity, SceneError> {
        resolve_mut(&mut self.scene.roots, &self.paths[target.entity]).ok_or(SceneError::StalePath)
    }

    /// Lift the behavior out of its slot, run `f` with it and a context over
    /// its entity, and put it back, even if `f` panics.
    fn with_behavior<R>(
        &mut self,
        target: BehaviorRef,
        kind: StepKind,
        f: impl FnOnce(&mut dyn Behavior, &mut HookContext<'_>) -> Result<R, BehaviorError>,
    ) -> Result<R, SceneError> {
        let frame = self.frame;
        let entity = self.entity_mut(target)?;
        let id = entity.id();
        let mut behavior = entity
            .behaviors
            .get_mut(target.slot)
            .ok_or(SceneError::StalePath)?
            .behavior
            .take()
            .ok_or(SceneError::VacantSlot {
                entity: id,
                slot: target.slot,
            })?;

        let result = {
            let mut cx = HookContext::new(&frame, entity, target.slot);
            panic::catch_unwind(AssertUnwindSafe(|| f(&mut *behavior, &mut cx)))
        };
        // Put it back before a panic carries on unwinding.
        entity.behaviors[target.slot].behavior = Some(behavior);
        let result = result.unwrap_or_else(|payload| panic::resume_unwind(payload));

        result.map_err(|source| hook_error(entity, target.slot, kind, source))
    }

    fn step(&mut self, target: BehaviorRef, kind: StepKind) -> Result<Step, SceneError> {
        let entity = resolve(&self.scene.roots, &self.paths[target.entity])
            .ok_or(SceneError::StalePath)?;
        let step = Step {
            kind,
            entity: entity.id(),
            slot: target.slot,
            behavior: entity.behaviors[target.slot].name,
        };
        log::trace!(
            "frame {}: {:?} {} on '{}'",
            self.frame.frame_count,
            kind,
            step.behavior,
            entity.name()
        );
        Ok(step)
    }

    fn pull(&mut self) -> Result<Option<Step>, SceneError> {
        match self.phase {
            Phase::Mount => self.next_mount(),
            Phase::Update => self.next_update(),
            Phase::Done => Ok(None),
        }
    }
}

impl Iterator for Stepper<'_> {
    type Item = Result<Step, SceneError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Done {
            return None;
        }

        #[cfg(feature = "diagnostics")]
        let start = std::time::Instant::now();
        let pulled = self.pull();
        #[cfg(feature = "diagnostics")]
        {
            self.summary.busy += start.elapsed();
        }

        match pulled {
            Ok(Some(step)) => {
                self.summary.steps += 1;
                Some(Ok(step))
            }
            Ok(None) => {
                self.phase = Phase::Done;
                log::debug!(
                    "frame {} complete: {} steps ({} mounts, {} updates, {} suspensions)",
                    self.summary.frame_count,
                    self.summary.steps,
                    self.summary.mounts,
                    self.summary.updates,
                    self.summary.suspensions
                );
                None
            }
            Err(err) => {
                self.phase = Phase::Done;
                self.active = None;
                log::warn!("frame {} stopped: {}", self.summary.frame_count, err);
                Some(Err(err))
            }
        }
    }
}

impl Drop for Stepper<'_> {
    fn drop(&mut self) {
        if self.phase != Phase::Done {
            log::debug!(
                "frame {} abandoned after {} steps in {:?} phase",
                self.summary.frame_count,
                self.summary.steps,
                self.phase
            );
        }
    }
}

/// Record `entity` and its subtree in pre-order.
fn capture(
    entity: &Entity,
    path: &mut Vec<usize>,
    paths: &mut Vec<Vec<usize>>,
    walk: &mut Vec<BehaviorRef>,
) {
    let index = paths.len();
    paths.push(path.clone());
    walk.extend((0..entity.behaviors.len()).map(|slot| BehaviorRef {
        entity: index,
        slot,
    }));
    for (child_index, child) in entity.children.iter().enumerate() {
        path.push(child_index);
        capture(child, path, paths, walk);
        path.pop();
    }
}

pub(super) fn resolve<'a>(roots: &'a [Entity], path: &[usize]) -> Option<&'a Entity> {
    let (first, rest) = path.split_first()?;
    let mut entity = roots.get(*first)?;
    for &index in rest {
        entity = entity.children.get(index)?;
    }
    Some(entity)
}

pub(super) fn resolve_mut<'a>(roots: &'a mut [Entity], path: &[usize]) -> Option<&'a mut Entity> {
    let (first, rest) = path.split_first()?;
    let mut entity = roots.get_mut(*first)?;
    for &index in rest {
        entity = entity.children.get_mut(index)?;
    }
    Some(entity)
}

fn hook_error(entity: &Entity, slot: usize, kind: StepKind, source: BehaviorError) -> SceneError {
    SceneError::Hook {
        kind,
        entity: entity.id(),
        entity_name: entity.name().to_string(),
        behavior: entity.behaviors.get(slot).map_or("?", |slot| slot.name),
        source,
    }
}
