use std::cell::RefCell;
use std::rc::Rc;

use super::routine::{self, Resume, Sequence};
use super::*;
use crate::error::{BehaviorError, SceneError};
use crate::math::Transform;
use crate::time::FrameContext;

// ── Fixtures ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Mount(&'static str),
    Update(&'static str),
    Resume(&'static str),
    Unmount(&'static str),
}

type Journal = Rc<RefCell<Vec<Event>>>;

/// Logs every hook call. Optionally suspends `yields` times per update.
struct Recorder {
    label: &'static str,
    order: i32,
    yields: u32,
    journal: Journal,
    frames_seen: Vec<u64>,
}

impl Recorder {
    fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            order: 0,
            yields: 0,
            journal: journal.clone(),
            frames_seen: Vec::new(),
        }
    }

    fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn yields(mut self, yields: u32) -> Self {
        self.yields = yields;
        self
    }
}

impl Behavior for Recorder {
    fn execution_order(&self) -> i32 {
        self.order
    }

    fn on_mount(&mut self, _cx: &mut HookContext<'_>) -> Result<(), BehaviorError> {
        self.journal.borrow_mut().push(Event::Mount(self.label));
        Ok(())
    }

    fn on_update(&mut self, cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        self.frames_seen.push(cx.frame().frame_count);
        self.journal.borrow_mut().push(Event::Update(self.label));
        if self.yields == 0 {
            return Ok(Update::Complete);
        }
        let journal = self.journal.clone();
        let label = self.label;
        Ok(Update::run(routine::repeat(self.yields, move |_, _| {
            journal.borrow_mut().push(Event::Resume(label));
            Ok(())
        })))
    }

    fn on_unmount(&mut self) {
        self.journal.borrow_mut().push(Event::Unmount(self.label));
    }
}

fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

fn frame(n: u64) -> FrameContext {
    FrameContext::new(n as f32 / 60.0, 1.0 / 60.0, n, 1.0)
}

/// Pull every step, panicking on errors, and return `(kind, entity)` pairs.
fn drain(stepper: Stepper<'_>) -> Vec<(StepKind, EntityId)> {
    stepper
        .map(|step| {
            let step = step.expect("step failed");
            (step.kind, step.entity)
        })
        .collect()
}

/// Tree `[A[B], C]`, one recorder each.
fn abc_scene(journal: &Journal) -> (Scene, EntityId, EntityId, EntityId) {
    let b = Entity::new("B").with(Recorder::new("B", journal));
    let b_id = b.id();
    let a = Entity::new("A").with(Recorder::new("A", journal)).add_child(b);
    let a_id = a.id();
    let c = Entity::new("C").with(Recorder::new("C", journal));
    let c_id = c.id();
    (Scene::new().add_child(a).add_child(c), a_id, b_id, c_id)
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn empty_scene_has_no_steps() {
    let mut scene = Scene::new();
    let mut stepper = scene.update(frame(0));
    assert!(stepper.next().is_none());
    assert!(stepper.is_done());
    assert_eq!(stepper.steps_taken(), 0);
}

#[test]
fn single_behavior_mounts_then_updates() {
    let journal = journal();
    let entity = Entity::new("A").with(Recorder::new("A", &journal));
    let id = entity.id();
    let mut scene = Scene::new().add_child(entity);

    assert_eq!(
        drain(scene.update(frame(0))),
        vec![(StepKind::Mount, id), (StepKind::Update, id)]
    );
    for n in 1..4 {
        assert_eq!(drain(scene.update(frame(n))), vec![(StepKind::Update, id)]);
    }
    let mounts = journal
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::Mount(_)))
        .count();
    assert_eq!(mounts, 1);
}

#[test]
fn mounts_follow_tree_pre_order_then_updates() {
    let journal = journal();
    let (mut scene, a, b, c) = abc_scene(&journal);

    assert_eq!(
        drain(scene.update(frame(0))),
        vec![
            (StepKind::Mount, a),
            (StepKind::Mount, b),
            (StepKind::Mount, c),
            (StepKind::Update, a),
            (StepKind::Update, b),
            (StepKind::Update, c),
        ]
    );
    assert_eq!(
        *journal.borrow(),
        vec![
            Event::Mount("A"),
            Event::Mount("B"),
            Event::Mount("C"),
            Event::Update("A"),
            Event::Update("B"),
            Event::Update("C"),
        ]
    );
}

#[test]
fn lower_execution_order_updates_first() {
    let journal = journal();
    let a = Entity::new("A").with(Recorder::new("A", &journal));
    let b = Entity::new("B").with(Recorder::new("B", &journal).order(-10));
    let (a_id, b_id) = (a.id(), b.id());
    let mut scene = Scene::new().add_child(a).add_child(b);

    assert_eq!(
        drain(scene.update(frame(0))),
        vec![
            (StepKind::Mount, a_id),
            (StepKind::Mount, b_id),
            (StepKind::Update, b_id),
            (StepKind::Update, a_id),
        ]
    );
}

#[test]
fn equal_priority_keeps_tree_order() {
    let journal = journal();
    let scene_root = Entity::new("root")
        .with(Recorder::new("late", &journal).order(5))
        .with(Recorder::new("root", &journal))
        .add_child(
            Entity::new("child")
                .with(Recorder::new("child", &journal))
                .add_child(Entity::new("grandchild").with(Recorder::new("grandchild", &journal))),
        )
        .add_child(Entity::new("sibling").with(Recorder::new("sibling", &journal).order(-1)));
    let mut scene = Scene::new().add_child(scene_root);

    scene.update(frame(0)).run_to_end().unwrap();

    let updates: Vec<_> = journal
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Update(label) => Some(*label),
            _ => None,
        })
        .collect();
    assert_eq!(updates, ["sibling", "root", "child", "grandchild", "late"]);
}

#[test]
fn abandoned_frame_is_rewalked_from_scratch() {
    let journal = journal();
    let (mut scene, a, b, c) = abc_scene(&journal);

    {
        let mut stepper = scene.update(frame(0));
        assert_eq!(stepper.next().unwrap().unwrap().entity, a);
        assert_eq!(stepper.next().unwrap().unwrap().entity, b);
        assert_eq!(stepper.phase(), Phase::Mount);
    }

    assert_eq!(
        drain(scene.update(frame(1))),
        vec![
            (StepKind::Mount, c),
            (StepKind::Update, a),
            (StepKind::Update, b),
            (StepKind::Update, c),
        ]
    );
}

#[test]
fn behavior_updated_in_abandoned_frame_updates_again() {
    let journal = journal();
    let (mut scene, a, _, _) = abc_scene(&journal);
    scene.update(frame(0)).run_to_end().unwrap();

    {
        let mut stepper = scene.update(frame(1));
        let first = stepper.next().unwrap().unwrap();
        assert_eq!((first.kind, first.entity), (StepKind::Update, a));
    }

    let summary = scene.update(frame(2)).run_to_end().unwrap();
    assert_eq!(summary.updates, 3);
    assert_eq!(summary.mounts, 0);

    let a_updates = journal
        .borrow()
        .iter()
        .filter(|e| **e == Event::Update("A"))
        .count();
    assert_eq!(a_updates, 3);
}

#[test]
fn hooks_receive_the_frame_context() {
    let journal = journal();
    let entity = Entity::new("A").with(Recorder::new("A", &journal));
    let id = entity.id();
    let mut scene = Scene::new().add_child(entity);

    for n in [3, 4, 9] {
        let mut stepper = scene.update(frame(n));
        assert_eq!(stepper.frame().frame_count, n);
        stepper.by_ref().for_each(drop);
    }

    let recorder = scene.find_behavior::<Recorder>(id, LookupScope::Entity).unwrap();
    assert_eq!(recorder.frames_seen, vec![3, 4, 9]);
    assert_eq!(scene.entity(id).unwrap().mounted_at(0), Some(3));
}

// ── Suspension ──────────────────────────────────────────────────────────

#[test]
fn suspending_update_takes_n_plus_one_steps() {
    let journal = journal();
    let a = Entity::new("A").with(Recorder::new("A", &journal).yields(3));
    let b = Entity::new("B").with(Recorder::new("B", &journal));
    let (a_id, b_id) = (a.id(), b.id());
    let mut scene = Scene::new().add_child(a).add_child(b);

    assert_eq!(
        drain(scene.update(frame(0))),
        vec![
            (StepKind::Mount, a_id),
            (StepKind::Mount, b_id),
            (StepKind::Suspend, a_id),
            (StepKind::Suspend, a_id),
            (StepKind::Suspend, a_id),
            (StepKind::Update, a_id),
            (StepKind::Update, b_id),
        ]
    );

    let steps = drain(scene.update(frame(1)));
    assert_eq!(steps.iter().filter(|(_, e)| *e == a_id).count(), 4);
}

/// Adds to a sibling `Transform` over several steps.
struct Walker {
    steps: u32,
}

impl Behavior for Walker {
    fn on_update(&mut self, cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        cx.require_mut::<Transform>()?.translation.x += 1.0;
        if self.steps <= 1 {
            return Ok(Update::Complete);
        }
        Ok(Update::run(routine::repeat(self.steps - 1, |_, cx| {
            // The owner is back in its slot while its routine runs.
            let steps = cx.owner::<Walker>().map(|w| w.steps).unwrap_or(0);
            assert!(steps > 1);
            cx.require_mut::<Transform>()?.translation.x += 1.0;
            Ok(())
        })))
    }
}

#[test]
fn suspension_is_transparent_to_results() {
    let spread = Entity::new("spread")
        .with(Transform::default())
        .with(Walker { steps: 4 });
    let eager = Entity::new("eager").with(Transform::default()).with(Walker { steps: 1 });
    let (spread_id, eager_id) = (spread.id(), eager.id());
    let mut scene = Scene::new().add_child(spread).add_child(eager);

    // Transforms mount too. The spread walker yields three times and finishes
    // on the fourth resume.
    let summary = scene.update(frame(0)).run_to_end().unwrap();
    assert_eq!(summary.mounts, 4);
    assert_eq!(summary.suspensions, 3);

    let spread_x = scene
        .find_behavior::<Transform>(spread_id, LookupScope::Entity)
        .unwrap()
        .translation
        .x;
    let eager_x = scene
        .find_behavior::<Transform>(eager_id, LookupScope::Entity)
        .unwrap()
        .translation
        .x;
    assert_eq!(spread_x, 4.0);
    assert_eq!(eager_x, 1.0);
}

#[test]
fn composed_routines_flatten_into_one_step_stream() {
    struct Composite;
    impl Behavior for Composite {
        fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
            let mut phase = 0;
            let outer = routine::from_fn(move |_cx| {
                phase += 1;
                Ok(match phase {
                    1 => Resume::call(routine::wait_steps(2)),
                    2 => Resume::Yield,
                    3 => Resume::call(
                        Sequence::new()
                            .then(routine::wait_steps(1))
                            .then(routine::wait_steps(1)),
                    ),
                    _ => Resume::Complete,
                })
            });
            Ok(Update::run(outer))
        }
    }

    let entity = Entity::new("composite").with(Composite);
    let id = entity.id();
    let mut scene = Scene::new().add_child(entity);
    let steps = drain(scene.update(frame(0)));

    // 2 + 1 + 1 + 1 yields, then completion.
    let kinds: Vec<_> = steps.iter().filter(|(_, e)| *e == id).map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Mount,
            StepKind::Suspend,
            StepKind::Suspend,
            StepKind::Suspend,
            StepKind::Suspend,
            StepKind::Suspend,
            StepKind::Update,
        ]
    );
}

#[test]
fn abandoning_mid_routine_restarts_the_hook() {
    let journal = journal();
    let entity = Entity::new("A").with(Recorder::new("A", &journal).yields(2));
    let mut scene = Scene::new().add_child(entity);
    scene.update(frame(0)).run_to_end().unwrap();
    journal.borrow_mut().clear();

    {
        let mut stepper = scene.update(frame(1));
        let step = stepper.next().unwrap().unwrap();
        assert_eq!(step.kind, StepKind::Suspend);
    }
    scene.update(frame(2)).run_to_end().unwrap();

    assert_eq!(
        *journal.borrow(),
        vec![
            Event::Update("A"),
            Event::Resume("A"),
            Event::Update("A"),
            Event::Resume("A"),
            Event::Resume("A"),
        ]
    );
}

// ── Failures ────────────────────────────────────────────────────────────

/// Fails its first `fail_mounts` mount attempts.
struct Flaky {
    fail_mounts: u32,
    fail_update: bool,
    updates: u32,
}

impl Behavior for Flaky {
    fn on_mount(&mut self, _cx: &mut HookContext<'_>) -> Result<(), BehaviorError> {
        if self.fail_mounts > 0 {
            self.fail_mounts -= 1;
            return Err(BehaviorError::message("not ready"));
        }
        Ok(())
    }

    fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        if self.fail_update {
            return Err(BehaviorError::message("update exploded"));
        }
        self.updates += 1;
        Ok(Update::Complete)
    }
}

#[test]
fn failed_mount_ends_the_frame_and_retries_next_frame() {
    let journal = journal();
    let first = Entity::new("first").with(Recorder::new("first", &journal));
    let flaky = Entity::new("flaky").with(Flaky {
        fail_mounts: 1,
        fail_update: false,
        updates: 0,
    });
    let (first_id, flaky_id) = (first.id(), flaky.id());
    let mut scene = Scene::new().add_child(first).add_child(flaky);

    {
        let mut stepper = scene.update(frame(0));
        assert_eq!(stepper.next().unwrap().unwrap().entity, first_id);
        match stepper.next() {
            Some(Err(SceneError::Hook {
                kind,
                entity,
                behavior,
                ..
            })) => {
                assert_eq!(kind, StepKind::Mount);
                assert_eq!(entity, flaky_id);
                assert_eq!(behavior, "Flaky");
            }
            other => panic!("expected hook error, got {other:?}"),
        }
        assert!(stepper.next().is_none());
    }

    assert!(scene.entity(first_id).unwrap().is_mounted(0));
    assert!(!scene.entity(flaky_id).unwrap().is_mounted(0));

    assert_eq!(
        drain(scene.update(frame(1))),
        vec![
            (StepKind::Mount, flaky_id),
            (StepKind::Update, first_id),
            (StepKind::Update, flaky_id),
        ]
    );
}

#[test]
fn failed_update_surfaces_with_context() {
    let entity = Entity::new("bomb").with(Flaky {
        fail_mounts: 0,
        fail_update: true,
        updates: 0,
    });
    let mut scene = Scene::new().add_child(entity);

    let err = scene.update(frame(0)).run_to_end().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("update hook of `Flaky`"), "{message}");
    assert!(message.contains("'bomb'"), "{message}");
    assert!(message.contains("update exploded"), "{message}");
}

#[test]
fn routine_error_propagates() {
    struct Fuse;
    impl Behavior for Fuse {
        fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
            let mut lit = false;
            Ok(Update::run(routine::from_fn(move |_cx| {
                if lit {
                    return Err(BehaviorError::message("bang"));
                }
                lit = true;
                Ok(Resume::Yield)
            })))
        }
    }

    let mut scene = Scene::new().add_child(Entity::new("fuse").with(Fuse));
    let mut stepper = scene.update(frame(0));
    assert_eq!(stepper.next().unwrap().unwrap().kind, StepKind::Mount);
    assert_eq!(stepper.next().unwrap().unwrap().kind, StepKind::Suspend);
    assert!(matches!(
        stepper.next(),
        Some(Err(SceneError::Hook {
            kind: StepKind::Update,
            ..
        }))
    ));
    assert!(stepper.next().is_none());
}

#[test]
fn missing_sibling_is_a_hook_error() {
    let mut scene = Scene::new().add_child(Entity::new("lonely").with(Walker { steps: 1 }));
    let err = scene.update(frame(0)).run_to_end().unwrap_err();
    match err {
        SceneError::Hook { source, .. } => {
            assert!(matches!(
                source,
                BehaviorError::MissingBehavior {
                    behavior: "Transform"
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Tree edits & lookups ────────────────────────────────────────────────

#[test]
fn hooks_cannot_see_themselves_but_routines_can() {
    struct Probe {
        saw_self_in_hook: Option<bool>,
    }
    impl Behavior for Probe {
        fn on_mount(&mut self, cx: &mut HookContext<'_>) -> Result<(), BehaviorError> {
            self.saw_self_in_hook = Some(cx.owner::<Probe>().is_some());
            Ok(())
        }

        fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
            Ok(Update::run(routine::from_fn(|cx| {
                let probe = cx
                    .owner_mut::<Probe>()
                    .ok_or_else(BehaviorError::missing::<Probe>)?;
                probe.saw_self_in_hook = None;
                Ok(Resume::Complete)
            })))
        }
    }

    let entity = Entity::new("probe").with(Probe {
        saw_self_in_hook: None,
    });
    let id = entity.id();
    let mut scene = Scene::new().add_child(entity);

    let mut stepper = scene.update(frame(0));
    stepper.next().unwrap().unwrap();
    drop(stepper);
    let probe = scene.find_behavior::<Probe>(id, LookupScope::Entity).unwrap();
    assert_eq!(probe.saw_self_in_hook, Some(false));

    scene.update(frame(1)).run_to_end().unwrap();
    let probe = scene.find_behavior::<Probe>(id, LookupScope::Entity).unwrap();
    assert_eq!(probe.saw_self_in_hook, None);
}

#[test]
fn detach_unmounts_and_reattach_mounts_again() {
    let journal = journal();
    let (mut scene, a, b, c) = abc_scene(&journal);
    scene.update(frame(0)).run_to_end().unwrap();
    journal.borrow_mut().clear();

    let detached = scene.detach(a).unwrap();
    assert_eq!(detached.parent(), None);
    assert_eq!(*journal.borrow(), vec![Event::Unmount("A"), Event::Unmount("B")]);
    assert_eq!(scene.entity_count(), 1);
    assert!(scene.entity(b).is_none());

    journal.borrow_mut().clear();
    let reattached = scene.spawn_child(c, detached).unwrap();
    assert_eq!(reattached, a);
    assert_eq!(scene.ancestors(b), vec![a, c]);

    assert_eq!(
        drain(scene.update(frame(1))),
        vec![
            (StepKind::Mount, a),
            (StepKind::Mount, b),
            (StepKind::Update, c),
            (StepKind::Update, a),
            (StepKind::Update, b),
        ]
    );
}

#[test]
fn detach_nested_child() {
    let journal = journal();
    let (mut scene, a, b, _) = abc_scene(&journal);
    let detached = scene.detach(b).unwrap();
    assert_eq!(detached.name(), "B");
    assert!(scene.entity(a).unwrap().children().is_empty());
    assert!(scene.detach(b).is_none());
    // Never mounted, so nothing to unmount.
    assert!(journal.borrow().is_empty());
}

#[test]
fn scoped_lookups() {
    #[derive(Default)]
    struct Marker(u32);
    impl Behavior for Marker {}

    let leaf = Entity::new("leaf").with(Marker(3));
    let leaf_id = leaf.id();
    let mid = Entity::new("mid").with(Transform::from_xyz(1.0, 0.0, 0.0)).add_child(leaf);
    let mid_id = mid.id();
    let root = Entity::new("root").with(Marker(1)).add_child(mid);
    let root_id = root.id();
    let scene = Scene::new().add_child(root);

    assert!(scene.find_behavior::<Marker>(mid_id, LookupScope::Entity).is_none());
    assert_eq!(
        scene.find_behavior::<Marker>(mid_id, LookupScope::Ancestors).map(|m| m.0),
        Some(1)
    );
    assert_eq!(
        scene.find_behavior::<Marker>(mid_id, LookupScope::Descendants).map(|m| m.0),
        Some(3)
    );
    assert_eq!(
        scene.find_behavior::<Marker>(leaf_id, LookupScope::Ancestors).map(|m| m.0),
        Some(3)
    );
    assert!(scene
        .find_behavior::<Transform>(leaf_id, LookupScope::Ancestors)
        .is_some());
    assert_eq!(scene.ancestors(leaf_id), vec![mid_id, root_id]);
    assert_eq!(scene.behavior_count(), 3);
}

#[test]
fn children_appended_between_frames_join_the_walk() {
    let journal = journal();
    let (mut scene, a, _, _) = abc_scene(&journal);
    scene.update(frame(0)).run_to_end().unwrap();

    let late = Entity::new("late").with(Recorder::new("late", &journal));
    let late_id = scene.spawn_child(a, late).unwrap();

    let steps = drain(scene.update(frame(1)));
    assert_eq!(steps[0], (StepKind::Mount, late_id));
    assert_eq!(steps.len(), 5);
}

#[test]
fn spawn_child_under_unknown_parent_is_an_error() {
    let journal = journal();
    let (mut scene, _, b, _) = abc_scene(&journal);
    let gone = scene.detach(b).unwrap().id();
    let before = scene.entity_count();

    let orphan = Entity::new("orphan").with(Transform::default());
    match scene.spawn_child(gone, orphan) {
        Err(SceneError::EntityNotFound(parent)) => assert_eq!(parent, gone),
        other => panic!("expected EntityNotFound, got {other:?}"),
    }
    assert_eq!(scene.entity_count(), before);
}

#[test]
fn replaced_node_is_found_through_the_tree() {
    let journal = journal();
    let (mut scene, a, b, _) = abc_scene(&journal);

    let replacement = Entity::new("Z").with(Transform::default());
    let z = replacement.id();
    *scene.entity_mut(b).unwrap() = replacement;

    // The replacement never went through push_child.
    assert_eq!(scene.entity(z).unwrap().parent(), None);
    assert_eq!(scene.ancestors(z), vec![a]);
    assert!(scene.find_behavior::<Recorder>(z, LookupScope::Ancestors).is_some());

    // Starting a frame re-derives the back-links.
    scene.update(frame(0)).run_to_end().unwrap();
    assert_eq!(scene.entity(z).unwrap().parent(), Some(a));

    let detached = scene.detach(z).unwrap();
    assert_eq!(detached.name(), "Z");
    assert!(scene.entity(z).is_none());
    assert!(scene.entity(a).unwrap().children().is_empty());
}

#[test]
fn panicking_hook_leaves_its_behavior_in_place() {
    struct Volatile {
        armed: bool,
        updates: u32,
    }
    impl Behavior for Volatile {
        fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
            if std::mem::take(&mut self.armed) {
                panic!("update blew up");
            }
            self.updates += 1;
            Ok(Update::Complete)
        }
    }

    let entity = Entity::new("volatile").with(Volatile {
        armed: true,
        updates: 0,
    });
    let id = entity.id();
    let mut scene = Scene::new().add_child(entity);

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        scene.update(frame(0)).run_to_end()
    }));
    assert!(caught.is_err());
    assert_eq!(scene.entity(id).unwrap().behaviors().count(), 1);

    scene.update(frame(1)).run_to_end().unwrap();
    let volatile = scene.find_behavior::<Volatile>(id, LookupScope::Entity).unwrap();
    assert_eq!(volatile.updates, 1);
}
