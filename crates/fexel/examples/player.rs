//! Player prefab — a gamepad-driven player with a gun, stepped frame by frame.
//!
//! Run with `RUST_LOG=debug cargo run --example player` to watch the
//! scheduler's mount/update steps alongside the game's own output.

use std::cell::RefCell;
use std::rc::Rc;

use fexel::prelude::*;

type SharedPad = Rc<RefCell<Gamepad>>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let pad = SharedPad::default();
    let scene = Scene::new().add_child(player(&pad));

    let config = DriverConfig::from_json_str(r#"{ "fixed_delta": 0.016, "step_budget": 32 }"#)?;
    let mut driver = Driver::new(scene, config)?;

    // Scripted input: walk right for a few frames, fire on the third.
    let script: [&[Button]; 6] = [
        &[],
        &[Button::Right],
        &[Button::Right, Button::Fire],
        &[Button::Right],
        &[],
        &[Button::Up],
    ];

    for held in script {
        {
            let mut pad = pad.borrow_mut();
            pad.clear_just();
            for button in [Button::Up, Button::Down, Button::Left, Button::Right, Button::Fire] {
                if held.contains(&button) {
                    pad.press(button);
                } else {
                    pad.release(button);
                }
            }
        }

        let report = driver.tick()?;
        log::info!(
            "frame {}: {} steps ({} mounts, {} updates, {} suspensions)",
            report.summary.frame_count,
            report.summary.steps,
            report.summary.mounts,
            report.summary.updates,
            report.summary.suspensions,
        );
    }

    let scene = driver.scene();
    let player = &scene.children()[0];
    if let Some(transform) = player.find_behavior::<Transform>() {
        log::info!("player ended at {:?}", transform.translation);
    }
    if let Some(gun) = scene.find_behavior::<PlayerGun>(player.id(), LookupScope::Descendants) {
        log::info!("shots fired: {}", gun.shots);
    }
    Ok(())
}

fn player(pad: &SharedPad) -> Entity {
    Entity::new("player")
        .with(Transform::from_xyz(0.0, 0.0, 0.0))
        .with(PlayerMovement::new(pad.clone()))
        .add_child(Entity::new("gun").with(PlayerGun::new(pad.clone())))
}

// ── Movement ────────────────────────────────────────────────────────────

struct PlayerMovement {
    pad: SharedPad,
    speed: f32,
}

impl PlayerMovement {
    fn new(pad: SharedPad) -> Self {
        Self { pad, speed: 5.0 }
    }

    fn direction(&self) -> Vec3 {
        let pad = self.pad.borrow();
        let mut dir = Vec3::ZERO;
        if pad.pressed(Button::Right) {
            dir.x += 1.0;
        }
        if pad.pressed(Button::Left) {
            dir.x -= 1.0;
        }
        if pad.pressed(Button::Up) {
            dir.y += 1.0;
        }
        if pad.pressed(Button::Down) {
            dir.y -= 1.0;
        }
        dir.normalize_or_zero()
    }
}

impl Behavior for PlayerMovement {
    fn on_mount(&mut self, cx: &mut HookContext<'_>) -> Result<(), BehaviorError> {
        cx.require_mut::<Transform>()?;
        log::info!("{} ready", cx.entity_name());
        Ok(())
    }

    fn on_update(&mut self, cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        let dir = self.direction();
        if dir == Vec3::ZERO {
            return Ok(Update::Complete);
        }

        let step = dir * self.speed * cx.frame().scaled_delta();
        cx.require_mut::<Transform>()?.translation += step;

        // Three-pose run cycle, one pose per scheduler step.
        Ok(Update::run(routine::repeat(3, |pose, cx| {
            let bob = if pose % 2 == 0 { 1.0 } else { 0.9 };
            cx.require_mut::<Transform>()?.scale = Vec3::new(1.0, bob, 1.0);
            log::info!("run pose {pose}");
            Ok(())
        })))
    }
}

// ── Gun ─────────────────────────────────────────────────────────────────

struct PlayerGun {
    pad: SharedPad,
    shots: u32,
}

impl PlayerGun {
    fn new(pad: SharedPad) -> Self {
        Self { pad, shots: 0 }
    }
}

impl Behavior for PlayerGun {
    // After movement, so shots leave from this frame's position.
    fn execution_order(&self) -> i32 {
        10
    }

    fn on_update(&mut self, _cx: &mut HookContext<'_>) -> Result<Update, BehaviorError> {
        if self.pad.borrow().just_pressed(Button::Fire) {
            self.shots += 1;
            log::info!("Fire!");
        }
        Ok(Update::Complete)
    }
}
