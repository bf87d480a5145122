//! Gamepad input state.
//!
//! The [`Input`] type tracks which buttons are currently pressed, just pressed
//! this frame, or just released this frame. A [`Gamepad`] is an `Input` over
//! the abstract [`Button`] set that behaviors read during their update hook.
//!
//! Polling the physical device is the host's job: it calls
//! [`press`](Input::press)/[`release`](Input::release) as events arrive and
//! [`clear_just`](Input::clear_just) once per frame.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Tracks the state of a set of inputs.
///
/// - `pressed`: currently held down
/// - `just_pressed`: pressed this frame (not held last frame)
/// - `just_released`: released this frame
#[derive(Debug, Clone)]
pub struct Input<T: Eq + Hash + Copy> {
    pressed: HashSet<T>,
    just_pressed: HashSet<T>,
    just_released: HashSet<T>,
}

impl<T: Eq + Hash + Copy> Input<T> {
    pub fn new() -> Self {
        Self {
            pressed: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }

    /// Returns `true` if the input is currently held down.
    pub fn pressed(&self, input: T) -> bool {
        self.pressed.contains(&input)
    }

    /// Returns `true` if the input was pressed this frame.
    pub fn just_pressed(&self, input: T) -> bool {
        self.just_pressed.contains(&input)
    }

    /// Returns `true` if the input was released this frame.
    pub fn just_released(&self, input: T) -> bool {
        self.just_released.contains(&input)
    }

    /// Call when an input is pressed (from the host's event handler).
    pub fn press(&mut self, input: T) {
        if self.pressed.insert(input) {
            self.just_pressed.insert(input);
        }
    }

    /// Call when an input is released (from the host's event handler).
    pub fn release(&mut self, input: T) {
        if self.pressed.remove(&input) {
            self.just_released.insert(input);
        }
    }

    /// Clear per-frame state. Call at the start of each frame.
    pub fn clear_just(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

impl<T: Eq + Hash + Copy> Default for Input<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Abstract gamepad buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

pub type Gamepad = Input<Button>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_just_pressed_once() {
        let mut pad = Gamepad::new();
        pad.press(Button::Fire);
        assert!(pad.pressed(Button::Fire));
        assert!(pad.just_pressed(Button::Fire));

        pad.clear_just();
        pad.press(Button::Fire);
        assert!(pad.pressed(Button::Fire));
        assert!(!pad.just_pressed(Button::Fire));
    }

    #[test]
    fn release_tracks_just_released() {
        let mut pad = Gamepad::new();
        pad.release(Button::Left);
        assert!(!pad.just_released(Button::Left));

        pad.press(Button::Left);
        pad.release(Button::Left);
        assert!(!pad.pressed(Button::Left));
        assert!(pad.just_released(Button::Left));
    }
}
