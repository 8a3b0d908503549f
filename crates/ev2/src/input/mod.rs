//! Input management system
//!
//! Tracks key and mouse state fed in through [`AppEvent`](crate::application::AppEvent)s.
//! "Just pressed" and "just released" hold for one frame, until [`InputManager::update`].

use crate::foundation::math::Vec2;
use std::collections::HashSet;

/// Input manager
#[derive(Debug, Default)]
pub struct InputManager {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    wheel_delta: Vec2,
}

impl InputManager {
    /// Create a new input manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: clear edge-triggered state and accumulated deltas
    pub fn update(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.buttons_pressed.clear();
        self.mouse_delta = Vec2::zeros();
        self.wheel_delta = Vec2::zeros();
    }

    /// Handle key input
    pub fn handle_key_input(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            // Key repeat does not count as a new press
            if self.keys_down.insert(key) {
                self.keys_pressed.insert(key);
            }
        } else if self.keys_down.remove(&key) {
            self.keys_released.insert(key);
        }
    }

    /// Handle mouse button input
    pub fn handle_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            if self.buttons_down.insert(button) {
                self.buttons_pressed.insert(button);
            }
        } else {
            self.buttons_down.remove(&button);
        }
    }

    /// Handle mouse movement
    #[allow(clippy::cast_possible_truncation)]
    pub fn handle_mouse_move(&mut self, x: f64, y: f64) {
        let position = Vec2::new(x as f32, y as f32);
        self.mouse_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    /// Handle mouse wheel
    #[allow(clippy::cast_possible_truncation)]
    pub fn handle_mouse_wheel(&mut self, delta_x: f64, delta_y: f64) {
        self.wheel_delta += Vec2::new(delta_x as f32, delta_y as f32);
    }

    /// Whether a key is held
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether a key went down this frame
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Whether a key went up this frame
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    /// Whether a mouse button is held
    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Whether a mouse button went down this frame
    pub fn is_button_just_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    /// Cursor position in window pixels
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Cursor movement this frame
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Wheel movement this frame
    pub fn wheel_delta(&self) -> Vec2 {
        self.wheel_delta
    }

    /// -1, 0 or 1 from a pair of opposing keys
    pub fn axis(&self, negative: KeyCode, positive: KeyCode) -> f32 {
        match (self.is_key_down(negative), self.is_key_down(positive)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// D key
    D,
    /// E key
    E,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// W key
    W,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_lasts_one_frame() {
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::Space, true);
        assert!(input.is_key_just_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        input.update();
        // Repeat while held
        input.handle_key_input(KeyCode::Space, true);
        assert!(!input.is_key_just_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        input.handle_key_input(KeyCode::Space, false);
        assert!(input.is_key_just_released(KeyCode::Space));
        assert!(!input.is_key_down(KeyCode::Space));
    }

    #[test]
    fn test_mouse_delta_accumulates_until_update() {
        let mut input = InputManager::new();
        input.handle_mouse_move(10.0, 0.0);
        input.handle_mouse_move(15.0, 5.0);
        assert_eq!(input.mouse_delta(), Vec2::new(15.0, 5.0));
        input.update();
        assert_eq!(input.mouse_delta(), Vec2::zeros());
        assert_eq!(input.mouse_position(), Vec2::new(15.0, 5.0));
    }

    #[test]
    fn test_axis_cancels_opposing_keys() {
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::Left, true);
        assert_eq!(input.axis(KeyCode::Left, KeyCode::Right), -1.0);
        input.handle_key_input(KeyCode::Right, true);
        assert_eq!(input.axis(KeyCode::Left, KeyCode::Right), 0.0);
    }
}
