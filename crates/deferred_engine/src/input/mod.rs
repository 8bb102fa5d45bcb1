//! Input management system
//!
//! The window translates platform events into [`InputEvent`]s; the
//! [`InputManager`] folds them into per-frame state the demo reads back.

pub mod toggles;

pub use toggles::{DebouncedToggle, RenderMode, RenderToggles};

use std::collections::HashSet;

use crate::render::api::Extent2D;

/// Window events the demo reacts to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// A key changed state
    Key {
        /// Which key
        key: KeyCode,
        /// `true` on press (and repeat), `false` on release
        pressed: bool,
    },
    /// Cursor moved to an absolute window position
    CursorMoved {
        /// Horizontal position in pixels
        x: f64,
        /// Vertical position in pixels, growing downward
        y: f64,
    },
    /// Scroll wheel moved
    Scrolled {
        /// Vertical scroll offset
        y_offset: f64,
    },
    /// The drawable surface changed size
    FramebufferResized(Extent2D),
    /// The user asked to close the window
    CloseRequested,
}

/// Input manager
#[derive(Debug, Default)]
pub struct InputManager {
    keys_down: HashSet<KeyCode>,
    last_cursor: Option<(f64, f64)>,
    mouse_delta: (f32, f32),
    scroll_delta: f32,
    pending_resize: Option<Extent2D>,
    close_requested: bool,
}

impl InputManager {
    /// Create a new input manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the current state
    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::Key { key, pressed } => self.handle_key_input(key, pressed),
            InputEvent::CursorMoved { x, y } => self.handle_mouse_move(x, y),
            InputEvent::Scrolled { y_offset } => self.scroll_delta += y_offset as f32,
            InputEvent::FramebufferResized(extent) => self.pending_resize = Some(extent),
            InputEvent::CloseRequested => self.close_requested = true,
        }
    }

    /// Handle key input
    pub fn handle_key_input(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_down.insert(key);
        } else {
            self.keys_down.remove(&key);
        }
    }

    /// Handle mouse movement
    ///
    /// The first position only seeds the tracker. Vertical motion is
    /// reversed so moving the mouse up yields a positive offset.
    pub fn handle_mouse_move(&mut self, x: f64, y: f64) {
        if let Some((last_x, last_y)) = self.last_cursor {
            self.mouse_delta.0 += (x - last_x) as f32;
            self.mouse_delta.1 += (last_y - y) as f32;
        }
        self.last_cursor = Some((x, y));
    }

    /// Whether a key is currently held
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether a close was requested since startup
    pub const fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Mouse motion accumulated since the last call
    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.mouse_delta)
    }

    /// Scroll accumulated since the last call
    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll_delta)
    }

    /// Most recent framebuffer size notification, if any arrived
    pub fn take_resize(&mut self) -> Option<Extent2D> {
        self.pending_resize.take()
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// W key
    W,
    /// A key
    A,
    /// S key
    S,
    /// D key
    D,
    /// Q key
    Q,
    /// E key
    E,
    /// Top-row 1
    Num1,
    /// Top-row 2
    Num2,
    /// Escape key
    Escape,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_key_state_follows_press_and_release() {
        let mut input = InputManager::new();
        input.handle_event(&InputEvent::Key { key: KeyCode::W, pressed: true });
        assert!(input.is_key_down(KeyCode::W));
        input.handle_event(&InputEvent::Key { key: KeyCode::W, pressed: false });
        assert!(!input.is_key_down(KeyCode::W));
    }

    /// The first cursor event must not produce a jump.
    #[test]
    fn test_first_mouse_event_only_seeds() {
        let mut input = InputManager::new();
        input.handle_mouse_move(640.0, 360.0);
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));

        input.handle_mouse_move(650.0, 350.0);
        let (dx, dy) = input.take_mouse_delta();
        assert_relative_eq!(dx, 10.0);
        assert_relative_eq!(dy, 10.0);
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_scroll_and_resize_are_consumed() {
        let mut input = InputManager::new();
        input.handle_event(&InputEvent::Scrolled { y_offset: 1.0 });
        input.handle_event(&InputEvent::Scrolled { y_offset: 2.0 });
        input.handle_event(&InputEvent::FramebufferResized(Extent2D::new(640, 480)));
        assert_relative_eq!(input.take_scroll(), 3.0);
        assert_relative_eq!(input.take_scroll(), 0.0);
        assert_eq!(input.take_resize(), Some(Extent2D::new(640, 480)));
        assert_eq!(input.take_resize(), None);
    }
}
