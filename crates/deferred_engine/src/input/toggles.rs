//! Edge-triggered, debounced render toggles
//!
//! A held key flips its toggle once; it must be released before the next
//! press can flip it again.

use log::info;

use super::{InputManager, KeyCode};

/// Which shading path draws the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Single pass against the default framebuffer
    Forward,
    /// G-buffer fill followed by a full-screen lighting resolve
    Deferred,
}

impl RenderMode {
    const fn from_flag(deferred: bool) -> Self {
        if deferred {
            Self::Deferred
        } else {
            Self::Forward
        }
    }
}

/// Boolean flipped on the rising edge of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncedToggle {
    value: bool,
    latched: bool,
}

impl DebouncedToggle {
    /// Create a toggle with an initial value
    pub const fn new(value: bool) -> Self {
        Self { value, latched: false }
    }

    /// Current value
    pub const fn value(&self) -> bool {
        self.value
    }

    /// Feed the key state for this frame; returns `true` when the value flipped
    pub fn update(&mut self, key_down: bool) -> bool {
        if !key_down {
            self.latched = false;
            return false;
        }
        if self.latched {
            return false;
        }
        self.latched = true;
        self.value = !self.value;
        true
    }
}

/// The demo's two toggles: `1` switches render mode, `2` switches rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderToggles {
    deferred: DebouncedToggle,
    rotating: DebouncedToggle,
}

impl RenderToggles {
    /// Key that switches between forward and deferred shading
    pub const MODE_KEY: KeyCode = KeyCode::Num1;
    /// Key that starts and stops instance rotation
    pub const ROTATE_KEY: KeyCode = KeyCode::Num2;

    /// Create toggles with the given start state
    pub const fn new(mode: RenderMode, rotating: bool) -> Self {
        Self {
            deferred: DebouncedToggle::new(matches!(mode, RenderMode::Deferred)),
            rotating: DebouncedToggle::new(rotating),
        }
    }

    /// Sample the toggle keys once for this frame
    pub fn update(&mut self, input: &InputManager) {
        self.update_keys(input.is_key_down(Self::MODE_KEY), input.is_key_down(Self::ROTATE_KEY));
    }

    /// Sample raw key states once for this frame
    pub fn update_keys(&mut self, mode_key_down: bool, rotate_key_down: bool) {
        if self.deferred.update(mode_key_down) {
            info!("Render mode: {:?}", self.mode());
        }
        if self.rotating.update(rotate_key_down) {
            info!("Object rotation: {}", if self.rotating() { "on" } else { "off" });
        }
    }

    /// Current render mode
    pub const fn mode(&self) -> RenderMode {
        RenderMode::from_flag(self.deferred.value())
    }

    /// Whether instances rotate
    pub const fn rotating(&self) -> bool {
        self.rotating.value()
    }
}
