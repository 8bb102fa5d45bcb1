//! # Fly Camera
//!
//! Euler-angle camera driven by keyboard movement, mouse look and scroll zoom.
//!
//! ## Coordinate System
//! Right-handed, Y-up world space. With yaw 0 the camera looks down +X; yaw
//! grows toward +Z. Pitch is clamped to ±89 degrees so the view never flips.
//!
//! Passes only see the camera through [`ViewProvider`], which keeps the frame
//! code independent of how the camera is steered.

use crate::config::CameraSettings;
use crate::foundation::math::{look_at, Mat4, Point3, Vec3};

/// Read-only view of a camera as consumed by the render passes
pub trait ViewProvider {
    /// World-to-view transform
    fn view_matrix(&self) -> Mat4;
    /// Eye position in world space
    fn position(&self) -> Vec3;
    /// Vertical field of view in degrees
    fn field_of_view_degrees(&self) -> f32;
}

/// Discrete movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    /// Along the view direction
    Forward,
    /// Against the view direction
    Backward,
    /// Along the negative right vector
    Left,
    /// Along the right vector
    Right,
    /// Along world up
    Up,
    /// Against world up
    Down,
}

/// Pitch limit in degrees
const PITCH_LIMIT: f32 = 89.0;

/// Zoom (field of view) range in degrees
const ZOOM_RANGE: (f32, f32) = (1.0, 45.0);

/// Euler-angle fly camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    movement_speed: f32,
    mouse_sensitivity: f32,
}

impl Camera {
    /// Create a camera at `position` with yaw/pitch in degrees
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            front: -Vec3::z(),
            up: Vec3::y(),
            right: Vec3::x(),
            world_up: Vec3::y(),
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            zoom: ZOOM_RANGE.1,
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
        };
        camera.update_vectors();
        camera
    }

    /// Create a camera from configuration
    pub fn from_settings(settings: &CameraSettings) -> Self {
        let [x, y, z] = settings.position;
        let mut camera = Self::new(Vec3::new(x, y, z), settings.yaw, settings.pitch);
        camera.zoom = settings.zoom.clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
        camera.movement_speed = settings.movement_speed;
        camera.mouse_sensitivity = settings.mouse_sensitivity;
        camera
    }

    /// Unit view direction
    pub const fn front(&self) -> Vec3 {
        self.front
    }

    /// Yaw in degrees
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees
    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Field of view in degrees
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Move for `delta_time` seconds in `direction`
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        let offset = match direction {
            CameraMovement::Forward => self.front,
            CameraMovement::Backward => -self.front,
            CameraMovement::Left => -self.right,
            CameraMovement::Right => self.right,
            CameraMovement::Up => self.world_up,
            CameraMovement::Down => -self.world_up,
        };
        self.position += offset * velocity;
    }

    /// Turn by a mouse offset in pixels (positive y looks up)
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch = y_offset
            .mul_add(self.mouse_sensitivity, self.pitch)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Zoom by a scroll offset; scrolling up narrows the field of view
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(&self.world_up).normalize();
        self.up = self.right.cross(&self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

impl ViewProvider for Camera {
    fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.position);
        look_at(&eye, &(eye + self.front), &self.up)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn field_of_view_degrees(&self) -> f32 {
        self.zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_camera_matches_reference_pose() {
        let camera = Camera::default();
        assert_relative_eq!(camera.position(), Vec3::new(-5.0, 5.0, 5.0));
        assert_relative_eq!(camera.field_of_view_degrees(), 45.0);
        // Looking down and toward +X/-Z
        let front = camera.front();
        assert!(front.x > 0.0 && front.y < 0.0 && front.z < 0.0);
        assert_relative_eq!(front.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_view_matrix_places_eye_at_origin() {
        let camera = Camera::default();
        let eye = Point3::from(camera.position());
        let in_view = camera.view_matrix().transform_point(&eye);
        assert_relative_eq!(in_view, Point3::origin(), epsilon = 1e-5);
        // A point ahead of the camera lies on the -Z axis in view space
        let ahead = camera.view_matrix().transform_point(&(eye + camera.front() * 3.0));
        assert_relative_eq!(ahead, Point3::new(0.0, 0.0, -3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_keyboard_movement_scales_with_delta_time() {
        let mut camera = Camera::default();
        let start = camera.position();
        camera.process_keyboard(CameraMovement::Up, 2.0);
        assert_relative_eq!(camera.position(), start + Vec3::new(0.0, 5.0, 0.0), epsilon = 1e-5);
        camera.process_keyboard(CameraMovement::Down, 2.0);
        assert_relative_eq!(camera.position(), start, epsilon = 1e-5);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 10_000.0);
        assert_relative_eq!(camera.pitch(), 89.0);
        camera.process_mouse_movement(0.0, -100_000.0);
        assert_relative_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(-10.0);
        assert_relative_eq!(camera.zoom(), 45.0);
        camera.process_mouse_scroll(100.0);
        assert_relative_eq!(camera.zoom(), 1.0);
    }
}
