//! Rendering primitives: the fly camera and the built-in meshes

pub mod camera;
pub mod geometry;

pub use camera::{Camera, CameraMovement, ViewProvider};
pub use geometry::{ScreenQuad, UnitCube, CUBE_VERTICES, QUAD_VERTICES};
