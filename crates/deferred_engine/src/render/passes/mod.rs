//! Render passes
//!
//! Each pass is a function over explicit inputs. On return every pass leaves
//! the default framebuffer bound and texture unit 0 active.

pub mod forward;
pub mod geometry;
pub mod light_markers;
pub mod lighting;

use crate::render::api::{Drawable, GraphicsDevice};
use crate::render::frame::FrameMatrices;
use crate::render::shader::Shader;
use crate::scene::{InstanceAnimation, ObjectInstances};

/// Draw `model` once per instance with its `model` matrix set
///
/// Returns the number of instances drawn.
pub fn draw_instances(
    device: &mut dyn GraphicsDevice,
    shader: &Shader,
    model: &dyn Drawable,
    instances: &ObjectInstances,
    animation: InstanceAnimation,
) -> usize {
    let mut drawn = 0;
    for matrix in instances.model_matrices(animation) {
        shader.set_mat4(device, "model", &matrix);
        model.draw(device, shader);
        drawn += 1;
    }
    drawn
}
