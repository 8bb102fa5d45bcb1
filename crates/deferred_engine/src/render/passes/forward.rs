//! Forward pass: shade every instance directly into the default framebuffer

use crate::render::api::{Drawable, FramebufferTarget, GraphicsDevice};
use crate::render::shader::Shader;
use crate::render::systems::lighting::LightSet;
use crate::scene::{InstanceAnimation, ObjectInstances};

use super::{draw_instances, FrameMatrices};

/// Draw every instance lit by every light, no G-buffer involved
pub fn run(
    device: &mut dyn GraphicsDevice,
    model: &dyn Drawable,
    instances: &ObjectInstances,
    animation: InstanceAnimation,
    lights: &LightSet,
    shader: &Shader,
    matrices: &FrameMatrices,
) -> usize {
    device.bind_framebuffer(FramebufferTarget::Both, None);

    shader.activate(device);
    lights.expose_uniforms(device, shader);
    shader.set_vec3(device, "viewPos", &matrices.viewer_position);
    matrices.upload(device, shader);
    let drawn = draw_instances(device, shader, model, instances, animation);

    log::trace!("Forward pass drew {drawn} instances");
    drawn
}
