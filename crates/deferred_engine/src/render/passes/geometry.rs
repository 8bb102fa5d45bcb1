//! Geometry pass: fill the G-buffer

use crate::render::api::{ClearFlags, Drawable, GraphicsDevice};
use crate::render::deferred::RenderTargetSet;
use crate::render::shader::Shader;
use crate::scene::{InstanceAnimation, ObjectInstances};

use super::{draw_instances, FrameMatrices};

/// Draw every instance into `targets`
///
/// Clears color and depth of the G-buffer first and sets `projection`/`view`
/// once. The default framebuffer is bound again on return.
pub fn run(
    device: &mut dyn GraphicsDevice,
    targets: &RenderTargetSet,
    model: &dyn Drawable,
    instances: &ObjectInstances,
    animation: InstanceAnimation,
    shader: &Shader,
    matrices: &FrameMatrices,
) -> usize {
    let mut writer = targets.bind_for_writing(device);
    let device = writer.device();

    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
    shader.activate(device);
    matrices.upload(device, shader);
    let drawn = draw_instances(device, shader, model, instances, animation);

    log::trace!("Geometry pass drew {drawn} instances");
    drawn
}
