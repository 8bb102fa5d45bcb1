//! Lighting pass: resolve the G-buffer onto the default framebuffer

use crate::foundation::math::Vec3;
use crate::render::api::{ClearFlags, FramebufferTarget, GraphicsDevice};
use crate::render::deferred::{GBufferAttachment, RenderTargetSet};
use crate::render::primitives::ScreenQuad;
use crate::render::shader::Shader;
use crate::render::systems::lighting::LightSet;

/// Texture unit the G-buffer is bound from
pub const GBUFFER_START_UNIT: u32 = 0;

/// Point the G-buffer samplers at their texture units
///
/// Called once at startup; sampler assignments persist in the program.
pub fn bind_samplers(device: &mut dyn GraphicsDevice, shader: &Shader) {
    shader.activate(device);
    for attachment in GBufferAttachment::ALL {
        shader.set_int(
            device,
            attachment.sampler_name(),
            (GBUFFER_START_UNIT + attachment.slot()) as i32,
        );
    }
}

/// Shade one full-screen quad from the G-buffer
pub fn run(
    device: &mut dyn GraphicsDevice,
    targets: &RenderTargetSet,
    lights: &LightSet,
    shader: &Shader,
    quad: &ScreenQuad,
    viewer_position: &Vec3,
) {
    device.bind_framebuffer(FramebufferTarget::Both, None);
    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

    shader.activate(device);
    shader.set_vec3(device, "viewPos", viewer_position);
    targets.bind_textures_for_reading(device, GBUFFER_START_UNIT);
    lights.expose_uniforms(device, shader);
    quad.draw(device);
    targets.unbind_textures(device, GBUFFER_START_UNIT);

    log::trace!("Lighting pass resolved {} lights", lights.len());
}
