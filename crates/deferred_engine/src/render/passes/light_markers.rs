//! Light markers: a small cube at every light, colored like the light

use crate::foundation::math::translate_scale_rotate;
use crate::render::api::GraphicsDevice;
use crate::render::primitives::UnitCube;
use crate::render::shader::Shader;
use crate::render::systems::lighting::LightSet;

use super::FrameMatrices;

/// Uniform scale of each marker cube
pub const MARKER_SCALE: f32 = 0.05;

/// Draw one cube per light into whatever framebuffer and depth buffer are bound
pub fn run(
    device: &mut dyn GraphicsDevice,
    lights: &LightSet,
    shader: &Shader,
    cube: &UnitCube,
    matrices: &FrameMatrices,
) -> usize {
    shader.activate(device);
    matrices.upload(device, shader);
    for light in lights.lights() {
        let model = translate_scale_rotate(&light.position, MARKER_SCALE, None);
        shader.set_mat4(device, "model", &model);
        shader.set_vec3(device, "lightColor", &light.color);
        cube.draw(device);
    }
    lights.len()
}
