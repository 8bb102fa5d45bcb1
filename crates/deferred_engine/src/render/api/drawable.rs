//! Drawable abstraction

use crate::render::api::GraphicsDevice;
use crate::render::shader::Shader;

/// Something that can draw itself with an already-active shader
///
/// Implementations bind their own textures and vertex arrays and leave
/// texture unit 0 active when they return.
pub trait Drawable {
    /// Issue this object's draw calls
    fn draw(&self, device: &mut dyn GraphicsDevice, shader: &Shader);
}
