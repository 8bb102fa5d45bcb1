//! Built-in meshes
//!
//! The light-marker cube and the full-screen quad. Both are created
//! explicitly at startup and destroyed with the renderer.

use crate::render::api::{GraphicsDevice, PrimitiveTopology, VertexArrayDescriptor, VertexArrayId};
use crate::render::RenderResult;

/// 36 vertices of a cube spanning [-1, 1]³: position, normal, texcoord
#[rustfmt::skip]
pub const CUBE_VERTICES: [f32; 36 * 8] = [
    // back face
    -1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 1.0,
     1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 1.0,
    -1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 0.0,
    -1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 1.0,
    // front face
    -1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 0.0,
     1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 0.0,
     1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 1.0,
    -1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 1.0,
    -1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 0.0,
    // left face
    -1.0,  1.0,  1.0, -1.0,  0.0,  0.0, 1.0, 0.0,
    -1.0,  1.0, -1.0, -1.0,  0.0,  0.0, 1.0, 1.0,
    -1.0, -1.0, -1.0, -1.0,  0.0,  0.0, 0.0, 1.0,
    -1.0, -1.0, -1.0, -1.0,  0.0,  0.0, 0.0, 1.0,
    -1.0, -1.0,  1.0, -1.0,  0.0,  0.0, 0.0, 0.0,
    -1.0,  1.0,  1.0, -1.0,  0.0,  0.0, 1.0, 0.0,
    // right face
     1.0,  1.0,  1.0,  1.0,  0.0,  0.0, 1.0, 0.0,
     1.0, -1.0, -1.0,  1.0,  0.0,  0.0, 0.0, 1.0,
     1.0,  1.0, -1.0,  1.0,  0.0,  0.0, 1.0, 1.0,
     1.0, -1.0, -1.0,  1.0,  0.0,  0.0, 0.0, 1.0,
     1.0,  1.0,  1.0,  1.0,  0.0,  0.0, 1.0, 0.0,
     1.0, -1.0,  1.0,  1.0,  0.0,  0.0, 0.0, 0.0,
    // bottom face
    -1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 0.0, 1.0,
     1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 1.0, 1.0,
     1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 1.0, 0.0,
     1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 1.0, 0.0,
    -1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 0.0, 0.0,
    -1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 0.0, 1.0,
    // top face
    -1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 0.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 1.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 1.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 1.0, 0.0,
    -1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 0.0, 1.0,
    -1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 0.0, 0.0,
];

/// Full-screen triangle-strip quad: NDC position and [0, 1] texcoord
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 4 * 5] = [
    -1.0,  1.0, 0.0, 0.0, 1.0,
    -1.0, -1.0, 0.0, 0.0, 0.0,
     1.0,  1.0, 0.0, 1.0, 1.0,
     1.0, -1.0, 0.0, 1.0, 0.0,
];

/// GPU copy of [`CUBE_VERTICES`]
#[derive(Debug)]
pub struct UnitCube {
    vertex_array: VertexArrayId,
}

impl UnitCube {
    /// Upload the cube
    pub fn new(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        let vertex_array = device.create_vertex_array(&VertexArrayDescriptor {
            vertices: &CUBE_VERTICES,
            indices: None,
            attribute_components: &[3, 3, 2],
            topology: PrimitiveTopology::Triangles,
        })?;
        Ok(Self { vertex_array })
    }

    /// Vertex array handle
    pub const fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Draw all 36 vertices with the program in use
    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.draw(self.vertex_array);
    }

    /// Free the GPU copy
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_vertex_array(self.vertex_array);
    }
}

/// GPU copy of [`QUAD_VERTICES`]
#[derive(Debug)]
pub struct ScreenQuad {
    vertex_array: VertexArrayId,
}

impl ScreenQuad {
    /// Upload the quad
    pub fn new(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        let vertex_array = device.create_vertex_array(&VertexArrayDescriptor {
            vertices: &QUAD_VERTICES,
            indices: None,
            attribute_components: &[3, 2],
            topology: PrimitiveTopology::TriangleStrip,
        })?;
        Ok(Self { vertex_array })
    }

    /// Vertex array handle
    pub const fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Draw the four strip vertices with the program in use
    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.draw(self.vertex_array);
    }

    /// Free the GPU copy
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_vertex_array(self.vertex_array);
    }
}
