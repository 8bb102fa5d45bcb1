//! Backend-neutral rendering interfaces
//!
//! Passes talk to the GPU only through [`GraphicsDevice`] and draw meshes only
//! through [`Drawable`], so the same frame code runs against OpenGL and the
//! headless device.

pub mod drawable;
pub mod graphics_device;

pub use drawable::Drawable;
pub use graphics_device::{
    BindingState, ClearFlags, Extent2D, FilterMode, FramebufferId, FramebufferStatus,
    FramebufferTarget, GraphicsDevice, PrimitiveTopology, ProgramId, Rect2D, RenderbufferId,
    ResourceCounts, ShaderStage, TextureDescriptor, TextureFormat, TextureId, UniformValue,
    VertexArrayDescriptor, VertexArrayId,
};
