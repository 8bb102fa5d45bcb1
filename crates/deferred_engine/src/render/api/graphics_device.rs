//! Graphics device abstraction
//!
//! This module defines the trait a GPU backend implements for the shading
//! pipeline. It is deliberately close to the OpenGL object model: textures,
//! renderbuffers, framebuffers, vertex arrays and linked programs, plus the
//! small amount of global binding state the passes must leave untouched.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::RenderResult;

new_key_type! {
    /// Handle to a 2D texture
    pub struct TextureId;
    /// Handle to a renderbuffer
    pub struct RenderbufferId;
    /// Handle to an offscreen framebuffer
    pub struct FramebufferId;
    /// Handle to a vertex array with its buffers
    pub struct VertexArrayId;
    /// Handle to a linked shader program
    pub struct ProgramId;
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Extent2D {
    /// Create an extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `width / height`
    pub fn aspect_ratio(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Number of pixels covered
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pixel rectangle anchored at its lower-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect2D {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect2D {
    /// Rectangle covering `extent` from the origin
    pub const fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    /// Size of the rectangle
    pub const fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

/// Texel formats used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Three half-float channels (positions, normals)
    Rgb16F,
    /// Four 8-bit normalized channels
    Rgba8,
    /// Three 8-bit normalized channels
    Rgb8,
}

impl TextureFormat {
    /// Bytes per texel when uploading pixel data
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgb16F => 6,
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Sampling filter, also used for blits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Parameters for [`GraphicsDevice::create_texture`]
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    /// Size in texels
    pub extent: Extent2D,
    /// Storage format
    pub format: TextureFormat,
    /// Min/mag filter
    pub filter: FilterMode,
    /// Tightly packed initial contents, or `None` for uninitialized storage
    pub data: Option<&'a [u8]>,
    /// Build a mip chain after upload
    pub generate_mipmaps: bool,
}

impl<'a> TextureDescriptor<'a> {
    /// Uninitialized render target storage
    pub const fn render_target(extent: Extent2D, format: TextureFormat) -> Self {
        Self {
            extent,
            format,
            filter: FilterMode::Nearest,
            data: None,
            generate_mipmaps: false,
        }
    }

    /// Sampled RGBA8 image with mipmaps
    pub const fn image_rgba8(extent: Extent2D, pixels: &'a [u8]) -> Self {
        Self {
            extent,
            format: TextureFormat::Rgba8,
            filter: FilterMode::Linear,
            data: Some(pixels),
            generate_mipmaps: true,
        }
    }
}

/// Framebuffer binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferTarget {
    /// Destination of draws, clears and blits
    Draw,
    /// Source of blits
    Read,
    /// Both points at once
    Both,
}

/// Completeness reported by the device for a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// Ready for rendering
    Complete,
    /// An attachment is not renderable
    IncompleteAttachment,
    /// Nothing is attached
    MissingAttachment,
    /// Attachments disagree in size
    IncompleteDimensions,
    /// A draw buffer names a missing attachment
    IncompleteDrawBuffer,
    /// Format combination not supported by the implementation
    Unsupported,
    /// Any other implementation-specific code
    Other(u32),
}

impl FramebufferStatus {
    /// Whether the framebuffer can be rendered to
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

bitflags! {
    /// Buffers affected by a clear or a blit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Color attachments
        const COLOR = 0b01;
        /// Depth attachment
        const DEPTH = 0b10;
    }
}

/// How vertices are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Independent triangles
    Triangles,
    /// Triangle strip
    TriangleStrip,
}

/// Interleaved `f32` vertex data for [`GraphicsDevice::create_vertex_array`]
#[derive(Debug, Clone, Copy)]
pub struct VertexArrayDescriptor<'a> {
    /// Interleaved vertex floats
    pub vertices: &'a [f32],
    /// Optional triangle indices
    pub indices: Option<&'a [u32]>,
    /// Component count of each attribute, in location order
    pub attribute_components: &'a [u32],
    /// Primitive assembly
    pub topology: PrimitiveTopology,
}

impl VertexArrayDescriptor<'_> {
    /// Floats per vertex
    pub fn stride(&self) -> usize {
        self.attribute_components.iter().map(|&c| c as usize).sum()
    }

    /// Number of vertices in `vertices`
    pub fn vertex_count(&self) -> usize {
        let stride = self.stride();
        if stride == 0 {
            0
        } else {
            self.vertices.len() / stride
        }
    }

    /// Number of elements a full draw submits
    pub fn draw_count(&self) -> usize {
        self.indices.map_or_else(|| self.vertex_count(), <[u32]>::len)
    }
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Value written to a named uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `int` or sampler unit
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`, column-major
    Mat4(Mat4),
}

/// Global binding state every pass must restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingState {
    /// Framebuffer bound for drawing; `None` is the default framebuffer
    pub draw_framebuffer: Option<FramebufferId>,
    /// Framebuffer bound for reading; `None` is the default framebuffer
    pub read_framebuffer: Option<FramebufferId>,
    /// Active texture unit index
    pub active_texture_unit: u32,
    /// Current viewport
    pub viewport: Rect2D,
    /// Program in use
    pub program: Option<ProgramId>,
}

impl BindingState {
    /// Default framebuffer on both points and texture unit 0 active
    pub const fn is_restored(&self) -> bool {
        self.draw_framebuffer.is_none()
            && self.read_framebuffer.is_none()
            && self.active_texture_unit == 0
    }
}

/// Number of live objects of each kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    /// Live textures
    pub textures: usize,
    /// Live renderbuffers
    pub renderbuffers: usize,
    /// Live framebuffers
    pub framebuffers: usize,
    /// Live vertex arrays
    pub vertex_arrays: usize,
    /// Live programs
    pub programs: usize,
}

/// GPU backend used by the shading pipeline
///
/// All state is global to the device, exactly like an OpenGL context. Uniform
/// writes go to `program`, which must be the program in use.
pub trait GraphicsDevice {
    /// Allocate a 2D texture
    fn create_texture(&mut self, descriptor: &TextureDescriptor<'_>) -> RenderResult<TextureId>;
    /// Free a texture
    fn delete_texture(&mut self, texture: TextureId);
    /// Size of a live texture
    fn texture_extent(&self, texture: TextureId) -> Option<Extent2D>;

    /// Allocate a 24-bit depth renderbuffer
    fn create_depth_renderbuffer(&mut self, extent: Extent2D) -> RenderResult<RenderbufferId>;
    /// Free a renderbuffer
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    /// Allocate an empty framebuffer
    fn create_framebuffer(&mut self) -> RenderResult<FramebufferId>;
    /// Free a framebuffer; bindings to it fall back to the default framebuffer
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Attach `texture` as color attachment `slot`
    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: u32,
        texture: TextureId,
    ) -> RenderResult<()>;
    /// Attach `renderbuffer` as the depth attachment
    fn attach_depth_renderbuffer(
        &mut self,
        framebuffer: FramebufferId,
        renderbuffer: RenderbufferId,
    ) -> RenderResult<()>;
    /// Route fragment outputs `0..count` to color attachments `0..count`
    fn set_draw_buffers(&mut self, framebuffer: FramebufferId, count: u32) -> RenderResult<()>;
    /// Completeness of a framebuffer
    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus;
    /// Bind a framebuffer; `None` selects the default framebuffer
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>);
    /// Copy between the bound read and draw framebuffers
    fn blit_framebuffer(&mut self, source: Rect2D, destination: Rect2D, mask: ClearFlags, filter: FilterMode);

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Rect2D);
    /// Set the clear color
    fn set_clear_color(&mut self, color: [f32; 4]);
    /// Clear buffers of the bound draw framebuffer
    fn clear(&mut self, flags: ClearFlags);
    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Select the texture unit later texture binds apply to
    fn set_active_texture_unit(&mut self, unit: u32);
    /// Bind a texture to the active unit
    fn bind_texture_2d(&mut self, texture: Option<TextureId>);

    /// Upload vertex data and describe its layout
    fn create_vertex_array(&mut self, descriptor: &VertexArrayDescriptor<'_>) -> RenderResult<VertexArrayId>;
    /// Free a vertex array and its buffers
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
    /// Draw every vertex (or index) of a vertex array with the program in use
    fn draw(&mut self, vertex_array: VertexArrayId);

    /// Compile and link a program
    fn create_program(&mut self, label: &str, vertex_source: &str, fragment_source: &str) -> RenderResult<ProgramId>;
    /// Free a program
    fn delete_program(&mut self, program: ProgramId);
    /// Make a program current
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Whether the linked program exposes an active uniform called `name`
    fn has_uniform(&mut self, program: ProgramId, name: &str) -> bool;
    /// Write a uniform of the current program; unknown names are ignored
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);

    /// Snapshot of the tracked global bindings
    fn binding_state(&self) -> BindingState;
    /// Live object counts
    fn resource_counts(&self) -> ResourceCounts;
}
