//! [`GraphicsDevice`] over a live OpenGL context

use std::collections::HashMap;

use glow::HasContext;
use slotmap::SlotMap;

use crate::render::api::{
    BindingState, ClearFlags, Extent2D, FilterMode, FramebufferId, FramebufferStatus,
    FramebufferTarget, GraphicsDevice, PrimitiveTopology, ProgramId, Rect2D, RenderbufferId,
    ResourceCounts, ShaderStage, TextureDescriptor, TextureFormat, TextureId, UniformValue,
    VertexArrayDescriptor, VertexArrayId,
};
use crate::render::window::{Window, WindowError};
use crate::render::{RenderError, RenderResult};

/// GLES-only status code some desktop drivers still report
const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;

/// Texture units tracked for rebinding after texture creation
const TRACKED_TEXTURE_UNITS: usize = 16;

struct GlTexture {
    raw: glow::Texture,
    extent: Extent2D,
}

struct GlVertexArray {
    vao: glow::VertexArray,
    vertex_buffer: glow::Buffer,
    index_buffer: Option<glow::Buffer>,
    topology: PrimitiveTopology,
    count: i32,
}

/// OpenGL device
pub struct GlDevice {
    gl: glow::Context,
    textures: SlotMap<TextureId, GlTexture>,
    renderbuffers: SlotMap<RenderbufferId, glow::Renderbuffer>,
    framebuffers: SlotMap<FramebufferId, glow::Framebuffer>,
    vertex_arrays: SlotMap<VertexArrayId, GlVertexArray>,
    programs: SlotMap<ProgramId, glow::Program>,
    uniform_locations: HashMap<(ProgramId, String), Option<glow::UniformLocation>>,
    unit_textures: [Option<TextureId>; TRACKED_TEXTURE_UNITS],
    state: BindingState,
}

impl GlDevice {
    /// Load GL entry points from the window's current context
    ///
    /// Fails when the context is older than OpenGL 3.3.
    pub fn from_window(window: &mut Window) -> Result<Self, WindowError> {
        let gl = unsafe { glow::Context::from_loader_function(|name| window.proc_address(name)) };

        let version = gl.version();
        if (version.major, version.minor) < (3, 3) {
            return Err(WindowError::GraphicsLoaderFailed(format!(
                "OpenGL 3.3 required, context reports {}.{} {}",
                version.major, version.minor, version.vendor_info
            )));
        }
        log::info!(
            "OpenGL {}.{} context loaded ({})",
            version.major,
            version.minor,
            version.vendor_info
        );

        Ok(Self::new(gl, window.framebuffer_extent()))
    }

    /// Wrap an already-loaded context
    pub fn new(gl: glow::Context, framebuffer_extent: Extent2D) -> Self {
        let viewport = Rect2D::from_extent(framebuffer_extent);
        unsafe {
            gl.viewport(viewport.x, viewport.y, viewport.width as i32, viewport.height as i32);
            gl.active_texture(glow::TEXTURE0);
        }
        Self {
            gl,
            textures: SlotMap::with_key(),
            renderbuffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            uniform_locations: HashMap::new(),
            unit_textures: [None; TRACKED_TEXTURE_UNITS],
            state: BindingState {
                viewport,
                ..BindingState::default()
            },
        }
    }

    fn raw_framebuffer(&self, framebuffer: Option<FramebufferId>) -> Option<glow::Framebuffer> {
        framebuffer.and_then(|fb| self.framebuffers.get(fb).copied())
    }

    fn raw_texture(&self, texture: Option<TextureId>) -> Option<glow::Texture> {
        texture.and_then(|t| self.textures.get(t).map(|t| t.raw))
    }

    fn active_unit_texture(&self) -> Option<glow::Texture> {
        let unit = self.state.active_texture_unit as usize;
        self.raw_texture(self.unit_textures.get(unit).copied().flatten())
    }

    /// Run `op` with `framebuffer` bound to `GL_FRAMEBUFFER`, then restore the tracked bindings
    fn with_framebuffer<R>(
        &self,
        framebuffer: FramebufferId,
        op: impl FnOnce(&glow::Context) -> R,
    ) -> RenderResult<R> {
        let raw = self.framebuffers.get(framebuffer).copied().ok_or_else(|| {
            RenderError::ResourceCreationFailed("framebuffer was deleted".to_string())
        })?;
        let result = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(raw));
            let result = op(&self.gl);
            self.gl
                .bind_framebuffer(glow::DRAW_FRAMEBUFFER, self.raw_framebuffer(self.state.draw_framebuffer));
            self.gl
                .bind_framebuffer(glow::READ_FRAMEBUFFER, self.raw_framebuffer(self.state.read_framebuffer));
            result
        };
        Ok(result)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<glow::UniformLocation> {
        let key = (program, name.to_string());
        if let Some(cached) = self.uniform_locations.get(&key) {
            return cached.clone();
        }
        let raw = *self.programs.get(program)?;
        let location = unsafe { self.gl.get_uniform_location(raw, name) };
        self.uniform_locations.insert(key, location.clone());
        location
    }

    fn compile_stage(&self, label: &str, stage: ShaderStage, source: &str) -> RenderResult<glow::Shader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(shader)
            } else {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                Err(RenderError::ShaderCompile {
                    label: label.to_string(),
                    stage,
                    log,
                })
            }
        }
    }
}

const fn texture_formats(format: TextureFormat) -> (u32, u32, u32) {
    match format {
        TextureFormat::Rgb16F => (glow::RGB16F, glow::RGB, glow::FLOAT),
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Rgb8 => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
    }
}

const fn filter_enum(filter: FilterMode) -> u32 {
    match filter {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
    }
}

const fn topology_enum(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::Triangles => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

fn buffer_bits(flags: ClearFlags) -> u32 {
    let mut bits = 0;
    if flags.contains(ClearFlags::COLOR) {
        bits |= glow::COLOR_BUFFER_BIT;
    }
    if flags.contains(ClearFlags::DEPTH) {
        bits |= glow::DEPTH_BUFFER_BIT;
    }
    bits
}

const fn status_from_code(code: u32) -> FramebufferStatus {
    match code {
        glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
        FRAMEBUFFER_INCOMPLETE_DIMENSIONS => FramebufferStatus::IncompleteDimensions,
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
        glow::FRAMEBUFFER_UNSUPPORTED => FramebufferStatus::Unsupported,
        other => FramebufferStatus::Other(other),
    }
}

impl GraphicsDevice for GlDevice {
    fn create_texture(&mut self, descriptor: &TextureDescriptor<'_>) -> RenderResult<TextureId> {
        let (internal_format, format, ty) = texture_formats(descriptor.format);
        let extent = descriptor.extent;
        let restore = self.active_unit_texture();

        let raw = unsafe {
            let raw = self
                .gl
                .create_texture()
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                extent.width as i32,
                extent.height as i32,
                0,
                format,
                ty,
                descriptor.data,
            );

            let filter = filter_enum(descriptor.filter) as i32;
            if descriptor.generate_mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
                self.gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MIN_FILTER,
                    glow::LINEAR_MIPMAP_LINEAR as i32,
                );
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            } else {
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
                self.gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_WRAP_S,
                    glow::CLAMP_TO_EDGE as i32,
                );
                self.gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_WRAP_T,
                    glow::CLAMP_TO_EDGE as i32,
                );
            }
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            self.gl.bind_texture(glow::TEXTURE_2D, restore);
            raw
        };

        Ok(self.textures.insert(GlTexture { raw, extent }))
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(record) = self.textures.remove(texture) {
            for unit in &mut self.unit_textures {
                if *unit == Some(texture) {
                    *unit = None;
                }
            }
            unsafe { self.gl.delete_texture(record.raw) };
        }
    }

    fn texture_extent(&self, texture: TextureId) -> Option<Extent2D> {
        self.textures.get(texture).map(|t| t.extent)
    }

    fn create_depth_renderbuffer(&mut self, extent: Extent2D) -> RenderResult<RenderbufferId> {
        let raw = unsafe {
            let raw = self
                .gl
                .create_renderbuffer()
                .map_err(RenderError::ResourceCreationFailed)?;
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(raw));
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                glow::DEPTH_COMPONENT24,
                extent.width as i32,
                extent.height as i32,
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            raw
        };
        Ok(self.renderbuffers.insert(raw))
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if let Some(raw) = self.renderbuffers.remove(renderbuffer) {
            unsafe { self.gl.delete_renderbuffer(raw) };
        }
    }

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferId> {
        let raw = unsafe { self.gl.create_framebuffer() }.map_err(RenderError::ResourceCreationFailed)?;
        Ok(self.framebuffers.insert(raw))
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(raw) = self.framebuffers.remove(framebuffer) {
            // GL falls back to the default framebuffer for deleted bindings
            if self.state.draw_framebuffer == Some(framebuffer) {
                self.state.draw_framebuffer = None;
            }
            if self.state.read_framebuffer == Some(framebuffer) {
                self.state.read_framebuffer = None;
            }
            unsafe { self.gl.delete_framebuffer(raw) };
        }
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: u32,
        texture: TextureId,
    ) -> RenderResult<()> {
        let raw = self.raw_texture(Some(texture)).ok_or_else(|| {
            RenderError::ResourceCreationFailed("attaching a deleted texture".to_string())
        })?;
        self.with_framebuffer(framebuffer, |gl| unsafe {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0 + slot,
                glow::TEXTURE_2D,
                Some(raw),
                0,
            );
        })
    }

    fn attach_depth_renderbuffer(
        &mut self,
        framebuffer: FramebufferId,
        renderbuffer: RenderbufferId,
    ) -> RenderResult<()> {
        let raw = self.renderbuffers.get(renderbuffer).copied().ok_or_else(|| {
            RenderError::ResourceCreationFailed("attaching a deleted renderbuffer".to_string())
        })?;
        self.with_framebuffer(framebuffer, |gl| unsafe {
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(raw),
            );
        })
    }

    fn set_draw_buffers(&mut self, framebuffer: FramebufferId, count: u32) -> RenderResult<()> {
        let buffers: Vec<u32> = (0..count).map(|i| glow::COLOR_ATTACHMENT0 + i).collect();
        self.with_framebuffer(framebuffer, |gl| unsafe { gl.draw_buffers(&buffers) })
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        self.with_framebuffer(framebuffer, |gl| unsafe {
            gl.check_framebuffer_status(glow::FRAMEBUFFER)
        })
        .map_or(FramebufferStatus::Other(0), status_from_code)
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        let raw = self.raw_framebuffer(framebuffer);
        let gl_target = match target {
            FramebufferTarget::Draw => {
                self.state.draw_framebuffer = framebuffer;
                glow::DRAW_FRAMEBUFFER
            }
            FramebufferTarget::Read => {
                self.state.read_framebuffer = framebuffer;
                glow::READ_FRAMEBUFFER
            }
            FramebufferTarget::Both => {
                self.state.draw_framebuffer = framebuffer;
                self.state.read_framebuffer = framebuffer;
                glow::FRAMEBUFFER
            }
        };
        unsafe { self.gl.bind_framebuffer(gl_target, raw) };
    }

    fn blit_framebuffer(
        &mut self,
        source: Rect2D,
        destination: Rect2D,
        mask: ClearFlags,
        filter: FilterMode,
    ) {
        unsafe {
            self.gl.blit_framebuffer(
                source.x,
                source.y,
                source.x + source.width as i32,
                source.y + source.height as i32,
                destination.x,
                destination.y,
                destination.x + destination.width as i32,
                destination.y + destination.height as i32,
                buffer_bits(mask),
                filter_enum(filter),
            );
        }
    }

    fn set_viewport(&mut self, viewport: Rect2D) {
        self.state.viewport = viewport;
        unsafe {
            self.gl.viewport(
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            );
        }
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&mut self, flags: ClearFlags) {
        unsafe { self.gl.clear(buffer_bits(flags)) };
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_active_texture_unit(&mut self, unit: u32) {
        self.state.active_texture_unit = unit;
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture_2d(&mut self, texture: Option<TextureId>) {
        let unit = self.state.active_texture_unit as usize;
        if let Some(slot) = self.unit_textures.get_mut(unit) {
            *slot = texture;
        }
        let raw = self.raw_texture(texture);
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, raw) };
    }

    fn create_vertex_array(
        &mut self,
        descriptor: &VertexArrayDescriptor<'_>,
    ) -> RenderResult<VertexArrayId> {
        let stride = descriptor.stride();
        if stride == 0 || descriptor.vertices.len() % stride != 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "{} floats do not divide into vertices of {stride}",
                descriptor.vertices.len()
            )));
        }
        let stride_bytes = (stride * std::mem::size_of::<f32>()) as i32;

        let record = unsafe {
            let vao = self
                .gl
                .create_vertex_array()
                .map_err(RenderError::ResourceCreationFailed)?;
            let vertex_buffer = self
                .gl
                .create_buffer()
                .map_err(RenderError::ResourceCreationFailed)?;

            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(descriptor.vertices),
                glow::STATIC_DRAW,
            );

            let index_buffer = match descriptor.indices {
                Some(indices) => {
                    let buffer = self
                        .gl
                        .create_buffer()
                        .map_err(RenderError::ResourceCreationFailed)?;
                    self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
                    self.gl.buffer_data_u8_slice(
                        glow::ELEMENT_ARRAY_BUFFER,
                        bytemuck::cast_slice(indices),
                        glow::STATIC_DRAW,
                    );
                    Some(buffer)
                }
                None => None,
            };

            let mut offset = 0;
            for (location, &components) in descriptor.attribute_components.iter().enumerate() {
                self.gl.enable_vertex_attrib_array(location as u32);
                self.gl.vertex_attrib_pointer_f32(
                    location as u32,
                    components as i32,
                    glow::FLOAT,
                    false,
                    stride_bytes,
                    offset,
                );
                offset += (components as usize * std::mem::size_of::<f32>()) as i32;
            }

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);

            GlVertexArray {
                vao,
                vertex_buffer,
                index_buffer,
                topology: descriptor.topology,
                count: descriptor.draw_count() as i32,
            }
        };

        Ok(self.vertex_arrays.insert(record))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if let Some(record) = self.vertex_arrays.remove(vertex_array) {
            unsafe {
                self.gl.delete_vertex_array(record.vao);
                self.gl.delete_buffer(record.vertex_buffer);
                if let Some(buffer) = record.index_buffer {
                    self.gl.delete_buffer(buffer);
                }
            }
        }
    }

    fn draw(&mut self, vertex_array: VertexArrayId) {
        let Some(record) = self.vertex_arrays.get(vertex_array) else {
            log::warn!("Draw with a deleted vertex array ignored");
            return;
        };
        let mode = topology_enum(record.topology);
        unsafe {
            self.gl.bind_vertex_array(Some(record.vao));
            if record.index_buffer.is_some() {
                self.gl.draw_elements(mode, record.count, glow::UNSIGNED_INT, 0);
            } else {
                self.gl.draw_arrays(mode, 0, record.count);
            }
            self.gl.bind_vertex_array(None);
        }
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RenderResult<ProgramId> {
        let vertex = self.compile_stage(label, ShaderStage::Vertex, vertex_source)?;
        let fragment = match self.compile_stage(label, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                unsafe { self.gl.delete_shader(vertex) };
                return Err(err);
            }
        };

        unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(err) => {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                    return Err(RenderError::ResourceCreationFailed(err));
                }
            };
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);

            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            self.gl.delete_shader(vertex);
            self.gl.delete_shader(fragment);

            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(RenderError::ShaderLink {
                    label: label.to_string(),
                    log,
                });
            }
            Ok(self.programs.insert(program))
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(raw) = self.programs.remove(program) {
            self.uniform_locations.retain(|(owner, _), _| *owner != program);
            if self.state.program == Some(program) {
                self.state.program = None;
            }
            unsafe { self.gl.delete_program(raw) };
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.state.program = program;
        let raw = program.and_then(|p| self.programs.get(p).copied());
        unsafe { self.gl.use_program(raw) };
    }

    fn has_uniform(&mut self, program: ProgramId, name: &str) -> bool {
        self.uniform_location(program, name).is_some()
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        if self.state.program != Some(program) {
            log::warn!("Uniform '{name}' written to a program that is not in use; ignored");
            return;
        }
        let Some(location) = self.uniform_location(program, name) else {
            log::trace!("Uniform '{name}' is not active; write ignored");
            return;
        };
        let location = Some(&location);
        unsafe {
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(location, v.x, v.y),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(location, v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => {
                    self.gl.uniform_matrix_4_f32_slice(location, false, m.as_slice());
                }
            }
        }
    }

    fn binding_state(&self) -> BindingState {
        self.state
    }

    fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.len(),
            renderbuffers: self.renderbuffers.len(),
            framebuffers: self.framebuffers.len(),
            vertex_arrays: self.vertex_arrays.len(),
            programs: self.programs.len(),
        }
    }
}
