//! Headless graphics device
//!
//! An in-memory [`GraphicsDevice`] for machines without a GPU. It tracks
//! objects and bindings the way an OpenGL context does, reflects uniform
//! names out of GLSL source, records every draw and uniform write, and keeps
//! real depth buffers so depth copies between framebuffers can be inspected.
//!
//! Rasterization is approximate: a draw with a `model` uniform splats the
//! projected model origin into a small square of the depth buffer, and a draw
//! without one (the full-screen quad) covers the viewport at depth 0.5.

use std::collections::{BTreeMap, HashMap, HashSet};

use slotmap::SlotMap;

use crate::foundation::math::{Mat4, Point3};
use crate::render::api::{
    BindingState, ClearFlags, Extent2D, FilterMode, FramebufferId, FramebufferStatus,
    FramebufferTarget, GraphicsDevice, PrimitiveTopology, ProgramId, Rect2D, RenderbufferId,
    ResourceCounts, ShaderStage, TextureDescriptor, TextureId, UniformValue,
    VertexArrayDescriptor, VertexArrayId,
};
use crate::render::{RenderError, RenderResult};

/// Texture units available on the headless device
pub const MAX_TEXTURE_UNITS: u32 = 16;

/// Color attachment slots available on the headless device
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// Half-width in pixels of the square a model draw writes into the depth buffer
const SPLAT_RADIUS: i64 = 2;

/// Depth of the full-screen quad (NDC z = 0)
const QUAD_DEPTH: f32 = 0.5;

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Program in use
    pub program: Option<ProgramId>,
    /// Label of the program in use
    pub program_label: Option<String>,
    /// Bound draw framebuffer
    pub framebuffer: Option<FramebufferId>,
    /// Vertex array drawn
    pub vertex_array: VertexArrayId,
    /// Primitive assembly
    pub topology: PrimitiveTopology,
    /// Vertices or indices submitted
    pub count: usize,
    /// Value of the `model` uniform at draw time
    pub model: Option<Mat4>,
    /// Non-empty texture units as `(unit, texture)`
    pub bound_textures: Vec<(u32, TextureId)>,
    /// Whether depth testing was on
    pub depth_test: bool,
}

/// One recorded uniform write
#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    /// Target program
    pub program: ProgramId,
    /// Uniform name as written
    pub name: String,
    /// Written value
    pub value: UniformValue,
    /// Whether the program declares the name
    pub known: bool,
    /// Whether the program was in use at the time
    pub active: bool,
}

/// One recorded clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearRecord {
    /// Bound draw framebuffer
    pub framebuffer: Option<FramebufferId>,
    /// Cleared buffers
    pub flags: ClearFlags,
}

#[derive(Debug, Clone)]
struct DepthStore {
    extent: Extent2D,
    values: Vec<f32>,
}

impl DepthStore {
    fn new(extent: Extent2D) -> Self {
        Self {
            extent,
            values: vec![1.0; extent.area()],
        }
    }

    fn clear(&mut self) {
        self.values.fill(1.0);
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let inside = x >= 0
            && y >= 0
            && x < i64::from(self.extent.width)
            && y < i64::from(self.extent.height);
        inside.then(|| y as usize * self.extent.width as usize + x as usize)
    }

    fn get(&self, x: i64, y: i64) -> Option<f32> {
        self.index(x, y).map(|i| self.values[i])
    }

    fn write(&mut self, x: i64, y: i64, depth: f32, depth_test: bool) {
        if let Some(i) = self.index(x, y) {
            if !depth_test || depth < self.values[i] {
                self.values[i] = depth;
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect2D, depth: f32, depth_test: bool) {
        for y in 0..i64::from(rect.height) {
            for x in 0..i64::from(rect.width) {
                self.write(i64::from(rect.x) + x, i64::from(rect.y) + y, depth, depth_test);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct TextureRecord {
    extent: Extent2D,
    data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
struct FramebufferRecord {
    colors: BTreeMap<u32, TextureId>,
    depth: Option<RenderbufferId>,
    draw_buffers: u32,
}

#[derive(Debug, Clone, Copy)]
struct VertexArrayRecord {
    topology: PrimitiveTopology,
    count: usize,
}

#[derive(Debug, Clone)]
struct ProgramRecord {
    label: String,
    uniforms: HashSet<String>,
    values: HashMap<String, UniformValue>,
}

/// In-memory graphics device
#[derive(Debug)]
pub struct HeadlessDevice {
    textures: SlotMap<TextureId, TextureRecord>,
    renderbuffers: SlotMap<RenderbufferId, DepthStore>,
    framebuffers: SlotMap<FramebufferId, FramebufferRecord>,
    vertex_arrays: SlotMap<VertexArrayId, VertexArrayRecord>,
    programs: SlotMap<ProgramId, ProgramRecord>,
    default_depth: DepthStore,
    state: BindingState,
    texture_units: Vec<Option<TextureId>>,
    clear_color: [f32; 4],
    depth_test: bool,
    forced_status: Option<FramebufferStatus>,
    draws: Vec<DrawRecord>,
    uniform_writes: Vec<UniformWrite>,
    clears: Vec<ClearRecord>,
    blits: usize,
}

impl HeadlessDevice {
    /// Create a device whose default framebuffer has the given size
    pub fn new(default_extent: Extent2D) -> Self {
        Self {
            textures: SlotMap::with_key(),
            renderbuffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            default_depth: DepthStore::new(default_extent),
            state: BindingState {
                viewport: Rect2D::from_extent(default_extent),
                ..BindingState::default()
            },
            texture_units: vec![None; MAX_TEXTURE_UNITS as usize],
            clear_color: [0.0; 4],
            depth_test: false,
            forced_status: None,
            draws: Vec::new(),
            uniform_writes: Vec::new(),
            clears: Vec::new(),
            blits: 0,
        }
    }

    /// Make every later [`GraphicsDevice::framebuffer_status`] report `status`
    pub fn force_framebuffer_status(&mut self, status: Option<FramebufferStatus>) {
        self.forced_status = status;
    }

    /// Draw calls recorded since the last [`Self::reset_logs`]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Uniform writes recorded since the last [`Self::reset_logs`]
    pub fn uniform_writes(&self) -> &[UniformWrite] {
        &self.uniform_writes
    }

    /// Clears recorded since the last [`Self::reset_logs`]
    pub fn clears(&self) -> &[ClearRecord] {
        &self.clears
    }

    /// Blits performed since the last [`Self::reset_logs`]
    pub const fn blit_count(&self) -> usize {
        self.blits
    }

    /// Forget recorded draws, uniform writes, clears and blits
    pub fn reset_logs(&mut self) {
        self.draws.clear();
        self.uniform_writes.clear();
        self.clears.clear();
        self.blits = 0;
    }

    /// Last value stored in a program's uniform
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs.get(program)?.values.get(name).copied()
    }

    /// Label a program was created with
    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(program).map(|p| p.label.as_str())
    }

    /// Depth values of the default framebuffer, row-major from the bottom row
    pub fn default_depth(&self) -> &[f32] {
        &self.default_depth.values
    }

    /// Depth values of a renderbuffer
    pub fn renderbuffer_depth(&self, renderbuffer: RenderbufferId) -> Option<&[f32]> {
        self.renderbuffers.get(renderbuffer).map(|r| r.values.as_slice())
    }

    /// Texture bound to a unit
    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(unit as usize).copied().flatten()
    }

    /// Initial contents a texture was created with
    pub fn texture_data(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(texture)?.data.as_deref()
    }

    /// Whether depth testing is enabled
    pub const fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    /// Current clear color
    pub const fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    fn depth_store(&self, framebuffer: Option<FramebufferId>) -> Option<&DepthStore> {
        match framebuffer {
            None => Some(&self.default_depth),
            Some(fb) => {
                let renderbuffer = self.framebuffers.get(fb)?.depth?;
                self.renderbuffers.get(renderbuffer)
            }
        }
    }

    fn depth_store_mut(&mut self, framebuffer: Option<FramebufferId>) -> Option<&mut DepthStore> {
        match framebuffer {
            None => Some(&mut self.default_depth),
            Some(fb) => {
                let renderbuffer = self.framebuffers.get(fb)?.depth?;
                self.renderbuffers.get_mut(renderbuffer)
            }
        }
    }

    fn mat4_uniform(&self, program: Option<ProgramId>, name: &str) -> Option<Mat4> {
        match self.uniform_value(program?, name)? {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        }
    }

    fn rasterize_depth(&mut self, program: Option<ProgramId>, model: Option<Mat4>) {
        let viewport = self.state.viewport;
        let depth_test = self.depth_test;
        let target = self.state.draw_framebuffer;

        let Some(model) = model else {
            if let Some(store) = self.depth_store_mut(target) {
                store.fill_rect(viewport, QUAD_DEPTH, depth_test);
            }
            return;
        };

        let view = self.mat4_uniform(program, "view").unwrap_or_else(Mat4::identity);
        let projection = self
            .mat4_uniform(program, "projection")
            .unwrap_or_else(Mat4::identity);
        let clip = projection * view * model * Point3::origin().to_homogeneous();
        if clip.w <= 0.0 {
            return;
        }
        let ndc = clip.xyz() / clip.w;
        if ndc.iter().any(|c| !(-1.0..=1.0).contains(c)) {
            return;
        }

        let depth = ndc.z.mul_add(0.5, 0.5);
        let px = i64::from(viewport.x)
            + (ndc.x.mul_add(0.5, 0.5) * viewport.width as f32).floor() as i64;
        let py = i64::from(viewport.y)
            + (ndc.y.mul_add(0.5, 0.5) * viewport.height as f32).floor() as i64;

        if let Some(store) = self.depth_store_mut(target) {
            for dy in -SPLAT_RADIUS..=SPLAT_RADIUS {
                for dx in -SPLAT_RADIUS..=SPLAT_RADIUS {
                    store.write(px + dx, py + dy, depth, depth_test);
                }
            }
        }
    }

    fn blit_depth(&mut self, source: Rect2D, destination: Rect2D) {
        let Some(src) = self.depth_store(self.state.read_framebuffer).cloned() else {
            log::warn!("Depth blit from a framebuffer without a depth attachment ignored");
            return;
        };
        let draw_target = self.state.draw_framebuffer;
        let Some(dst) = self.depth_store_mut(draw_target) else {
            log::warn!("Depth blit into a framebuffer without a depth attachment ignored");
            return;
        };
        if destination.width == 0 || destination.height == 0 {
            return;
        }

        for dy in 0..u64::from(destination.height) {
            let sy = i64::from(source.y)
                + (dy * u64::from(source.height) / u64::from(destination.height)) as i64;
            for dx in 0..u64::from(destination.width) {
                let sx = i64::from(source.x)
                    + (dx * u64::from(source.width) / u64::from(destination.width)) as i64;
                if let Some(depth) = src.get(sx, sy) {
                    dst.write(
                        i64::from(destination.x) + dx as i64,
                        i64::from(destination.y) + dy as i64,
                        depth,
                        false,
                    );
                }
            }
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, descriptor: &TextureDescriptor<'_>) -> RenderResult<TextureId> {
        let extent = descriptor.extent;
        if extent.width == 0 || extent.height == 0 {
            return Err(RenderError::ResourceCreationFailed(
                "texture with zero extent".to_string(),
            ));
        }
        if let Some(data) = descriptor.data {
            let expected = extent.area() * descriptor.format.bytes_per_texel();
            if data.len() != expected {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "texture data is {} bytes, expected {expected}",
                    data.len()
                )));
            }
        }
        Ok(self.textures.insert(TextureRecord {
            extent,
            data: descriptor.data.map(<[u8]>::to_vec),
        }))
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_some() {
            for unit in &mut self.texture_units {
                if *unit == Some(texture) {
                    *unit = None;
                }
            }
        }
    }

    fn texture_extent(&self, texture: TextureId) -> Option<Extent2D> {
        self.textures.get(texture).map(|t| t.extent)
    }

    fn create_depth_renderbuffer(&mut self, extent: Extent2D) -> RenderResult<RenderbufferId> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RenderError::ResourceCreationFailed(
                "renderbuffer with zero extent".to_string(),
            ));
        }
        Ok(self.renderbuffers.insert(DepthStore::new(extent)))
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(renderbuffer);
    }

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferId> {
        Ok(self.framebuffers.insert(FramebufferRecord::default()))
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(framebuffer).is_some() {
            if self.state.draw_framebuffer == Some(framebuffer) {
                self.state.draw_framebuffer = None;
            }
            if self.state.read_framebuffer == Some(framebuffer) {
                self.state.read_framebuffer = None;
            }
        }
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        slot: u32,
        texture: TextureId,
    ) -> RenderResult<()> {
        if slot >= MAX_COLOR_ATTACHMENTS {
            return Err(RenderError::ResourceCreationFailed(format!(
                "color attachment {slot} exceeds {MAX_COLOR_ATTACHMENTS}"
            )));
        }
        if !self.textures.contains_key(texture) {
            return Err(RenderError::ResourceCreationFailed(
                "attaching a deleted texture".to_string(),
            ));
        }
        let record = self.framebuffers.get_mut(framebuffer).ok_or_else(|| {
            RenderError::ResourceCreationFailed("attaching to a deleted framebuffer".to_string())
        })?;
        record.colors.insert(slot, texture);
        Ok(())
    }

    fn attach_depth_renderbuffer(
        &mut self,
        framebuffer: FramebufferId,
        renderbuffer: RenderbufferId,
    ) -> RenderResult<()> {
        if !self.renderbuffers.contains_key(renderbuffer) {
            return Err(RenderError::ResourceCreationFailed(
                "attaching a deleted renderbuffer".to_string(),
            ));
        }
        let record = self.framebuffers.get_mut(framebuffer).ok_or_else(|| {
            RenderError::ResourceCreationFailed("attaching to a deleted framebuffer".to_string())
        })?;
        record.depth = Some(renderbuffer);
        Ok(())
    }

    fn set_draw_buffers(&mut self, framebuffer: FramebufferId, count: u32) -> RenderResult<()> {
        let record = self.framebuffers.get_mut(framebuffer).ok_or_else(|| {
            RenderError::ResourceCreationFailed("configuring a deleted framebuffer".to_string())
        })?;
        record.draw_buffers = count;
        Ok(())
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        if let Some(status) = self.forced_status {
            return status;
        }
        let Some(record) = self.framebuffers.get(framebuffer) else {
            return FramebufferStatus::Other(0);
        };
        if record.colors.is_empty() && record.depth.is_none() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut extents = Vec::with_capacity(record.colors.len() + 1);
        for texture in record.colors.values() {
            match self.textures.get(*texture) {
                Some(t) => extents.push(t.extent),
                None => return FramebufferStatus::IncompleteAttachment,
            }
        }
        if let Some(renderbuffer) = record.depth {
            match self.renderbuffers.get(renderbuffer) {
                Some(r) => extents.push(r.extent),
                None => return FramebufferStatus::IncompleteAttachment,
            }
        }
        if extents.windows(2).any(|pair| pair[0] != pair[1]) {
            return FramebufferStatus::IncompleteDimensions;
        }
        if (0..record.draw_buffers).any(|slot| !record.colors.contains_key(&slot)) {
            return FramebufferStatus::IncompleteDrawBuffer;
        }
        FramebufferStatus::Complete
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        match target {
            FramebufferTarget::Draw => self.state.draw_framebuffer = framebuffer,
            FramebufferTarget::Read => self.state.read_framebuffer = framebuffer,
            FramebufferTarget::Both => {
                self.state.draw_framebuffer = framebuffer;
                self.state.read_framebuffer = framebuffer;
            }
        }
    }

    fn blit_framebuffer(
        &mut self,
        source: Rect2D,
        destination: Rect2D,
        mask: ClearFlags,
        filter: FilterMode,
    ) {
        if mask.contains(ClearFlags::DEPTH) && filter != FilterMode::Nearest {
            log::warn!("Depth blits require nearest filtering; blit ignored");
            return;
        }
        self.blits += 1;
        if mask.contains(ClearFlags::DEPTH) {
            self.blit_depth(source, destination);
        }
    }

    fn set_viewport(&mut self, viewport: Rect2D) {
        self.state.viewport = viewport;
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        let framebuffer = self.state.draw_framebuffer;
        self.clears.push(ClearRecord { framebuffer, flags });
        if flags.contains(ClearFlags::DEPTH) {
            if let Some(store) = self.depth_store_mut(framebuffer) {
                store.clear();
            }
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_active_texture_unit(&mut self, unit: u32) {
        if unit < MAX_TEXTURE_UNITS {
            self.state.active_texture_unit = unit;
        } else {
            log::warn!("Texture unit {unit} out of range");
        }
    }

    fn bind_texture_2d(&mut self, texture: Option<TextureId>) {
        let unit = self.state.active_texture_unit as usize;
        self.texture_units[unit] = texture;
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
        Ok(self.vertex_arrays.insert(VertexArrayRecord {
            topology: descriptor.topology,
            count: descriptor.draw_count(),
        }))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(vertex_array);
    }

    fn draw(&mut self, vertex_array: VertexArrayId) {
        let Some(record) = self.vertex_arrays.get(vertex_array).copied() else {
            log::warn!("Draw with a deleted vertex array ignored");
            return;
        };
        let program = self.state.program;
        let model = self.mat4_uniform(program, "model");
        let bound_textures = self
            .texture_units
            .iter()
            .enumerate()
            .filter_map(|(unit, texture)| texture.map(|t| (unit as u32, t)))
            .collect();
        let program_label = program
            .and_then(|p| self.program_label(p))
            .map(str::to_string);

        self.draws.push(DrawRecord {
            program,
            program_label,
            framebuffer: self.state.draw_framebuffer,
            vertex_array,
            topology: record.topology,
            count: record.count,
            model,
            bound_textures,
            depth_test: self.depth_test,
        });

        self.rasterize_depth(program, model);
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RenderResult<ProgramId> {
        let vertex = glsl::parse(vertex_source).map_err(|log| RenderError::ShaderCompile {
            label: label.to_string(),
            stage: ShaderStage::Vertex,
            log,
        })?;
        let fragment = glsl::parse(fragment_source).map_err(|log| RenderError::ShaderCompile {
            label: label.to_string(),
            stage: ShaderStage::Fragment,
            log,
        })?;

        if !vertex.writes_position {
            return Err(RenderError::ShaderLink {
                label: label.to_string(),
                log: "vertex shader never writes gl_Position".to_string(),
            });
        }
        if !fragment.declares_output {
            return Err(RenderError::ShaderLink {
                label: label.to_string(),
                log: "fragment shader declares no outputs".to_string(),
            });
        }

        let uniforms = vertex.uniforms.union(&fragment.uniforms).cloned().collect();
        Ok(self.programs.insert(ProgramRecord {
            label: label.to_string(),
            uniforms,
            values: HashMap::new(),
        }))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(program).is_some() && self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.state.program = program;
    }

    fn has_uniform(&mut self, program: ProgramId, name: &str) -> bool {
        self.programs
            .get(program)
            .is_some_and(|p| p.uniforms.contains(name))
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        let active = self.state.program == Some(program);
        let known = self.has_uniform(program, name);
        if known && active {
            if let Some(record) = self.programs.get_mut(program) {
                record.values.insert(name.to_string(), value);
            }
        }
        self.uniform_writes.push(UniformWrite {
            program,
            name: name.to_string(),
            value,
            known,
            active,
        });
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

/// Just enough GLSL reading to answer "is this uniform declared"
mod glsl {
    use std::collections::{HashMap, HashSet};

    pub struct StageInfo {
        pub uniforms: HashSet<String>,
        pub writes_position: bool,
        pub declares_output: bool,
    }

    struct Declaration {
        ty: String,
        name: String,
        array_len: Option<String>,
    }

    pub fn parse(source: &str) -> Result<StageInfo, String> {
        let mut defines = HashMap::new();
        let mut body = String::with_capacity(source.len());
        for line in source.lines() {
            let line = line.split("//").next().unwrap_or_default();
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("#define") {
                let mut parts = rest.split_whitespace();
                if let Some(name) = parts.next() {
                    defines.insert(name.to_string(), parts.collect::<Vec<_>>().join(" "));
                }
            } else if !trimmed.starts_with('#') {
                body.push_str(line);
                body.push('\n');
            }
        }

        let tokens = tokenize(&body);
        if !tokens.windows(2).any(|w| w[0] == "void" && w[1] == "main") {
            return Err("0:1: error: no function with name 'main'".to_string());
        }

        let mut structs: HashMap<String, Vec<String>> = HashMap::new();
        let mut declarations = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i].as_str() {
                "struct" => i = parse_struct(&tokens, i, &mut structs),
                "uniform" => i = parse_uniform(&tokens, i, &mut declarations),
                _ => i += 1,
            }
        }

        let mut uniforms = HashSet::new();
        for decl in declarations {
            let members = structs.get(&decl.ty);
            let len = match &decl.array_len {
                None => None,
                Some(raw) => Some(resolve_len(raw, &defines)?),
            };
            match (len, members) {
                (Some(n), Some(members)) => {
                    for index in 0..n {
                        for member in members {
                            uniforms.insert(format!("{}[{index}].{member}", decl.name));
                        }
                    }
                }
                (Some(n), None) => {
                    uniforms.insert(decl.name.clone());
                    for index in 0..n {
                        uniforms.insert(format!("{}[{index}]", decl.name));
                    }
                }
                (None, Some(members)) => {
                    for member in members {
                        uniforms.insert(format!("{}.{member}", decl.name));
                    }
                }
                (None, None) => {
                    uniforms.insert(decl.name);
                }
            }
        }

        Ok(StageInfo {
            uniforms,
            writes_position: tokens.iter().any(|t| t == "gl_Position"),
            declares_output: tokens.iter().any(|t| t == "out"),
        })
    }

    fn resolve_len(raw: &str, defines: &HashMap<String, String>) -> Result<usize, String> {
        if let Ok(n) = raw.parse() {
            return Ok(n);
        }
        defines
            .get(raw)
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| format!("0:1: error: '{raw}' : undeclared identifier"))
    }

    fn tokenize(body: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        for c in body.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                current.push(c);
                continue;
            }
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if "{}[];(),=".contains(c) {
                tokens.push(c.to_string());
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }

    /// `struct Name { type member; ... };`
    fn parse_struct(tokens: &[String], start: usize, structs: &mut HashMap<String, Vec<String>>) -> usize {
        let Some(name) = tokens.get(start + 1) else {
            return start + 1;
        };
        if tokens.get(start + 2).map(String::as_str) != Some("{") {
            return start + 1;
        }
        let mut members = Vec::new();
        let mut i = start + 3;
        let mut statement: Vec<&str> = Vec::new();
        while let Some(token) = tokens.get(i) {
            match token.as_str() {
                "}" => break,
                ";" => {
                    if statement.len() >= 2 {
                        members.push(statement[1].to_string());
                    }
                    statement.clear();
                }
                other => statement.push(other),
            }
            i += 1;
        }
        structs.insert(name.clone(), members);
        i + 1
    }

    /// `uniform [precision] type name[len];`
    fn parse_uniform(tokens: &[String], start: usize, out: &mut Vec<Declaration>) -> usize {
        let mut i = start + 1;
        while matches!(
            tokens.get(i).map(String::as_str),
            Some("highp" | "mediump" | "lowp")
        ) {
            i += 1;
        }
        let (Some(ty), Some(name)) = (tokens.get(i), tokens.get(i + 1)) else {
            return i;
        };
        let array_len = (tokens.get(i + 2).map(String::as_str) == Some("["))
            .then(|| tokens.get(i + 3).cloned())
            .flatten();
        out.push(Declaration {
            ty: ty.clone(),
            name: name.clone(),
            array_len,
        });
        i + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::TextureFormat;

    const VERTEX: &str = "#version 330 core\n\
        layout (location = 0) in vec3 aPos;\n\
        uniform mat4 model;\n\
        uniform mat4 view;\n\
        uniform mat4 projection;\n\
        void main() { gl_Position = projection * view * model * vec4(aPos, 1.0); }\n";

    const FRAGMENT: &str = "#version 330 core\n\
        #define NR_POINT_LIGHTS 3\n\
        out vec4 FragColor;\n\
        struct PointLight {\n    vec3 Position;\n    vec3 Color;\n    float Constant;\n};\n\
        uniform PointLight pointLights[NR_POINT_LIGHTS];\n\
        uniform sampler2D gPosition; // unit 0\n\
        uniform vec3 offsets[2];\n\
        void main() { FragColor = vec4(1.0); }\n";

    #[test]
    fn test_uniform_reflection_expands_struct_arrays() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let program = device.create_program("test", VERTEX, FRAGMENT).unwrap();
        assert!(device.has_uniform(program, "model"));
        assert!(device.has_uniform(program, "gPosition"));
        assert!(device.has_uniform(program, "pointLights[0].Position"));
        assert!(device.has_uniform(program, "pointLights[2].Constant"));
        assert!(!device.has_uniform(program, "pointLights[3].Position"));
        assert!(device.has_uniform(program, "offsets[1]"));
        assert!(!device.has_uniform(program, "viewPos"));
    }

    #[test]
    fn test_undefined_array_bound_fails_to_compile() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let fragment = FRAGMENT.replace("#define NR_POINT_LIGHTS 3\n", "");
        let result = device.create_program("test", VERTEX, &fragment);
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile { stage: ShaderStage::Fragment, .. })
        ));
    }

    #[test]
    fn test_empty_source_fails_to_compile() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let result = device.create_program("test", "", FRAGMENT);
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile { stage: ShaderStage::Vertex, .. })
        ));
        assert_eq!(device.resource_counts().programs, 0);
    }

    #[test]
    fn test_missing_output_fails_to_link() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let result = device.create_program("test", VERTEX, "#version 330 core\nvoid main() {}\n");
        assert!(matches!(result, Err(RenderError::ShaderLink { .. })));
    }

    #[test]
    fn test_uniform_writes_require_active_program() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let program = device.create_program("test", VERTEX, FRAGMENT).unwrap();
        device.set_uniform(program, "model", UniformValue::Mat4(Mat4::identity()));
        assert_eq!(device.uniform_value(program, "model"), None);

        device.use_program(Some(program));
        device.set_uniform(program, "model", UniformValue::Mat4(Mat4::identity()));
        device.set_uniform(program, "unknown", UniformValue::Int(1));
        assert_eq!(device.uniform_value(program, "model"), Some(UniformValue::Mat4(Mat4::identity())));
        assert_eq!(device.uniform_writes().len(), 3);
        assert!(!device.uniform_writes()[2].known);
    }

    #[test]
    fn test_framebuffer_status_checks_dimensions() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let framebuffer = device.create_framebuffer().unwrap();
        assert_eq!(device.framebuffer_status(framebuffer), FramebufferStatus::MissingAttachment);

        let color = device
            .create_texture(&TextureDescriptor::render_target(Extent2D::new(8, 8), TextureFormat::Rgba8))
            .unwrap();
        let depth = device.create_depth_renderbuffer(Extent2D::new(4, 4)).unwrap();
        device.attach_color_texture(framebuffer, 0, color).unwrap();
        device.attach_depth_renderbuffer(framebuffer, depth).unwrap();
        device.set_draw_buffers(framebuffer, 1).unwrap();
        assert_eq!(device.framebuffer_status(framebuffer), FramebufferStatus::IncompleteDimensions);
    }

    #[test]
    fn test_deleting_bound_framebuffer_rebinds_default() {
        let mut device = HeadlessDevice::new(Extent2D::new(8, 8));
        let framebuffer = device.create_framebuffer().unwrap();
        device.bind_framebuffer(FramebufferTarget::Both, Some(framebuffer));
        device.delete_framebuffer(framebuffer);
        assert!(device.binding_state().is_restored());
    }

    #[test]
    fn test_depth_blit_copies_with_nearest_scaling() {
        let mut device = HeadlessDevice::new(Extent2D::new(4, 4));
        let framebuffer = device.create_framebuffer().unwrap();
        let depth = device.create_depth_renderbuffer(Extent2D::new(2, 2)).unwrap();
        device.attach_depth_renderbuffer(framebuffer, depth).unwrap();
        device.renderbuffers[depth].values = vec![0.1, 0.2, 0.3, 0.4];

        device.bind_framebuffer(FramebufferTarget::Read, Some(framebuffer));
        device.bind_framebuffer(FramebufferTarget::Draw, None);
        device.blit_framebuffer(
            Rect2D::from_extent(Extent2D::new(2, 2)),
            Rect2D::from_extent(Extent2D::new(4, 4)),
            ClearFlags::DEPTH,
            FilterMode::Nearest,
        );

        let d = device.default_depth();
        assert_eq!(d[0], 0.1);
        assert_eq!(d[1], 0.1);
        assert_eq!(d[3], 0.2);
        assert_eq!(d[15], 0.4);
        assert_eq!(device.blit_count(), 1);
    }

    #[test]
    fn test_quad_draw_fills_viewport_depth() {
        let mut device = HeadlessDevice::new(Extent2D::new(4, 4));
        let program = device.create_program("quad", VERTEX, FRAGMENT).unwrap();
        let vertices = [0.0_f32; 20];
        let quad = device
            .create_vertex_array(&VertexArrayDescriptor {
                vertices: &vertices,
                indices: None,
                attribute_components: &[3, 2],
                topology: PrimitiveTopology::TriangleStrip,
            })
            .unwrap();
        device.set_depth_test(true);
        device.use_program(Some(program));
        device.draw(quad);
        assert!(device.default_depth().iter().all(|&d| (d - QUAD_DEPTH).abs() < f32::EPSILON));
        assert_eq!(device.draws()[0].count, 4);
    }
}
