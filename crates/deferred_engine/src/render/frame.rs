//! # Frame Orchestration
//!
//! [`FrameRenderer`] owns every GPU object that lives for the whole run (the
//! G-buffer, the four shader programs, the light set and the quad and cube
//! buffers) and sequences the passes for one frame:
//!
//! - **Forward**: clear, forward pass, light markers
//! - **Deferred**: clear, geometry pass, lighting pass, depth blit into the
//!   default framebuffer, light markers
//!
//! The markers are drawn after the depth blit so they are hidden behind
//! geometry exactly as if the scene had been drawn forward.

use crate::config::{DemoConfig, ShaderPaths, ShaderSettings};
use crate::foundation::math::{perspective, Mat4, Vec3};
use crate::input::RenderMode;
use crate::render::api::{ClearFlags, Drawable, Extent2D, FramebufferTarget, GraphicsDevice, Rect2D};
use crate::render::deferred::RenderTargetSet;
use crate::render::passes::{forward, geometry, light_markers, lighting};
use crate::render::primitives::{ScreenQuad, UnitCube, ViewProvider};
use crate::render::shader::{read_source, Shader, ShaderDefine};
use crate::render::systems::lighting::LightSet;
use crate::render::{RenderError, RenderResult};
use crate::scene::{InstanceAnimation, ObjectInstances};

/// Preprocessor define carrying the light count into GLSL
pub const LIGHT_COUNT_DEFINE: &str = "NR_POINT_LIGHTS";

/// Camera matrices computed once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    /// View-to-clip transform
    pub projection: Mat4,
    /// World-to-view transform
    pub view: Mat4,
    /// Eye position in world space
    pub viewer_position: Vec3,
}

impl FrameMatrices {
    /// Projection from the camera zoom and `aspect`, view from the camera pose
    pub fn new(camera: &dyn ViewProvider, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: perspective(camera.field_of_view_degrees(), aspect, near, far),
            view: camera.view_matrix(),
            viewer_position: camera.position(),
        }
    }

    /// Upload `projection` and `view` to the active shader
    pub fn upload(&self, device: &mut dyn GraphicsDevice, shader: &Shader) {
        shader.set_mat4(device, "projection", &self.projection);
        shader.set_mat4(device, "view", &self.view);
    }
}

/// Vertex and fragment source text of one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Vertex stage
    pub vertex: String,
    /// Fragment stage
    pub fragment: String,
}

impl ProgramSource {
    fn read(paths: &ShaderPaths) -> RenderResult<Self> {
        Ok(Self {
            vertex: read_source(&paths.vertex)?,
            fragment: read_source(&paths.fragment)?,
        })
    }

    fn builtin(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
        }
    }
}

/// Source text for the four programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Forward shading
    pub forward: ProgramSource,
    /// G-buffer fill
    pub geometry: ProgramSource,
    /// G-buffer resolve
    pub lighting: ProgramSource,
    /// Light marker cubes
    pub light_box: ProgramSource,
}

impl ShaderSources {
    /// Read every file named in `settings`
    ///
    /// The first unreadable file aborts with [`RenderError::ShaderSource`].
    pub fn read(settings: &ShaderSettings) -> RenderResult<Self> {
        Ok(Self {
            forward: ProgramSource::read(&settings.forward)?,
            geometry: ProgramSource::read(&settings.geometry)?,
            lighting: ProgramSource::read(&settings.lighting)?,
            light_box: ProgramSource::read(&settings.light_box)?,
        })
    }

    /// Copies of the shipped shaders compiled into the binary
    pub fn builtin() -> Self {
        Self {
            forward: ProgramSource::builtin(
                include_str!("../../../../resources/shaders/base_shader.vs"),
                include_str!("../../../../resources/shaders/base_shader.fs"),
            ),
            geometry: ProgramSource::builtin(
                include_str!("../../../../resources/shaders/geometry_pass.vs"),
                include_str!("../../../../resources/shaders/geometry_pass.fs"),
            ),
            lighting: ProgramSource::builtin(
                include_str!("../../../../resources/shaders/lighting_pass.vs"),
                include_str!("../../../../resources/shaders/lighting_pass.fs"),
            ),
            light_box: ProgramSource::builtin(
                include_str!("../../../../resources/shaders/light_box.vs"),
                include_str!("../../../../resources/shaders/light_box.fs"),
            ),
        }
    }
}

/// The four linked programs
#[derive(Debug)]
pub struct ShaderSet {
    /// Forward shading
    pub forward: Shader,
    /// G-buffer fill
    pub geometry: Shader,
    /// G-buffer resolve
    pub lighting: Shader,
    /// Light marker cubes
    pub light_box: Shader,
}

impl ShaderSet {
    /// Compile every program with `NR_POINT_LIGHTS` set to `light_count`
    ///
    /// Programs linked before a failure are released.
    pub fn compile(
        device: &mut dyn GraphicsDevice,
        sources: &ShaderSources,
        light_count: usize,
    ) -> RenderResult<Self> {
        let defines = [ShaderDefine::new(LIGHT_COUNT_DEFINE, light_count)];
        let mut linked: Vec<Shader> = Vec::with_capacity(4);
        let programs = [
            ("base_shader", &sources.forward),
            ("geometry_pass", &sources.geometry),
            ("lighting_pass", &sources.lighting),
            ("light_box", &sources.light_box),
        ];

        for (label, source) in programs {
            match Shader::from_sources(device, label, &source.vertex, &source.fragment, &defines) {
                Ok(shader) => linked.push(shader),
                Err(err) => {
                    for shader in linked {
                        shader.destroy(device);
                    }
                    return Err(err);
                }
            }
        }

        let mut linked = linked.into_iter();
        match (linked.next(), linked.next(), linked.next(), linked.next()) {
            (Some(forward), Some(geometry), Some(lighting), Some(light_box)) => Ok(Self {
                forward,
                geometry,
                lighting,
                light_box,
            }),
            _ => Err(RenderError::ResourceCreationFailed(
                "shader set incomplete".to_string(),
            )),
        }
    }

    /// Release all four programs
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.forward.destroy(device);
        self.geometry.destroy(device);
        self.lighting.destroy(device);
        self.light_box.destroy(device);
    }
}

/// Per-frame inputs
pub struct FrameContext<'a> {
    /// Which pipeline renders this frame
    pub mode: RenderMode,
    /// Instance animation state
    pub animation: InstanceAnimation,
    /// Viewer
    pub camera: &'a dyn ViewProvider,
    /// Mesh drawn at every instance
    pub model: &'a dyn Drawable,
    /// Instance transforms
    pub instances: &'a ObjectInstances,
}

/// What one frame submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Pipeline that rendered the frame
    pub mode: RenderMode,
    /// Instances drawn by the forward or geometry pass
    pub instance_draws: usize,
    /// Full-screen lighting quads drawn
    pub lighting_draws: usize,
    /// Light marker cubes drawn
    pub marker_draws: usize,
}

/// Owns the long-lived GPU objects and renders frames
pub struct FrameRenderer {
    targets: RenderTargetSet,
    lights: LightSet,
    shaders: ShaderSet,
    quad: ScreenQuad,
    cube: UnitCube,
    aspect: f32,
    near: f32,
    far: f32,
    window_viewport: Rect2D,
    clear_color: [f32; 4],
    show_light_markers: bool,
}

impl FrameRenderer {
    /// Build every pipeline object for `config`
    ///
    /// The G-buffer matches `framebuffer`, the default framebuffer's size in
    /// pixels, so the depth blit covers it exactly. The projection aspect
    /// comes from the configured window size.
    ///
    /// Fails without drawing anything if the G-buffer is incomplete, a shader
    /// fails to build, or the shaders declare a different light count.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        config: &DemoConfig,
        framebuffer: Extent2D,
        sources: &ShaderSources,
    ) -> RenderResult<Self> {
        let scene = &config.scene;
        let lights = LightSet::generate(scene.light_count, scene.light_seed);

        let targets = RenderTargetSet::initialize(device, framebuffer.width, framebuffer.height)?;

        let shaders = match ShaderSet::compile(device, sources, lights.len()) {
            Ok(shaders) => shaders,
            Err(err) => {
                targets.destroy(device);
                return Err(err);
            }
        };

        let capacity = lights
            .validate_shader_capacity(device, &shaders.forward)
            .and_then(|()| lights.validate_shader_capacity(device, &shaders.lighting));
        if let Err(err) = capacity {
            shaders.destroy(device);
            targets.destroy(device);
            return Err(err);
        }

        let buffers = ScreenQuad::new(device).and_then(|quad| match UnitCube::new(device) {
            Ok(cube) => Ok((quad, cube)),
            Err(err) => {
                quad.destroy(device);
                Err(err)
            }
        });
        let (quad, cube) = match buffers {
            Ok(buffers) => buffers,
            Err(err) => {
                shaders.destroy(device);
                targets.destroy(device);
                return Err(err);
            }
        };

        device.set_depth_test(true);
        device.set_clear_color(scene.clear_color);
        device.set_viewport(Rect2D::from_extent(framebuffer));
        lighting::bind_samplers(device, &shaders.lighting);
        device.use_program(None);

        log::info!(
            "Frame renderer ready: {}x{} G-buffer, {} lights",
            framebuffer.width,
            framebuffer.height,
            lights.len()
        );

        Ok(Self {
            targets,
            lights,
            shaders,
            quad,
            cube,
            aspect: config.window.extent().aspect_ratio(),
            near: config.camera.near,
            far: config.camera.far,
            window_viewport: Rect2D::from_extent(framebuffer),
            clear_color: scene.clear_color,
            show_light_markers: scene.show_light_markers,
        })
    }

    /// The G-buffer
    pub const fn targets(&self) -> &RenderTargetSet {
        &self.targets
    }

    /// The light set
    pub const fn lights(&self) -> &LightSet {
        &self.lights
    }

    /// The compiled programs
    pub const fn shaders(&self) -> &ShaderSet {
        &self.shaders
    }

    /// Follow a framebuffer resize
    ///
    /// Only the viewport changes. The G-buffer and the projection aspect keep
    /// their startup values.
    pub fn set_viewport(&mut self, device: &mut dyn GraphicsDevice, extent: Extent2D) {
        self.window_viewport = Rect2D::from_extent(extent);
        device.set_viewport(self.window_viewport);
    }

    /// Render one frame into the default framebuffer
    pub fn render_frame(&self, device: &mut dyn GraphicsDevice, frame: &FrameContext<'_>) -> FrameStats {
        let matrices = FrameMatrices::new(frame.camera, self.aspect, self.near, self.far);

        device.bind_framebuffer(FramebufferTarget::Both, None);
        device.set_clear_color(self.clear_color);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

        let mut stats = FrameStats {
            mode: frame.mode,
            instance_draws: 0,
            lighting_draws: 0,
            marker_draws: 0,
        };

        match frame.mode {
            RenderMode::Forward => {
                stats.instance_draws = forward::run(
                    device,
                    frame.model,
                    frame.instances,
                    frame.animation,
                    &self.lights,
                    &self.shaders.forward,
                    &matrices,
                );
            }
            RenderMode::Deferred => {
                stats.instance_draws = geometry::run(
                    device,
                    &self.targets,
                    frame.model,
                    frame.instances,
                    frame.animation,
                    &self.shaders.geometry,
                    &matrices,
                );
                lighting::run(
                    device,
                    &self.targets,
                    &self.lights,
                    &self.shaders.lighting,
                    &self.quad,
                    &matrices.viewer_position,
                );
                stats.lighting_draws = 1;
                self.targets.blit_depth_to(device, None);
                device.set_viewport(self.window_viewport);
            }
        }

        if self.show_light_markers {
            stats.marker_draws =
                light_markers::run(device, &self.lights, &self.shaders.light_box, &self.cube, &matrices);
        }

        stats
    }

    /// Release every GPU object
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        self.quad.destroy(device);
        self.cube.destroy(device);
        self.shaders.destroy(device);
        self.targets.destroy(device);
        log::debug!("Frame renderer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::HeadlessDevice;
    use crate::render::primitives::Camera;

    #[test]
    fn test_builtin_shaders_compile_with_light_count() {
        let mut device = HeadlessDevice::new(Extent2D::new(64, 64));
        let shaders = ShaderSet::compile(&mut device, &ShaderSources::builtin(), 14).unwrap();

        assert!(shaders.forward.has_uniform(&mut device, "pointLights[13].Quadratic"));
        assert!(!shaders.forward.has_uniform(&mut device, "pointLights[14].Position"));
        assert!(shaders.lighting.has_uniform(&mut device, "gEmission"));
        assert!(shaders.light_box.has_uniform(&mut device, "lightColor"));
        assert_eq!(device.resource_counts().programs, 4);

        shaders.destroy(&mut device);
        assert_eq!(device.resource_counts().programs, 0);
    }

    #[test]
    fn test_failed_program_releases_earlier_programs() {
        let mut device = HeadlessDevice::new(Extent2D::new(64, 64));
        let mut sources = ShaderSources::builtin();
        sources.lighting.fragment = "#version 330 core\nout vec4 FragColor;\n".to_string();

        let result = ShaderSet::compile(&mut device, &sources, 14);
        assert!(matches!(result, Err(RenderError::ShaderCompile { .. })));
        assert_eq!(device.resource_counts().programs, 0);
    }

    #[test]
    fn test_missing_shader_file_is_reported() {
        let settings = ShaderSettings {
            forward: ShaderPaths::named("does/not/exist", "base_shader"),
            ..ShaderSettings::default()
        };
        match ShaderSources::read(&settings) {
            Err(RenderError::ShaderSource { path, .. }) => assert_eq!(path, "does/not/exist/base_shader.vs"),
            other => panic!("expected a shader source error, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_matrices_follow_camera() {
        let camera = Camera::default();
        let matrices = FrameMatrices::new(&camera, 16.0 / 9.0, 0.1, 100.0);
        assert_eq!(matrices.view, camera.view_matrix());
        assert_eq!(matrices.viewer_position, camera.position());
        assert_eq!(matrices.projection, perspective(45.0, 16.0 / 9.0, 0.1, 100.0));
    }
}
