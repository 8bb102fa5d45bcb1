//! Whole-frame tests against the headless device

use approx::assert_relative_eq;

use super::api::{FramebufferStatus, GraphicsDevice, ResourceCounts, UniformValue};
use super::backends::HeadlessDevice;
use super::deferred::GBufferAttachment;
use super::frame::{FrameMatrices, ShaderSources};
use super::passes::{forward, geometry, light_markers, lighting};
use super::primitives::{ScreenQuad, UnitCube};
use super::*;
use crate::config::DemoConfig;
use crate::foundation::math::Vec3;
use crate::input::{RenderMode, RenderToggles};
use crate::scene::{InstanceAnimation, ObjectInstances};

/// Stand-in mesh: one cube per draw
struct CubeMesh {
    cube: UnitCube,
}

impl Drawable for CubeMesh {
    fn draw(&self, device: &mut dyn GraphicsDevice, _shader: &Shader) {
        self.cube.draw(device);
    }
}

struct Harness {
    device: HeadlessDevice,
    renderer: FrameRenderer,
    mesh: CubeMesh,
    instances: ObjectInstances,
    camera: Camera,
}

impl Harness {
    fn new(config: &DemoConfig) -> Self {
        Self::with_framebuffer(config, config.window.extent())
    }

    /// Default framebuffer of `framebuffer` pixels, as on a scaled display
    fn with_framebuffer(config: &DemoConfig, framebuffer: Extent2D) -> Self {
        let mut device = HeadlessDevice::new(framebuffer);
        let renderer =
            FrameRenderer::new(&mut device, config, framebuffer, &ShaderSources::builtin()).unwrap();
        let mesh = CubeMesh {
            cube: UnitCube::new(&mut device).unwrap(),
        };
        Self {
            device,
            renderer,
            mesh,
            instances: ObjectInstances::from_settings(&config.scene),
            camera: Camera::from_settings(&config.camera),
        }
    }

    fn render(&mut self, mode: RenderMode, animation: InstanceAnimation) -> FrameStats {
        let frame = FrameContext {
            mode,
            animation,
            camera: &self.camera,
            model: &self.mesh,
            instances: &self.instances,
        };
        self.renderer.render_frame(&mut self.device, &frame)
    }

    fn draws_labelled(&self, label: &str) -> Vec<&backends::headless::DrawRecord> {
        self.device
            .draws()
            .iter()
            .filter(|d| d.program_label.as_deref() == Some(label))
            .collect()
    }

    fn matrices(&self, config: &DemoConfig) -> FrameMatrices {
        FrameMatrices::new(
            &self.camera,
            config.window.extent().aspect_ratio(),
            config.camera.near,
            config.camera.far,
        )
    }
}

fn config_without_markers() -> DemoConfig {
    let mut config = DemoConfig::default();
    config.scene.show_light_markers = false;
    config
}

#[test]
fn test_geometry_pass_draws_every_instance_with_exact_transform() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    let animation = InstanceAnimation::Rotating { elapsed_seconds: 2.5 };

    let stats = harness.render(RenderMode::Deferred, animation);
    assert_eq!(stats.instance_draws, 9);
    assert_eq!(stats.lighting_draws, 1);
    assert_eq!(stats.marker_draws, 0);

    let gbuffer = harness.renderer.targets().framebuffer();
    let draws = harness.draws_labelled("geometry_pass");
    assert_eq!(draws.len(), 9);
    for (i, draw) in draws.iter().enumerate() {
        assert_eq!(draw.framebuffer, Some(gbuffer));
        let expected = harness.instances.model_matrix(i, animation).unwrap();
        assert_relative_eq!(draw.model.unwrap(), expected, epsilon = 1e-6);
    }
}

#[test]
fn test_static_instances_sit_at_grid_positions() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);

    let translations: Vec<Vec3> = harness
        .draws_labelled("geometry_pass")
        .iter()
        .map(|d| {
            let m = d.model.unwrap();
            Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
        })
        .collect();
    let expected: Vec<Vec3> = [-8.0, 0.0, 8.0]
        .iter()
        .flat_map(|&z| [-5.0, 0.0, 5.0].map(|x| Vec3::new(x, 0.0, z)))
        .collect();
    assert_eq!(translations, expected);
}

#[test]
fn test_lighting_pass_writes_five_uniforms_per_light() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    harness.device.reset_logs();
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);

    let program = harness.renderer.shaders().lighting.program();
    let light_writes: Vec<_> = harness
        .device
        .uniform_writes()
        .iter()
        .filter(|w| w.program == program && w.name.starts_with("pointLights["))
        .collect();
    assert_eq!(light_writes.len(), 5 * 14);
    assert!(light_writes.iter().all(|w| w.known && w.active));

    for (i, light) in harness.renderer.lights().lights().iter().enumerate() {
        assert_eq!(
            harness.device.uniform_value(program, &format!("pointLights[{i}].Position")),
            Some(UniformValue::Vec3(light.position))
        );
        assert_eq!(
            harness.device.uniform_value(program, &format!("pointLights[{i}].Quadratic")),
            Some(UniformValue::Float(1.2))
        );
    }

    let quad = harness.draws_labelled("lighting_pass");
    assert_eq!(quad.len(), 1);
    assert_eq!(quad[0].framebuffer, None);
    assert_eq!(quad[0].count, 4);
}

#[test]
fn test_lighting_pass_reads_gbuffer_in_attachment_order() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);

    let targets = harness.renderer.targets();
    let expected: Vec<_> = (0u32..)
        .zip(GBufferAttachment::ALL)
        .map(|(unit, attachment)| (unit, targets.texture(attachment)))
        .collect();
    let quad = harness.draws_labelled("lighting_pass");
    assert_eq!(quad[0].bound_textures, expected);

    let program = harness.renderer.shaders().lighting.program();
    for attachment in GBufferAttachment::ALL {
        assert_eq!(
            harness.device.uniform_value(program, attachment.sampler_name()),
            Some(UniformValue::Int(attachment.slot() as i32))
        );
    }
}

#[test]
fn test_depth_blit_copies_gbuffer_depth_to_default_framebuffer() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);

    let depth = harness.renderer.targets().depth_renderbuffer();
    let gbuffer_depth = harness.device.renderbuffer_depth(depth).unwrap().to_vec();
    assert!(gbuffer_depth.iter().any(|&d| d < 1.0));
    assert_eq!(harness.device.default_depth(), gbuffer_depth.as_slice());
    assert_eq!(harness.device.blit_count(), 1);
}

#[test]
fn test_gbuffer_matches_scaled_framebuffer() {
    let config = config_without_markers();
    let framebuffer = Extent2D::new(2560, 1440);
    assert_ne!(config.window.extent(), framebuffer);
    let mut harness = Harness::with_framebuffer(&config, framebuffer);
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);

    let depth = harness.renderer.targets().depth_renderbuffer();
    let gbuffer_depth = harness.device.renderbuffer_depth(depth).unwrap().to_vec();
    assert_eq!(gbuffer_depth.len(), 2560 * 1440);
    assert_eq!(harness.device.default_depth(), gbuffer_depth.as_slice());
    assert_eq!(harness.device.binding_state().viewport.extent(), framebuffer);
}

#[test]
fn test_startup_enables_depth_test_and_scene_clear_color() {
    let mut config = config_without_markers();
    config.scene.clear_color = [0.1, 0.2, 0.3, 1.0];
    let mut harness = Harness::new(&config);
    assert!(harness.device.depth_test_enabled());
    assert_eq!(harness.device.clear_color(), [0.1, 0.2, 0.3, 1.0]);

    harness.render(RenderMode::Deferred, InstanceAnimation::Static);
    assert!(harness.device.depth_test_enabled());
    assert_eq!(harness.device.clear_color(), [0.1, 0.2, 0.3, 1.0]);
}

#[test]
fn test_light_markers_follow_the_depth_blit() {
    let config = DemoConfig::default();
    let mut harness = Harness::new(&config);
    let stats = harness.render(RenderMode::Deferred, InstanceAnimation::Static);
    assert_eq!(stats.marker_draws, 14);

    let markers = harness.draws_labelled("light_box");
    assert_eq!(markers.len(), 14);
    assert!(markers.iter().all(|d| d.framebuffer.is_none() && d.depth_test));

    let program = harness.renderer.shaders().light_box.program();
    let last = harness.renderer.lights().lights()[13];
    assert_eq!(
        harness.device.uniform_value(program, "lightColor"),
        Some(UniformValue::Vec3(last.color))
    );
}

#[test]
fn test_forward_mode_never_touches_gbuffer() {
    let config = DemoConfig::default();
    let mut harness = Harness::new(&config);
    let stats = harness.render(RenderMode::Forward, InstanceAnimation::Static);

    assert_eq!(stats.instance_draws, 9);
    assert_eq!(stats.lighting_draws, 0);
    assert_eq!(harness.draws_labelled("base_shader").len(), 9);
    assert!(harness.draws_labelled("geometry_pass").is_empty());
    assert!(harness.draws_labelled("lighting_pass").is_empty());
    assert!(harness.device.draws().iter().all(|d| d.framebuffer.is_none()));
    assert_eq!(harness.device.blit_count(), 0);

    let program = harness.renderer.shaders().forward.program();
    let writes = harness
        .device
        .uniform_writes()
        .iter()
        .filter(|w| w.program == program && w.name.starts_with("pointLights["))
        .count();
    assert_eq!(writes, 5 * 14);
}

#[test]
fn test_every_pass_restores_bindings() {
    let config = DemoConfig::default();
    let mut harness = Harness::new(&config);
    let matrices = harness.matrices(&config);
    let Harness {
        device,
        renderer,
        mesh,
        instances,
        ..
    } = &mut harness;
    let shaders = renderer.shaders();
    let animation = InstanceAnimation::Static;

    geometry::run(device, renderer.targets(), mesh, instances, animation, &shaders.geometry, &matrices);
    assert!(device.binding_state().is_restored());

    let quad = ScreenQuad::new(device).unwrap();
    lighting::run(
        device,
        renderer.targets(),
        renderer.lights(),
        &shaders.lighting,
        &quad,
        &matrices.viewer_position,
    );
    assert!(device.binding_state().is_restored());
    quad.destroy(device);

    renderer.targets().blit_depth_to(device, None);
    assert!(device.binding_state().is_restored());

    forward::run(device, mesh, instances, animation, renderer.lights(), &shaders.forward, &matrices);
    assert!(device.binding_state().is_restored());

    let cube = UnitCube::new(device).unwrap();
    light_markers::run(device, renderer.lights(), &shaders.light_box, &cube, &matrices);
    assert!(device.binding_state().is_restored());
    cube.destroy(device);
}

#[test]
fn test_geometry_pass_restores_window_viewport() {
    let config = DemoConfig::default();
    let mut harness = Harness::new(&config);
    let resized = Extent2D::new(640, 360);
    harness.renderer.set_viewport(&mut harness.device, resized);

    harness.render(RenderMode::Deferred, InstanceAnimation::Static);
    let state = harness.device.binding_state();
    assert_eq!(state.viewport.extent(), resized);
    assert!(state.is_restored());
}

#[test]
fn test_mode_switches_do_not_leak_resources() {
    let config = DemoConfig::default();
    let mut harness = Harness::new(&config);
    let before = harness.device.resource_counts();

    harness.render(RenderMode::Deferred, InstanceAnimation::Static);
    harness.render(RenderMode::Forward, InstanceAnimation::Static);
    harness.render(RenderMode::Deferred, InstanceAnimation::Static);
    assert_eq!(harness.device.resource_counts(), before);

    let Harness {
        mut device,
        renderer,
        mesh,
        ..
    } = harness;
    mesh.cube.destroy(&mut device);
    renderer.destroy(&mut device);
    assert_eq!(device.resource_counts(), ResourceCounts::default());
}

#[test]
fn test_incomplete_gbuffer_aborts_before_any_draw() {
    let config = DemoConfig::default();
    let mut device = HeadlessDevice::new(config.window.extent());
    device.force_framebuffer_status(Some(FramebufferStatus::Unsupported));

    let result = FrameRenderer::new(&mut device, &config, config.window.extent(), &ShaderSources::builtin());
    assert!(matches!(result, Err(RenderError::FramebufferIncomplete(_))));
    assert!(device.draws().is_empty());
    assert_eq!(device.resource_counts(), ResourceCounts::default());
}

#[test]
fn test_shader_light_capacity_mismatch_is_fatal() {
    let config = DemoConfig::default();
    let mut device = HeadlessDevice::new(config.window.extent());
    let mut sources = ShaderSources::builtin();
    sources.lighting.fragment = sources
        .lighting
        .fragment
        .replace("pointLights[NR_POINT_LIGHTS]", "pointLights[4]");

    let result = FrameRenderer::new(&mut device, &config, config.window.extent(), &sources);
    assert!(matches!(result, Err(RenderError::Configuration(_))));
    assert_eq!(device.resource_counts(), ResourceCounts::default());
}

#[test]
fn test_broken_shader_is_fatal_and_releases_gbuffer() {
    let config = DemoConfig::default();
    let mut device = HeadlessDevice::new(config.window.extent());
    let mut sources = ShaderSources::builtin();
    sources.geometry.vertex = sources.geometry.vertex.replace("gl_Position", "vec4 unused");

    let result = FrameRenderer::new(&mut device, &config, config.window.extent(), &sources);
    assert!(matches!(result, Err(RenderError::ShaderLink { .. })));
    assert_eq!(device.resource_counts(), ResourceCounts::default());
}

#[test]
fn test_identical_runs_produce_identical_uniform_streams() {
    let config = DemoConfig::default();
    let mut first = Harness::new(&config);
    let mut second = Harness::new(&config);
    first.device.reset_logs();
    second.device.reset_logs();

    let animation = InstanceAnimation::Rotating { elapsed_seconds: 1.0 };
    first.render(RenderMode::Deferred, animation);
    second.render(RenderMode::Deferred, animation);

    let stream = |h: &Harness| -> Vec<(String, UniformValue)> {
        h.device
            .uniform_writes()
            .iter()
            .map(|w| (w.name.clone(), w.value))
            .collect()
    };
    assert_eq!(first.renderer.lights(), second.renderer.lights());
    assert_eq!(stream(&first), stream(&second));
}

#[test]
fn test_held_toggle_key_switches_pipeline_once() {
    let config = config_without_markers();
    let mut harness = Harness::new(&config);
    let mut toggles = RenderToggles::new(RenderMode::Deferred, false);

    let mut modes = Vec::new();
    for mode_key_down in [false, true, true, true, false, true] {
        toggles.update_keys(mode_key_down, false);
        harness.device.reset_logs();
        let stats = harness.render(toggles.mode(), InstanceAnimation::Static);
        assert_eq!(stats.mode, toggles.mode());
        modes.push(!harness.draws_labelled("geometry_pass").is_empty());
    }

    assert_eq!(modes, [true, false, false, false, false, true]);
}
