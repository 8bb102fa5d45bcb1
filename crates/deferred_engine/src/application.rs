//! Demo application: window, input and the frame loop
//!
//! [`DeferredDemo`] drives the interactive run against an OpenGL context;
//! [`run_headless`] pushes the same frame pipeline through the headless
//! device for machines without a GPU.

use thiserror::Error;

use crate::assets::{AssetError, Model};
use crate::config::{ConfigError, DemoConfig};
use crate::foundation::time::FrameTimer;
use crate::input::{InputManager, KeyCode, RenderMode, RenderToggles};
use crate::render::api::{Extent2D, GraphicsDevice, ResourceCounts};
use crate::render::backends::{GlDevice, HeadlessDevice};
use crate::render::frame::ShaderSources;
use crate::render::{
    Camera, CameraMovement, FrameContext, FrameRenderer, RenderError, Window, WindowError,
};
use crate::scene::{InstanceAnimation, ObjectInstances};

/// Fatal startup errors
///
/// Nothing fails once the frame loop is running.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Window or GL context creation failed
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Render pipeline construction failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The model or one of its textures failed to load
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

/// Key bindings for camera movement
const MOVEMENT_KEYS: [(KeyCode, CameraMovement); 6] = [
    (KeyCode::W, CameraMovement::Forward),
    (KeyCode::S, CameraMovement::Backward),
    (KeyCode::A, CameraMovement::Left),
    (KeyCode::D, CameraMovement::Right),
    (KeyCode::E, CameraMovement::Up),
    (KeyCode::Q, CameraMovement::Down),
];

const fn animation(rotating: bool, elapsed_seconds: f32) -> InstanceAnimation {
    if rotating {
        InstanceAnimation::Rotating { elapsed_seconds }
    } else {
        InstanceAnimation::Static
    }
}

/// Build the renderer and load the model, releasing the renderer if the model fails
fn build_pipeline(
    device: &mut dyn GraphicsDevice,
    config: &DemoConfig,
    framebuffer: Extent2D,
) -> Result<(FrameRenderer, Model), AppError> {
    let sources = ShaderSources::read(&config.shaders)?;
    let renderer = FrameRenderer::new(device, config, framebuffer, &sources)?;
    match Model::load(device, &config.assets.model_path) {
        Ok(model) => Ok((renderer, model)),
        Err(err) => {
            renderer.destroy(device);
            Err(err.into())
        }
    }
}

/// Interactive deferred/forward shading demo
pub struct DeferredDemo {
    window: Window,
    device: GlDevice,
    renderer: FrameRenderer,
    model: Model,
    instances: ObjectInstances,
    camera: Camera,
    input: InputManager,
    toggles: RenderToggles,
    timer: FrameTimer,
}

impl DeferredDemo {
    /// Open the window and build every GPU resource
    pub fn new(config: &DemoConfig) -> Result<Self, AppError> {
        config.validate()?;

        let mut window = Window::new(&config.window.title, config.window.extent())?;
        let mut device = GlDevice::from_window(&mut window)?;
        // Scaled displays report more pixels than the requested window size
        let (renderer, model) = build_pipeline(&mut device, config, window.framebuffer_extent())?;

        let scene = &config.scene;
        let mode = if scene.start_deferred {
            RenderMode::Deferred
        } else {
            RenderMode::Forward
        };

        log::info!("Demo ready: {mode:?} mode, rotation {}", if scene.start_rotating { "on" } else { "off" });
        Ok(Self {
            window,
            device,
            renderer,
            model,
            instances: ObjectInstances::from_settings(scene),
            camera: Camera::from_settings(&config.camera),
            input: InputManager::new(),
            toggles: RenderToggles::new(mode, scene.start_rotating),
            timer: FrameTimer::new(),
        })
    }

    /// Run until the window closes, then release GPU resources
    pub fn run(mut self) {
        while !self.window.should_close() {
            self.frame();
        }

        log::info!(
            "Shutting down after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        self.model.destroy(&mut self.device);
        self.renderer.destroy(&mut self.device);
    }

    fn frame(&mut self) {
        let delta_time = self.timer.tick(self.window.time());
        for event in self.window.poll_events() {
            self.input.handle_event(&event);
        }
        self.process_input(delta_time);

        let frame = FrameContext {
            mode: self.toggles.mode(),
            animation: animation(self.toggles.rotating(), self.timer.total_time()),
            camera: &self.camera,
            model: &self.model,
            instances: &self.instances,
        };
        let stats = self.renderer.render_frame(&mut self.device, &frame);
        log::trace!("Frame {}: {stats:?}", self.timer.frame_count());

        self.window.swap_buffers();
    }

    fn process_input(&mut self, delta_time: f32) {
        if self.input.close_requested() || self.input.is_key_down(KeyCode::Escape) {
            self.window.set_should_close(true);
        }

        for (key, movement) in MOVEMENT_KEYS {
            if self.input.is_key_down(key) {
                self.camera.process_keyboard(movement, delta_time);
            }
        }

        let (x_offset, y_offset) = self.input.take_mouse_delta();
        if x_offset != 0.0 || y_offset != 0.0 {
            self.camera.process_mouse_movement(x_offset, y_offset);
        }
        let scroll = self.input.take_scroll();
        if scroll != 0.0 {
            self.camera.process_mouse_scroll(scroll);
        }

        self.toggles.update(&self.input);

        if let Some(extent) = self.input.take_resize() {
            self.renderer.set_viewport(&mut self.device, extent);
        }
    }
}

/// Summary of a headless run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessReport {
    /// Frames rendered
    pub frames: u32,
    /// Frames rendered by the deferred pipeline
    pub deferred_frames: u32,
    /// Frames rendered by the forward pipeline
    pub forward_frames: u32,
    /// Draw calls recorded by the device
    pub draw_calls: usize,
    /// Objects still alive after shutdown
    pub leaked: ResourceCounts,
}

/// Simulated frame interval for headless runs
const HEADLESS_FRAME_SECONDS: f64 = 1.0 / 60.0;

/// Render `frames` frames on the headless device
///
/// The mode key is pressed halfway through so both pipelines run.
pub fn run_headless(config: &DemoConfig, frames: u32) -> Result<HeadlessReport, AppError> {
    config.validate()?;

    let framebuffer = config.window.extent();
    let mut device = HeadlessDevice::new(framebuffer);
    let (renderer, model) = build_pipeline(&mut device, config, framebuffer)?;
    let instances = ObjectInstances::from_settings(&config.scene);
    let camera = Camera::from_settings(&config.camera);
    let initial_mode = if config.scene.start_deferred {
        RenderMode::Deferred
    } else {
        RenderMode::Forward
    };
    let mut toggles = RenderToggles::new(initial_mode, config.scene.start_rotating);
    let mut timer = FrameTimer::new();

    let mut report = HeadlessReport {
        frames,
        deferred_frames: 0,
        forward_frames: 0,
        draw_calls: 0,
        leaked: ResourceCounts::default(),
    };

    for frame_index in 0..frames {
        timer.tick(f64::from(frame_index) * HEADLESS_FRAME_SECONDS);
        toggles.update_keys(frame_index == frames / 2, false);

        let frame = FrameContext {
            mode: toggles.mode(),
            animation: animation(toggles.rotating(), timer.total_time()),
            camera: &camera,
            model: &model,
            instances: &instances,
        };
        let stats = renderer.render_frame(&mut device, &frame);
        match stats.mode {
            RenderMode::Deferred => report.deferred_frames += 1,
            RenderMode::Forward => report.forward_frames += 1,
        }
        log::debug!("Headless frame {frame_index}: {stats:?}");
    }

    report.draw_calls = device.draws().len();
    model.destroy(&mut device);
    renderer.destroy(&mut device);
    report.leaked = device.resource_counts();

    if report.leaked != ResourceCounts::default() {
        log::warn!("Resources alive after shutdown: {:?}", report.leaked);
    }
    log::info!(
        "Headless run: {} frames ({} deferred, {} forward), {} draw calls",
        report.frames,
        report.deferred_frames,
        report.forward_frames,
        report.draw_calls
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShaderPaths, ShaderSettings};

    fn workspace_config() -> DemoConfig {
        // Workspace root is two levels up from crates/deferred_engine
        let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../..");
        let shaders = format!("{root}/resources/shaders");
        let mut config = DemoConfig::default().with_profile(crate::config::WindowProfile::Compact);
        config.shaders = ShaderSettings {
            forward: ShaderPaths::named(&shaders, "base_shader"),
            geometry: ShaderPaths::named(&shaders, "geometry_pass"),
            lighting: ShaderPaths::named(&shaders, "lighting_pass"),
            light_box: ShaderPaths::named(&shaders, "light_box"),
        };
        config.assets.model_path = format!("{root}/resources/models/fighter/fighter.obj");
        config
    }

    #[test]
    fn test_headless_run_exercises_both_pipelines_without_leaks() {
        let report = run_headless(&workspace_config(), 4).unwrap();
        assert_eq!(report.frames, 4);
        assert_eq!(report.deferred_frames, 2);
        assert_eq!(report.forward_frames, 2);
        assert_eq!(report.leaked, ResourceCounts::default());
        // Per mesh draw: 3 meshes per instance, 9 instances; plus 14 markers per frame
        // and one lighting quad per deferred frame
        assert_eq!(report.draw_calls, 4 * (27 + 14) + 2);
    }

    #[test]
    fn test_missing_model_is_fatal_and_releases_pipeline() {
        let mut config = workspace_config();
        config.assets.model_path = "no/such/ship.obj".to_string();
        assert!(matches!(
            run_headless(&config, 1),
            Err(AppError::Asset(AssetError::NotFound(_)))
        ));
    }

    #[test]
    fn test_missing_shader_is_fatal() {
        let mut config = workspace_config();
        config.shaders.lighting.fragment = "no/such/lighting_pass.fs".to_string();
        assert!(matches!(
            run_headless(&config, 1),
            Err(AppError::Render(RenderError::ShaderSource { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_rendering() {
        let config = workspace_config().with_light_count(0);
        assert!(matches!(run_headless(&config, 1), Err(AppError::Config(_))));
    }
}
