//! # Demo Configuration
//!
//! Every tunable of the shading demo, grouped by subsystem. The defaults
//! reproduce the reference scene: a 1280x720 window, nine instances on a 3x3
//! grid, fourteen point lights generated from seed 99, and the camera parked
//! above and to the left of the grid looking down at it.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::render::api::Extent2D;

/// Upper bound on the point-light count a configuration may request.
pub const MAX_POINT_LIGHTS: usize = 64;

/// Named window sizes; the G-buffer is sized from this once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowProfile {
    /// 1280x720
    #[default]
    Desktop,
    /// 800x600
    Compact,
}

impl WindowProfile {
    /// Pixel dimensions of the profile
    pub const fn extent(self) -> Extent2D {
        match self {
            Self::Desktop => Extent2D::new(1280, 720),
            Self::Compact => Extent2D::new(800, 600),
        }
    }
}

impl std::str::FromStr for WindowProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::Invalid(format!("unknown window profile '{other}'"))),
        }
    }
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Size profile
    pub profile: WindowProfile,
    /// Title bar text
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            profile: WindowProfile::Desktop,
            title: "Deferred Shading".to_string(),
        }
    }
}

impl WindowSettings {
    /// Pixel dimensions of the window and G-buffer
    pub const fn extent(&self) -> Extent2D {
        self.profile.extent()
    }
}

/// Scene content and initial toggle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Number of point lights; also injected into shaders as `NR_POINT_LIGHTS`
    pub light_count: usize,
    /// Seed for light generation
    pub light_seed: u64,
    /// One translation per object instance
    pub object_positions: Vec<[f32; 3]>,
    /// Uniform scale applied to every instance
    pub object_scale: f32,
    /// Rotation axis (normalized on use)
    pub rotation_axis: [f32; 3],
    /// Radians per second of elapsed time
    pub rotation_rate: f32,
    /// Start in deferred mode
    pub start_deferred: bool,
    /// Start with instances rotating
    pub start_rotating: bool,
    /// Draw a small cube at every light
    pub show_light_markers: bool,
    /// Clear color for both framebuffers
    pub clear_color: [f32; 4],
}

impl Default for SceneSettings {
    fn default() -> Self {
        let mut object_positions = Vec::with_capacity(9);
        // Row by row from the back, left to right
        for z in [-8.0, 0.0, 8.0] {
            for x in [-5.0, 0.0, 5.0] {
                object_positions.push([x, 0.0, z]);
            }
        }

        Self {
            light_count: 14,
            light_seed: 99,
            object_positions,
            object_scale: 0.05,
            rotation_axis: [-0.5, -0.6, 0.8],
            rotation_rate: -0.4,
            start_deferred: true,
            start_rotating: true,
            show_light_markers: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Fly camera start state and tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Start position
    pub position: [f32; 3],
    /// Yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub zoom: f32,
    /// Units per second
    pub movement_speed: f32,
    /// Degrees per pixel of mouse motion
    pub mouse_sensitivity: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [-5.0, 5.0, 5.0],
            yaw: -35.0,
            pitch: -40.0,
            zoom: 45.0,
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Vertex/fragment source pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderPaths {
    /// Vertex shader path
    pub vertex: String,
    /// Fragment shader path
    pub fragment: String,
}

impl ShaderPaths {
    /// Pair `<dir>/<name>.vs` with `<dir>/<name>.fs`
    pub fn named(dir: &str, name: &str) -> Self {
        Self {
            vertex: format!("{dir}/{name}.vs"),
            fragment: format!("{dir}/{name}.fs"),
        }
    }
}

/// Shader program sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSettings {
    /// Single-pass forward shading
    pub forward: ShaderPaths,
    /// G-buffer fill
    pub geometry: ShaderPaths,
    /// Full-screen lighting resolve
    pub lighting: ShaderPaths,
    /// Light marker cubes
    pub light_box: ShaderPaths,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        const DIR: &str = "resources/shaders";
        Self {
            forward: ShaderPaths::named(DIR, "base_shader"),
            geometry: ShaderPaths::named(DIR, "geometry_pass"),
            lighting: ShaderPaths::named(DIR, "lighting_pass"),
            light_box: ShaderPaths::named(DIR, "light_box"),
        }
    }
}

/// Asset locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Wavefront OBJ drawn at every instance
    pub model_path: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            model_path: "resources/models/fighter/fighter.obj".to_string(),
        }
    }
}

/// Complete demo configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Window settings
    pub window: WindowSettings,
    /// Scene settings
    pub scene: SceneSettings,
    /// Camera settings
    pub camera: CameraSettings,
    /// Shader sources
    pub shaders: ShaderSettings,
    /// Asset paths
    pub assets: AssetSettings,
}

impl Config for DemoConfig {}

impl DemoConfig {
    /// Override the window profile
    #[must_use]
    pub fn with_profile(mut self, profile: WindowProfile) -> Self {
        self.window.profile = profile;
        self
    }

    /// Override the light count
    #[must_use]
    pub const fn with_light_count(mut self, count: usize) -> Self {
        self.scene.light_count = count;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let extent = self.window.extent();
        if extent.width == 0 || extent.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }

        if !(1..=MAX_POINT_LIGHTS).contains(&self.scene.light_count) {
            return Err(ConfigError::Invalid(format!(
                "light_count must be in 1..={MAX_POINT_LIGHTS}, got {}",
                self.scene.light_count
            )));
        }

        if self.scene.object_positions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one object position is required".to_string(),
            ));
        }

        let [ax, ay, az] = self.scene.rotation_axis;
        if ax * ax + ay * ay + az * az <= f32::EPSILON {
            return Err(ConfigError::Invalid("rotation_axis must be non-zero".to_string()));
        }

        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.camera.near, self.camera.far
            )));
        }

        Ok(())
    }
}
