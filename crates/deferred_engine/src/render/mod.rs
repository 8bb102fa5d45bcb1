//! # Rendering System
//!
//! Forward and deferred point-light shading on top of a [`GraphicsDevice`].
//!
//! ## Architecture
//!
//! - [`api`]: the device trait, handles and the [`Drawable`] seam
//! - [`backends`]: an OpenGL 3.3 device and a headless in-memory device
//! - [`deferred`]: the G-buffer ([`RenderTargetSet`])
//! - [`systems::lighting`]: the seeded [`LightSet`]
//! - [`passes`]: geometry, lighting, forward and light-marker passes
//! - [`frame`]: the per-frame orchestration of those passes
//!
//! ## Binding discipline
//!
//! GPU binding state is process-wide. Every pass leaves the default
//! framebuffer bound on both binding points and texture unit 0 active when it
//! returns, and [`GraphicsDevice::binding_state`] exposes that state so it can
//! be checked.
//!
//! [`GraphicsDevice`]: api::GraphicsDevice
//! [`GraphicsDevice::binding_state`]: api::GraphicsDevice::binding_state
//! [`Drawable`]: api::Drawable
//! [`RenderTargetSet`]: deferred::RenderTargetSet
//! [`LightSet`]: systems::lighting::LightSet

pub mod api;
pub mod backends;
pub mod deferred;
pub mod frame;
pub mod passes;
pub mod primitives;
pub mod shader;
pub mod systems;
pub mod window;

#[cfg(test)]
mod pipeline_tests;

pub use api::{Drawable, Extent2D, GraphicsDevice};
pub use deferred::RenderTargetSet;
pub use frame::{FrameContext, FrameMatrices, FrameRenderer, FrameStats, ShaderSet};
pub use primitives::{Camera, CameraMovement, ViewProvider};
pub use shader::Shader;
pub use systems::lighting::{LightSet, PointLight};
pub use window::{Window, WindowError};

use api::ShaderStage;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while building the rendering pipeline
///
/// Every variant is a startup failure; the frame loop itself never fails.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The G-buffer could not be made complete
    ///
    /// Raised by [`RenderTargetSet::initialize`] when attachment sizes
    /// disagree or the device rejects the attachment combination. Nothing is
    /// drawn and no G-buffer objects outlive the failure.
    ///
    /// [`RenderTargetSet::initialize`]: deferred::RenderTargetSet::initialize
    #[error("G-buffer framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    /// A shader source file could not be read
    #[error("Failed to read shader source '{path}': {source}")]
    ShaderSource {
        /// Path that failed
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A shader stage failed to compile
    #[error("Failed to compile {stage} shader of '{label}':\n{log}")]
    ShaderCompile {
        /// Program label
        label: String,
        /// Failing stage
        stage: ShaderStage,
        /// Compiler info log
        log: String,
    },

    /// A program failed to link
    #[error("Failed to link shader program '{label}':\n{log}")]
    ShaderLink {
        /// Program label
        label: String,
        /// Linker info log
        log: String,
    },

    /// A GPU object could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Settings and compiled shaders disagree
    #[error("Render configuration error: {0}")]
    Configuration(String),
}
