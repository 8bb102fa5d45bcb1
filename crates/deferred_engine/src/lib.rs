//! # Deferred Engine
//!
//! Forward and deferred point-light shading of an instanced model, switchable
//! at runtime, on an OpenGL 3.3 core context.
//!
//! ## Features
//!
//! - **G-buffer**: position, normal, albedo+specular and emission attachments
//!   plus a depth renderbuffer, checked for completeness at startup
//! - **Seeded lights**: a reproducible point-light set shared by both pipelines
//! - **Depth-correct overlays**: the G-buffer depth is blitted into the default
//!   framebuffer so forward-drawn light markers occlude correctly
//! - **Headless device**: the full pipeline runs without a GPU for tests and CI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deferred_engine::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     deferred_engine::foundation::logging::init();
//!     let config = DemoConfig::default();
//!     DeferredDemo::new(&config)?.run();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;

mod application;

pub use application::{run_headless, AppError, DeferredDemo, HeadlessReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::Model,
        config::{Config, DemoConfig, WindowProfile},
        foundation::math::{Mat4, Vec3},
        input::{RenderMode, RenderToggles},
        render::{
            Camera, FrameContext, FrameRenderer, GraphicsDevice, LightSet, RenderError,
            RenderTargetSet,
        },
        run_headless, AppError, DeferredDemo, HeadlessReport,
    };
}
