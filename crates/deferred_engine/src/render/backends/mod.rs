//! Graphics device implementations

pub mod headless;
pub mod opengl;

pub use headless::HeadlessDevice;
pub use opengl::GlDevice;
