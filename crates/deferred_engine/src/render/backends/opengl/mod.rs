//! OpenGL 3.3 core backend built on `glow`
//!
//! The only module in the crate that calls into the driver, and therefore the
//! only one allowed to use `unsafe`.

#![allow(unsafe_code)]

mod device;

pub use device::GlDevice;
