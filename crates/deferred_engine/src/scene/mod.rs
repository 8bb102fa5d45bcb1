//! Scene description: the instanced objects drawn every frame

pub mod instances;

pub use instances::{InstanceAnimation, ObjectInstances};
