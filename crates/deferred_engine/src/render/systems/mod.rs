//! Render systems

pub mod lighting;
