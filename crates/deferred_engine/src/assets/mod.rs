//! Asset loading
//!
//! Wavefront OBJ/MTL parsing, image decoding and the GPU-resident [`Model`]
//! drawn at every object instance.

pub mod image_loader;
pub mod materials;
pub mod model;
pub mod obj_loader;

pub use image_loader::ImageData;
pub use materials::{MtlData, MtlParser};
pub use model::Model;
pub use obj_loader::{ObjLoader, ObjMesh, ObjModel};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
