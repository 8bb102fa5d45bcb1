//! Image loading for material textures
//!
//! Every format is converted to RGBA8 for upload.

use std::path::Path;

use crate::assets::AssetError;
use crate::render::api::Extent2D;

/// Decoded image ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw RGBA pixel data, rows top to bottom
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {e}", path.display())))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::debug!("Loaded image {width}x{height} from {}", path.display());
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Decode an image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("in-memory image: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Solid color image, used for missing material maps
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { data, width, height }
    }

    /// Size as an extent
    pub const fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.extent(), Extent2D::new(4, 4));
        assert_eq!(img.data.len(), 4 * 4 * 4);
        assert!(img.data.chunks(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn test_png_round_trip_through_memory() {
        let mut encoded = Vec::new();
        let source = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        source
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let img = ImageData::from_bytes(&encoded).unwrap();
        assert_eq!((img.width, img.height), (2, 3));
        assert_eq!(&img.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_nonexistent_file() {
        let result = ImageData::from_file("nonexistent_file.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}
