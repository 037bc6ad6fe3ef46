//! Cropping a captured bitmap to a pixel region.
//!
//! No OS access here: bitmap in, bitmap out.

use crate::geometry::PixelRect;
use image::RgbaImage;

/// Crops `image` to `region` (bitmap pixels, top-left origin).
///
/// A region whose far corner lies past the bitmap is rejected, never
/// clamped to fit.
pub fn crop(image: &RgbaImage, region: PixelRect) -> Result<RgbaImage, CropError> {
    if region.width == 0 || region.height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = image.dimensions();

    if !region.fits_within(img_width, img_height) {
        return Err(CropError::OutOfBounds {
            requested: region,
            image_size: (img_width, img_height),
        });
    }

    Ok(image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{},{},{}) exceeds image bounds ({}x{})",
        requested.x, requested.y, requested.width, requested.height,
        image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: PixelRect,
        image_size: (u32, u32),
    },
}
