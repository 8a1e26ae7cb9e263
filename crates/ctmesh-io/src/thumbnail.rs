//! Grayscale PNG previews of mask slices.

use std::path::Path;

use ctmesh_core::{CtmeshError, Mask, Plane, Result};
use image::{GrayImage, ImageFormat};

fn image_error(e: impl std::fmt::Display) -> CtmeshError {
    CtmeshError::ImageError(e.to_string())
}

fn to_image(width: usize, height: usize, pixels: Vec<u8>) -> Result<GrayImage> {
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(image_error(format!("slice {width}x{height} is too large")));
    };
    GrayImage::from_raw(w, h, pixels).ok_or_else(|| image_error("invalid image data"))
}

/// Saves the middle slice of `mask` along `plane` as an 8-bit PNG with
/// foreground at 255 and background at 0.
pub fn save_thumbnail<P: AsRef<Path>>(path: P, mask: &Mask, plane: Plane) -> Result<()> {
    let (width, height, pixels) = mask.middle_slice(plane);
    let img = to_image(width, height, pixels)?;
    img.save_with_format(path.as_ref(), ImageFormat::Png)
        .map_err(image_error)
}

/// Encodes the middle slice of `mask` along `plane` as PNG bytes.
pub fn encode_thumbnail(mask: &Mask, plane: Plane) -> Result<Vec<u8>> {
    let (width, height, pixels) = mask.middle_slice(plane);
    let img = to_image(width, height, pixels)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).map_err(image_error)?;
    Ok(buffer.into_inner())
}
