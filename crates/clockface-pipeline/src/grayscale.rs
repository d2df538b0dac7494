//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP, GIF) and produces the
//! single-channel grid every later stage works on.

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::types::PipelineError;

/// BT.601 luma weights in 14-bit fixed point (`0.299`, `0.587`, `0.114`).
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const WEIGHT_SHIFT: u32 = 14;

/// Decode raw image bytes and convert to grayscale.
///
/// Color input is converted with the BT.601 luminance weights
/// (`0.299*R + 0.587*G + 0.114*B`). Alpha is ignored.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the format is unrecognized or
/// the data is corrupt.
/// Returns [`PipelineError::EmptyImage`] if the decoded image has no pixels.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let gray = match image::load_from_memory(bytes)? {
        DynamicImage::ImageLuma8(gray) => gray,
        other => luma_bt601(&other.to_rgb8()),
    };
    ensure_nonempty(&gray)?;
    Ok(gray)
}

/// Convert RGB to luma with BT.601 weights, rounding to nearest.
#[must_use = "returns the grayscale image"]
pub fn luma_bt601(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted = u32::from(r) * WEIGHT_R
            + u32::from(g) * WEIGHT_G
            + u32::from(b) * WEIGHT_B
            + (1 << (WEIGHT_SHIFT - 1));
        // The weights sum to 1 << WEIGHT_SHIFT, so the result fits a u8.
        Luma([u8::try_from(weighted >> WEIGHT_SHIFT).unwrap_or(u8::MAX)])
    })
}

/// Reject zero-area grids before any stage allocates against them.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if either dimension is zero.
pub fn ensure_nonempty(gray: &GrayImage) -> Result<(), PipelineError> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }
    Ok(())
}
