//! Contrast normalization: Gaussian denoise followed by CLAHE.
//!
//! Evens out illumination so the fixed edge thresholds downstream behave
//! the same on dim and bright photographs.

use image::GrayImage;

use crate::types::PipelineConfig;
use crate::{blur, clahe};

/// Smooth with the configured kernel, then equalize tile by tile.
#[must_use = "returns the normalized image"]
pub fn normalize_contrast(image: &GrayImage, config: &PipelineConfig) -> GrayImage {
    let blurred = blur::gaussian_blur(image, config.blur_kernel_size);
    clahe::clahe(&blurred, config.clahe_clip_limit, config.clahe_tile_grid)
}
