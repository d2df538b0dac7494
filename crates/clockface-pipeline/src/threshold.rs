//! Adaptive (locally weighted) binarization.
//!
//! Each pixel is compared against the Gaussian-weighted mean of its
//! `block_size x block_size` neighbourhood minus a constant offset. The
//! output is inverted so that ink (pixels darker than their surroundings)
//! becomes foreground (255) and paper becomes background (0).

use image::{GrayImage, Luma};

use crate::blur;

/// Binarize with a Gaussian-weighted local threshold, ink = 255.
///
/// A pixel is foreground when `pixel <= local_mean - offset`.
#[must_use = "returns the binary image"]
pub fn adaptive_threshold_inv(image: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let mean = blur::gaussian_blur(image, block_size);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = i32::from(image.get_pixel(x, y).0[0]);
        let local = i32::from(mean.get_pixel(x, y).0[0]);
        if pixel - local > -i32::from(offset) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}
