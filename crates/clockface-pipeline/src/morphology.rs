//! Morphological closing to bridge small gaps in hand strokes.
//!
//! Wraps [`imageproc::morphology::dilate`] and [`imageproc::morphology::erode`]
//! with a 3x3 square structuring element (`L∞` radius 1). `iterations`
//! dilations run first, then the same number of erosions.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

/// Close `image` with a 3x3 square element, `iterations` times.
///
/// Zero iterations return the image unchanged.
#[must_use = "returns the closed image"]
pub fn close(image: &GrayImage, iterations: u32) -> GrayImage {
    let mut out = image.clone();
    for _ in 0..iterations {
        out = dilate(&out, Norm::LInf, 1);
    }
    for _ in 0..iterations {
        out = erode(&out, Norm::LInf, 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn bridges_small_gap() {
        // Horizontal stroke with a 2-pixel break at x = 14..=15.
        let img = GrayImage::from_fn(30, 11, |x, y| {
            if y == 5 && !(14..=15).contains(&x) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let closed = close(&img, 2);
        assert_eq!(closed.get_pixel(14, 5).0[0], 255);
        assert_eq!(closed.get_pixel(15, 5).0[0], 255);
    }

    #[test]
    fn empty_image_stays_empty() {
        let img = GrayImage::new(10, 10);
        assert!(close(&img, 2).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn zero_iterations_is_identity() {
        let img = GrayImage::from_fn(6, 6, |x, _| Luma([if x == 3 { 255 } else { 0 }]));
        assert_eq!(close(&img, 0), img);
    }
}
