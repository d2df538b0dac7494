//! Gaussian smoothing for noise reduction before edge detection.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. Kernels are specified by
//! their side length; the sigma is derived from it with the usual
//! `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule, so a 5x5 kernel smooths with
//! sigma 1.1 and an 11x11 neighbourhood with sigma 2.0.

use image::GrayImage;

/// Sigma implied by an odd kernel side length.
#[must_use]
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let k = kernel_size as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Apply Gaussian blur with the sigma implied by `kernel_size`.
///
/// Kernel sizes of 0 or 1 (and any size whose sigma is not positive)
/// return the image unchanged, since `imageproc` panics on
/// `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let sigma = kernel_sigma(kernel_size);
    if kernel_size <= 1 || sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn sigma_follows_kernel_size() {
        assert!((kernel_sigma(5) - 1.1).abs() < 1e-6);
        assert!((kernel_sigma(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unit_kernel_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, 1), img);
        assert_eq!(gaussian_blur(&img, 0), img);
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = gaussian_blur(&img, 5);
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 5);
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(
            left > 0,
            "expected blur to raise left-of-edge above 0, got {left}"
        );
        assert!(
            right < 255,
            "expected blur to lower right-of-edge below 255, got {right}"
        );
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_pixel(10, 10, image::Luma([128]));
        for pixel in gaussian_blur(&img, 5).pixels() {
            let diff = i16::from(pixel.0[0]) - 128;
            assert!(diff.abs() <= 1, "expected ~128, got {}", pixel.0[0]);
        }
    }
}
