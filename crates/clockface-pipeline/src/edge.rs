//! Canny edge detection.
//!
//! Gradients come from 3x3 Sobel kernels ([`imageproc::gradients`]) and the
//! magnitude is the L1 norm `|gx| + |gy|`, so thresholds are on the same
//! scale as the classic dual-threshold 50/150 setting. Unlike
//! [`imageproc::edges::canny`], no extra Gaussian pass is applied: callers
//! smooth explicitly, and the circle detector runs this directly on an
//! already binary edge map.
//!
//! Returns a binary image where 255 marks an edge and 0 the background.
//! The outermost row and column are never edges.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero makes every pixel with any gradient a potential
/// edge, which floods the line and circle accumulators.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// `tan(22.5°)`: below this `|gy|/|gx|` ratio the gradient is horizontal.
const TAN_22_5: f32 = 0.414_213_57;
/// `tan(67.5°)`: above this ratio the gradient is vertical.
const TAN_67_5: f32 = 2.414_213_5;

const NONE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

/// Detect edges using the Canny algorithm.
///
/// Pixels whose gradient magnitude survives non-maximum suppression and
/// exceeds `high_threshold` are definite edges; those above `low_threshold`
/// are edges only if 8-connected to a definite edge.
///
/// Both thresholds are clamped to at least [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);

    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return GrayImage::new(w, h);
    }

    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let gx = gx.as_raw();
    let gy = gy.as_raw();
    let magnitude: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(&dx, &dy)| f32::from(dx.unsigned_abs()) + f32::from(dy.unsigned_abs()))
        .collect();

    let stride = w as usize;
    let rows = h as usize;
    let mut state = vec![NONE; stride * rows];
    let mut stack = Vec::new();

    // Non-maximum suppression.
    for y in 1..rows - 1 {
        for x in 1..stride - 1 {
            let idx = y * stride + x;
            let m = magnitude[idx];
            if m <= low {
                continue;
            }

            let ax = f32::from(gx[idx].unsigned_abs());
            let ay = f32::from(gy[idx].unsigned_abs());
            let (n1, n2) = if ay <= ax * TAN_22_5 {
                (idx - 1, idx + 1)
            } else if ay >= ax * TAN_67_5 {
                (idx - stride, idx + stride)
            } else if (gx[idx] < 0) == (gy[idx] < 0) {
                (idx - stride - 1, idx + stride + 1)
            } else {
                (idx - stride + 1, idx + stride - 1)
            };

            // Strict on one side so a plateau of two equal maxima keeps one.
            if m > magnitude[n1] && m >= magnitude[n2] {
                if m > high {
                    state[idx] = STRONG;
                    stack.push(idx);
                } else {
                    state[idx] = WEAK;
                }
            }
        }
    }

    // Hysteresis: grow definite edges through 8-connected weak pixels.
    let mut out = vec![0u8; stride * rows];
    for &idx in &stack {
        out[idx] = 255;
    }
    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % stride, idx / stride);
        for ny in y.saturating_sub(1)..=(y + 1).min(rows - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(stride - 1) {
                let n = ny * stride + nx;
                if state[n] == WEAK && out[n] == 0 {
                    out[n] = 255;
                    stack.push(n);
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| Luma([out[y as usize * stride + x as usize]]))
}

/// Count edge pixels (value == 255).
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == 255)))
        .sum()
}
