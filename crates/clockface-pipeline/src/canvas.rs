//! Canvas extension so circle detection near the border is not truncated.

use image::{GrayImage, Luma};

use crate::types::Point;

/// Background level of the added margin (white).
pub const BACKGROUND: u8 = 255;

/// An image padded with a uniform margin on every side.
#[derive(Debug, Clone)]
pub struct ExtendedCanvas {
    /// The padded image, `(w + 2m) x (h + 2m)`.
    pub image: GrayImage,
    /// Margin added on each side, in pixels.
    pub margin: u32,
}

impl ExtendedCanvas {
    /// Translate a point on the padded canvas back to original-image
    /// coordinates. The result may be negative.
    #[must_use]
    pub fn to_original(&self, p: Point) -> Point {
        let m = f64::from(self.margin);
        Point::new(p.x - m, p.y - m)
    }
}

/// Copy `image` into the center of a new canvas filled with `background`,
/// offset by `(margin, margin)`. The input is not modified.
#[must_use = "returns the extended canvas"]
pub fn extend_canvas(image: &GrayImage, margin: u32, background: u8) -> ExtendedCanvas {
    let (w, h) = image.dimensions();
    let mut canvas = GrayImage::from_pixel(w + 2 * margin, h + 2 * margin, Luma([background]));
    image::imageops::replace(&mut canvas, image, i64::from(margin), i64::from(margin));
    ExtendedCanvas {
        image: canvas,
        margin,
    }
}
