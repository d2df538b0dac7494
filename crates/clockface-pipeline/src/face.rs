//! Clock-face localization.
//!
//! The grayscale image is padded with a white margin so a dial touching the
//! border still closes into a full ring of edges, normalized, edge-detected,
//! and handed to circle detection. Only the top-voted circle is used. Its
//! center is rounded to whole pixels and moved back into original-image
//! coordinates; when nothing is detected the face defaults to a circle
//! centered on the image.

use image::GrayImage;

use crate::canvas::{self, ExtendedCanvas};
use crate::contrast;
use crate::edge;
use crate::hough_circles::{self, CircleParams};
use crate::types::{Circle, FaceSource, PipelineConfig, Point};

/// The face chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLocation {
    /// Face circle in original-image coordinates.
    pub circle: Circle,
    /// Whether the circle was detected or defaulted.
    pub source: FaceSource,
    /// Number of circles circle detection reported.
    pub candidates: usize,
}

/// Circle-detection parameters from the pipeline configuration.
#[must_use]
pub const fn circle_params(config: &PipelineConfig) -> CircleParams {
    CircleParams {
        dp: config.circle_dp,
        min_distance: config.circle_min_distance,
        canny_high: config.circle_canny_high,
        accumulator_threshold: config.circle_accumulator_threshold,
        min_radius: config.circle_min_radius,
        max_radius: config.circle_max_radius,
    }
}

/// Find the clock face in `gray`, or fall back to [`Circle::fallback`].
#[must_use]
pub fn locate_face(gray: &GrayImage, config: &PipelineConfig) -> FaceLocation {
    let extended = canvas::extend_canvas(gray, config.canvas_margin, canvas::BACKGROUND);
    let normalized = contrast::normalize_contrast(&extended.image, config);
    let edges = edge::canny(&normalized, config.canny_low, config.canny_high);
    let candidates = hough_circles::detect_circles(&edges, &circle_params(config));

    let Some(top) = candidates.first() else {
        let (w, h) = gray.dimensions();
        let circle = Circle::fallback(w, h);
        tracing::debug!(
            cx = circle.center.x,
            cy = circle.center.y,
            r = circle.radius,
            "no circle detected, using image-centered face"
        );
        return FaceLocation {
            circle,
            source: FaceSource::Defaulted,
            candidates: 0,
        };
    };

    let circle = to_original(&extended, top.circle);
    tracing::debug!(
        cx = circle.center.x,
        cy = circle.center.y,
        r = circle.radius,
        votes = top.votes,
        candidates = candidates.len(),
        "clock face detected"
    );
    FaceLocation {
        circle,
        source: FaceSource::Detected,
        candidates: candidates.len(),
    }
}

/// Round a canvas-space circle to whole pixels (ties to even) and subtract
/// the margin. Coordinates stay signed.
fn to_original(extended: &ExtendedCanvas, circle: Circle) -> Circle {
    let center = Point::new(
        circle.center.x.round_ties_even(),
        circle.center.y.round_ties_even(),
    );
    Circle::new(
        extended.to_original(center),
        circle.radius.round_ties_even(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_hollow_circle_mut;

    fn dial(size: u32, center: (i32, i32), radius: i32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, Luma([255]));
        for r in radius - 1..=radius + 1 {
            draw_hollow_circle_mut(&mut img, center, r, Luma([0]));
        }
        img
    }

    #[test]
    fn white_image_defaults_to_centered_face() {
        let img = GrayImage::from_pixel(120, 90, Luma([255]));
        let face = locate_face(&img, &PipelineConfig::default());
        assert_eq!(face.source, FaceSource::Defaulted);
        assert_eq!(face.candidates, 0);
        assert_eq!(face.circle, Circle::fallback(120, 90));
    }

    #[test]
    fn drawn_dial_is_detected_in_original_coordinates() {
        for (size, center, radius) in [
            (300, (150, 150), 100),
            (360, (180, 180), 150),
            (320, (120, 190), 80),
        ] {
            let img = dial(size, center, radius);
            let face = locate_face(&img, &PipelineConfig::default());
            assert_eq!(face.source, FaceSource::Detected);
            assert!(face.candidates >= 1);
            let truth = Point::new(f64::from(center.0), f64::from(center.1));
            assert!(
                face.circle.center.distance(truth) < 2.0,
                "{center:?}: center {:?}",
                face.circle.center
            );
            assert!(
                (face.circle.radius - f64::from(radius)).abs() < 3.0,
                "{center:?}: radius {}",
                face.circle.radius
            );
        }
    }

    #[test]
    fn detected_center_is_whole_pixels() {
        let img = dial(300, (150, 150), 100);
        let c = locate_face(&img, &PipelineConfig::default()).circle;
        assert!((c.center.x - c.center.x.round()).abs() < f64::EPSILON);
        assert!((c.center.y - c.center.y.round()).abs() < f64::EPSILON);
    }

    #[test]
    fn translation_keeps_negative_coordinates() {
        let extended = canvas::extend_canvas(&GrayImage::new(10, 10), 100, canvas::BACKGROUND);
        let c = to_original(&extended, Circle::new(Point::new(60.5, 101.5), 70.5));
        assert_eq!(c.center, Point::new(-40.0, 2.0));
        assert!((c.radius - 70.0).abs() < f64::EPSILON);
    }
}
