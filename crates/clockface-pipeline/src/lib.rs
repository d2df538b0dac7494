//! clockface-pipeline: Reads the time off an analog clock face (sans-IO).
//!
//! Estimates a time from a grayscale raster through:
//! contrast normalization -> hand edges -> line segments ->
//! face circle -> hand bearings -> hour and minute.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices or decoded rasters and returns structured data. Argument
//! handling, payload decoding and printing live in the binaries.

pub mod angle;
pub mod blur;
pub mod canvas;
pub mod clahe;
pub mod contrast;
pub mod diagnostics;
pub mod edge;
pub mod face;
pub mod grayscale;
pub mod hands;
pub mod hough_circles;
pub mod hough_lines;
pub mod morphology;
pub mod threshold;
pub mod time;
pub mod types;

pub use types::{
    Circle, Estimate, EstimatedTime, FaceSource, GrayImage, HandAngle, HourSource, LineSegment,
    MinuteRounding, PipelineConfig, PipelineError, Point, UNESTIMABLE_MESSAGE,
};

/// Estimate the time shown in an encoded image.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP, GIF) and a configuration.
/// Detection trouble (no face, no hands, a single hand) is not an error:
/// it is reported through the returned [`Estimate`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image cannot be decoded.
/// Returns [`PipelineError::EmptyImage`] if the image has no pixels.
pub fn estimate(image_bytes: &[u8], config: &PipelineConfig) -> Result<Estimate, PipelineError> {
    config.validate()?;
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    Ok(run(&gray, config))
}

/// Estimate the time shown in an already decoded grayscale image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::EmptyImage`] if the image has no pixels.
pub fn estimate_gray(gray: &GrayImage, config: &PipelineConfig) -> Result<Estimate, PipelineError> {
    config.validate()?;
    grayscale::ensure_nonempty(gray)?;
    Ok(run(gray, config))
}

/// Finish an estimate from an already located face and detected segments.
///
/// Segments may be in any order; they are ranked longest first (stable)
/// before the hands are picked. This is the boundary the image stages
/// feed, and is useful on its own when detections come from elsewhere.
#[must_use]
pub fn estimate_from_detections(
    face: Circle,
    face_source: FaceSource,
    mut segments: Vec<LineSegment>,
    config: &PipelineConfig,
) -> Estimate {
    hands::sort_by_length(&mut segments);
    let picked = hands::select_hands(&segments);

    let minute_angle = picked
        .minute
        .and_then(|s| angle::hand_angle(&s, face.center));
    let hour_angle = picked.hour.and_then(|s| angle::hand_angle(&s, face.center));
    let time = time::derive_time(minute_angle, hour_angle, config.minute_rounding);

    tracing::debug!(
        minute_angle = ?minute_angle.map(HandAngle::degrees),
        hour_angle = ?hour_angle.map(HandAngle::degrees),
        time = ?time.map(|t| t.to_string()),
        "time derived"
    );

    Estimate {
        face,
        face_source,
        segments,
        minute_angle,
        hour_angle,
        time,
    }
}

/// The image stages, on validated input. Timings are discarded.
fn run(gray: &GrayImage, config: &PipelineConfig) -> Estimate {
    diagnostics::run_stages(gray, config, &diagnostics::NoClock).0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn face() -> Circle {
        Circle::new(Point::new(100.0, 100.0), 80.0)
    }

    #[test]
    fn estimate_empty_input() {
        let result = estimate(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn estimate_corrupt_input() {
        let result = estimate(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_decoding() {
        let config = PipelineConfig {
            threshold_block_size: 10,
            ..PipelineConfig::default()
        };
        let result = estimate(&[], &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn overflowing_config_is_rejected_before_image_work() {
        let gray = GrayImage::from_pixel(32, 32, image::Luma([255]));
        for config in [
            PipelineConfig {
                threshold_offset: i16::MIN,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                canvas_margin: 1 << 31,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                clahe_tile_grid: 70_000,
                ..PipelineConfig::default()
            },
        ] {
            let result = estimate_gray(&gray, &config);
            assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        }
    }

    #[test]
    fn zero_area_gray_is_rejected() {
        let result = estimate_gray(&GrayImage::new(0, 5), &PipelineConfig::default());
        assert!(matches!(
            result,
            Err(PipelineError::EmptyImage {
                width: 0,
                height: 5
            })
        ));
    }

    #[test]
    fn white_image_is_unestimable() {
        let estimate = estimate(&white_png(64, 48), &PipelineConfig::default()).unwrap();
        assert_eq!(estimate.time, None);
        assert!(estimate.segments.is_empty());
        assert_eq!(estimate.face_source, FaceSource::Defaulted);
        assert_eq!(estimate.face, Circle::fallback(64, 48));
        assert_eq!(estimate.to_string(), UNESTIMABLE_MESSAGE);
    }

    #[test]
    fn quarter_past_twelve() {
        let segments = vec![
            LineSegment::from_coords(100, 100, 100, 60),
            LineSegment::from_coords(100, 100, 170, 100),
        ];
        let estimate = estimate_from_detections(
            face(),
            FaceSource::Detected,
            segments,
            &PipelineConfig::default(),
        );
        assert_eq!(estimate.to_string(), "12:15");
        let time = estimate.time.unwrap();
        assert_eq!(time.hour_source, HourSource::Detected);
        // Ranked longest first.
        assert!((estimate.segments[0].length() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn half_past_with_single_hand() {
        let segments = vec![LineSegment::from_coords(100, 170, 100, 100)];
        let estimate = estimate_from_detections(
            face(),
            FaceSource::Detected,
            segments,
            &PipelineConfig::default(),
        );
        assert_eq!(estimate.to_string(), "12:30");
        assert_eq!(estimate.time.unwrap().hour_source, HourSource::Defaulted);
        assert_eq!(estimate.hour_angle, None);
    }

    #[test]
    fn no_segments_is_unestimable_whatever_the_face() {
        for source in [FaceSource::Detected, FaceSource::Defaulted] {
            let estimate =
                estimate_from_detections(face(), source, Vec::new(), &PipelineConfig::default());
            assert_eq!(estimate.time, None);
            assert_eq!(estimate.minute_angle, None);
        }
    }

    #[test]
    fn only_two_longest_segments_matter() {
        let segments = vec![
            LineSegment::from_coords(100, 100, 130, 100),
            LineSegment::from_coords(100, 100, 100, 10),
            LineSegment::from_coords(100, 100, 40, 100),
        ];
        let estimate = estimate_from_detections(
            face(),
            FaceSource::Detected,
            segments,
            &PipelineConfig::default(),
        );
        // Minute hand straight up, hour hand at 9.
        assert_eq!(estimate.to_string(), "09:00");
    }

    #[test]
    fn estimate_serializes_to_json() {
        let estimate = estimate_from_detections(
            face(),
            FaceSource::Defaulted,
            vec![LineSegment::from_coords(100, 100, 160, 100)],
            &PipelineConfig::default(),
        );
        let json = serde_json::to_string(&estimate).unwrap();
        assert!(json.contains("\"face_source\":\"Defaulted\""));
        assert!(json.contains("\"hour_source\":\"Defaulted\""));
    }
}
