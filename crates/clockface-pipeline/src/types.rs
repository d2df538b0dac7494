//! Shared types for the clock-reading pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand the pipeline a
/// decoded raster without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates (+Y points down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The clock face: a circle in the coordinate space of the original
/// (unextended) image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center of the face.
    pub center: Point,
    /// Radius in pixels.
    pub radius: f64,
}

impl Circle {
    /// Create a new circle.
    #[must_use]
    pub const fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// The face assumed when no circle is detected: centered on the image
    /// with radius equal to half the shorter dimension (integer division,
    /// so a 101x80 image yields center `(50, 40)` and radius `40`).
    #[must_use]
    pub fn fallback(width: u32, height: u32) -> Self {
        Self {
            center: Point::new(f64::from(width / 2), f64::from(height / 2)),
            radius: f64::from(width.min(height) / 2),
        }
    }
}

/// A straight line segment reported by line detection.
///
/// The length is derived from the endpoints at construction and cannot be
/// changed independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    start: Point,
    end: Point,
    length: f64,
}

impl LineSegment {
    /// Create a segment between two endpoints.
    #[must_use]
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            length: start.distance(end),
        }
    }

    /// Create a segment from integer pixel coordinates `(x1, y1, x2, y2)`.
    #[must_use]
    pub fn from_coords(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(
            Point::new(f64::from(x1), f64::from(y1)),
            Point::new(f64::from(x2), f64::from(y2)),
        )
    }

    /// First endpoint, as reported by the detector.
    #[must_use]
    pub const fn start(&self) -> Point {
        self.start
    }

    /// Second endpoint, as reported by the detector.
    #[must_use]
    pub const fn end(&self) -> Point {
        self.end
    }

    /// Euclidean length in pixels.
    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    /// The same segment with its endpoints swapped.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            length: self.length,
        }
    }
}

/// A clockwise bearing from 12 o'clock, always in `[0, 360)` degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct HandAngle(f64);

impl HandAngle {
    /// Wrap any finite angle in degrees into `[0, 360)`.
    ///
    /// Returns `None` for NaN or infinite input.
    #[must_use]
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative input.
        Some(Self(if wrapped >= 360.0 { 0.0 } else { wrapped }))
    }

    /// The bearing in degrees.
    #[must_use]
    pub const fn degrees(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for HandAngle {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_degrees(value).ok_or_else(|| format!("hand angle must be finite, got {value}"))
    }
}

impl From<HandAngle> for f64 {
    fn from(angle: HandAngle) -> Self {
        angle.0
    }
}

/// Where the hour reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HourSource {
    /// Derived from the second-longest segment.
    Detected,
    /// No hour-hand candidate was found; the hour is fixed at 12.
    Defaulted,
}

/// Where the clock face came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceSource {
    /// The top-voted circle from circle detection.
    Detected,
    /// No circle was detected; [`Circle::fallback`] was used.
    Defaulted,
}

/// A time reading on a 12-hour dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedTime {
    /// Hour in `1..=12`. Never 0.
    pub hour: u8,
    /// Minute in `0..=59`.
    pub minute: u8,
    /// Whether the hour was read from a hand or defaulted.
    pub hour_source: HourSource,
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Line printed when no time can be estimated.
pub const UNESTIMABLE_MESSAGE: &str = "Time could not be estimated.";

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// The clock face used as the angle reference.
    pub face: Circle,
    /// Whether the face was detected or defaulted.
    pub face_source: FaceSource,
    /// All detected segments, sorted by descending length (stable).
    pub segments: Vec<LineSegment>,
    /// Bearing of the minute-hand candidate, if any.
    pub minute_angle: Option<HandAngle>,
    /// Bearing of the hour-hand candidate, if any.
    pub hour_angle: Option<HandAngle>,
    /// The reading, or `None` when no time could be estimated.
    pub time: Option<EstimatedTime>,
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{time}"),
            None => f.write_str(UNESTIMABLE_MESSAGE),
        }
    }
}

/// Rounding rule for `angle / 6` when converting a bearing to minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinuteRounding {
    /// `x.5` rounds away from zero (`f64::round`).
    #[default]
    HalfAwayFromZero,
    /// `x.5` rounds to the even neighbour (`f64::round_ties_even`).
    HalfToEven,
}

/// Configuration for the clock-reading pipeline.
///
/// Every field is an empirically tuned constant. Defaults are exposed as
/// associated `DEFAULT_*` constants so command-line tools can reuse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Uniform white margin added around the image before circle detection.
    pub canvas_margin: u32,

    /// Side of the Gaussian smoothing kernel. Must be odd.
    pub blur_kernel_size: u32,

    /// CLAHE clip limit, relative to a flat histogram.
    pub clahe_clip_limit: f32,

    /// CLAHE tile grid (tiles per side).
    pub clahe_tile_grid: u32,

    /// Neighbourhood side for adaptive thresholding. Must be odd and > 1.
    pub threshold_block_size: u32,

    /// Constant subtracted from the local weighted mean.
    pub threshold_offset: i16,

    /// Number of 3x3 closing iterations applied to the binarized image.
    pub closing_iterations: u32,

    /// Canny low (weak edge) threshold on L1 gradient magnitude.
    pub canny_low: f32,

    /// Canny high (strong edge) threshold on L1 gradient magnitude.
    pub canny_high: f32,

    /// Distance resolution of the line accumulator, in pixels.
    pub line_rho_resolution: f32,

    /// Angle resolution of the line accumulator, in degrees.
    pub line_theta_resolution: f32,

    /// Minimum accumulator votes for a line.
    pub line_vote_threshold: u32,

    /// Minimum segment extent along either axis, in pixels.
    pub min_line_length: u32,

    /// Maximum gap bridged when walking along a line, in pixels.
    pub max_line_gap: u32,

    /// Inverse accumulator resolution for circle detection.
    pub circle_dp: f32,

    /// Minimum distance between detected circle centers.
    pub circle_min_distance: f32,

    /// High Canny threshold used inside circle detection (low is half).
    pub circle_canny_high: f32,

    /// Accumulator votes a center needs, also the minimum radius support.
    pub circle_accumulator_threshold: u32,

    /// Smallest radius searched.
    pub circle_min_radius: u32,

    /// Largest radius searched. 0 means no cap.
    pub circle_max_radius: u32,

    /// Rounding rule for minutes.
    pub minute_rounding: MinuteRounding,
}

impl PipelineConfig {
    pub const DEFAULT_CANVAS_MARGIN: u32 = 100;
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 5;
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;
    pub const DEFAULT_CLAHE_TILE_GRID: u32 = 8;
    pub const DEFAULT_THRESHOLD_BLOCK_SIZE: u32 = 11;
    pub const DEFAULT_THRESHOLD_OFFSET: i16 = 2;
    pub const DEFAULT_CLOSING_ITERATIONS: u32 = 2;
    pub const DEFAULT_CANNY_LOW: f32 = 50.0;
    pub const DEFAULT_CANNY_HIGH: f32 = 150.0;
    pub const DEFAULT_LINE_RHO_RESOLUTION: f32 = 1.0;
    pub const DEFAULT_LINE_THETA_RESOLUTION: f32 = 1.0;
    pub const DEFAULT_LINE_VOTE_THRESHOLD: u32 = 50;
    pub const DEFAULT_MIN_LINE_LENGTH: u32 = 30;
    pub const DEFAULT_MAX_LINE_GAP: u32 = 10;
    pub const DEFAULT_CIRCLE_DP: f32 = 1.2;
    pub const DEFAULT_CIRCLE_MIN_DISTANCE: f32 = 50.0;
    pub const DEFAULT_CIRCLE_CANNY_HIGH: f32 = 100.0;
    pub const DEFAULT_CIRCLE_ACCUMULATOR_THRESHOLD: u32 = 30;
    pub const DEFAULT_CIRCLE_MIN_RADIUS: u32 = 50;
    pub const DEFAULT_CIRCLE_MAX_RADIUS: u32 = 0;

    /// Largest accepted `canvas_margin`.
    pub const MAX_CANVAS_MARGIN: u32 = 4096;
    /// Largest accepted `clahe_tile_grid`.
    pub const MAX_CLAHE_TILE_GRID: u32 = 256;
    /// Largest accepted `threshold_offset` magnitude. Beyond this every
    /// pixel lands on the same side of the threshold.
    pub const MAX_THRESHOLD_OFFSET: i16 = 255;
    /// Finest accepted `line_rho_resolution`, in pixels.
    pub const MIN_LINE_RHO_RESOLUTION: f32 = 0.1;
    /// Finest accepted `line_theta_resolution`, in degrees.
    pub const MIN_LINE_THETA_RESOLUTION: f32 = 0.01;

    /// Check the invariants the stages rely on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.canvas_margin > Self::MAX_CANVAS_MARGIN {
            return invalid(format!(
                "canvas_margin must be at most {}, got {}",
                Self::MAX_CANVAS_MARGIN,
                self.canvas_margin
            ));
        }
        if self.blur_kernel_size % 2 == 0 {
            return invalid(format!(
                "blur_kernel_size must be odd, got {}",
                self.blur_kernel_size
            ));
        }
        if self.clahe_clip_limit.is_nan() || self.clahe_clip_limit <= 0.0 {
            return invalid(format!(
                "clahe_clip_limit must be positive, got {}",
                self.clahe_clip_limit
            ));
        }
        if self.clahe_tile_grid == 0 || self.clahe_tile_grid > Self::MAX_CLAHE_TILE_GRID {
            return invalid(format!(
                "clahe_tile_grid must be in 1..={}, got {}",
                Self::MAX_CLAHE_TILE_GRID,
                self.clahe_tile_grid
            ));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return invalid(format!(
                "threshold_block_size must be odd and at least 3, got {}",
                self.threshold_block_size
            ));
        }
        if self.threshold_offset.unsigned_abs() > Self::MAX_THRESHOLD_OFFSET.unsigned_abs() {
            return invalid(format!(
                "threshold_offset must be within +/-{}, got {}",
                Self::MAX_THRESHOLD_OFFSET,
                self.threshold_offset
            ));
        }
        if self.canny_low.is_nan()
            || self.canny_high.is_nan()
            || self.canny_low < 0.0
            || self.canny_low > self.canny_high
        {
            return invalid(format!(
                "canny thresholds must satisfy 0 <= low <= high, got {}/{}",
                self.canny_low, self.canny_high
            ));
        }
        if self.line_rho_resolution.is_nan()
            || self.line_rho_resolution < Self::MIN_LINE_RHO_RESOLUTION
            || self.line_theta_resolution.is_nan()
            || self.line_theta_resolution < Self::MIN_LINE_THETA_RESOLUTION
        {
            return invalid(format!(
                "line resolutions must be at least {} px and {} deg, got {}/{}",
                Self::MIN_LINE_RHO_RESOLUTION,
                Self::MIN_LINE_THETA_RESOLUTION,
                self.line_rho_resolution,
                self.line_theta_resolution
            ));
        }
        if self.line_vote_threshold == 0 {
            return invalid("line_vote_threshold must be at least 1".to_owned());
        }
        if self.circle_dp.is_nan() || self.circle_dp < 1.0 {
            return invalid(format!(
                "circle_dp must be at least 1.0, got {}",
                self.circle_dp
            ));
        }
        if self.circle_min_distance.is_nan()
            || self.circle_min_distance < 0.0
            || self.circle_canny_high.is_nan()
            || self.circle_canny_high <= 0.0
        {
            return invalid(
                "circle_min_distance must be non-negative and circle_canny_high positive"
                    .to_owned(),
            );
        }
        if self.circle_max_radius != 0 && self.circle_max_radius < self.circle_min_radius {
            return invalid(format!(
                "circle_max_radius ({}) is below circle_min_radius ({})",
                self.circle_max_radius, self.circle_min_radius
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_margin: Self::DEFAULT_CANVAS_MARGIN,
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_grid: Self::DEFAULT_CLAHE_TILE_GRID,
            threshold_block_size: Self::DEFAULT_THRESHOLD_BLOCK_SIZE,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
            closing_iterations: Self::DEFAULT_CLOSING_ITERATIONS,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            line_rho_resolution: Self::DEFAULT_LINE_RHO_RESOLUTION,
            line_theta_resolution: Self::DEFAULT_LINE_THETA_RESOLUTION,
            line_vote_threshold: Self::DEFAULT_LINE_VOTE_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
            circle_dp: Self::DEFAULT_CIRCLE_DP,
            circle_min_distance: Self::DEFAULT_CIRCLE_MIN_DISTANCE,
            circle_canny_high: Self::DEFAULT_CIRCLE_CANNY_HIGH,
            circle_accumulator_threshold: Self::DEFAULT_CIRCLE_ACCUMULATOR_THRESHOLD,
            circle_min_radius: Self::DEFAULT_CIRCLE_MIN_RADIUS,
            circle_max_radius: Self::DEFAULT_CIRCLE_MAX_RADIUS,
            minute_rounding: MinuteRounding::default(),
        }
    }
}

/// Errors that can occur before the pipeline can run.
///
/// Degraded detection (no circle, no lines, a single line) is not an
/// error; it is reported through [`Estimate`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has no pixels.
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
