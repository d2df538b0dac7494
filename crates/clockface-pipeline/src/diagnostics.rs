//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for threshold
//! tuning. [`estimate_with_diagnostics`] runs the same stages as
//! [`estimate_gray`](crate::estimate_gray) and records what each produced.
//!
//! Timestamps come from a caller-supplied [`Clock`], so this crate never
//! reads the system time itself. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration` does
//! not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{
    Estimate, FaceSource, GrayImage, HourSource, PipelineConfig, PipelineError,
};
use crate::{blur, contrast, edge, face, grayscale, hands};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// An opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Gaussian blur + CLAHE.
    pub contrast: StageDiagnostics,
    /// Adaptive threshold + closing + Canny.
    pub hand_edges: StageDiagnostics,
    /// Probabilistic Hough segments, ranked.
    pub line_detection: StageDiagnostics,
    /// Canvas extension + circle detection.
    pub face: StageDiagnostics,
    /// Hand selection, bearings and time derivation.
    pub reading: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Contrast normalization metrics.
    Contrast {
        /// Blur kernel side.
        kernel_size: u32,
        /// Sigma derived from the kernel side.
        sigma: f32,
        /// CLAHE clip limit.
        clip_limit: f32,
        /// CLAHE tiles per side.
        tile_grid: u32,
    },
    /// Hand edge map metrics.
    HandEdges {
        /// Number of edge pixels (value == 255).
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Line detection metrics.
    LineDetection {
        /// Number of segments found.
        segment_count: usize,
        /// Length of the longest segment, if any.
        longest: Option<f64>,
        /// Length of the second-longest segment, if any.
        runner_up: Option<f64>,
    },
    /// Face localization metrics.
    Face {
        /// Circles reported by circle detection.
        candidate_count: usize,
        /// Whether the face was detected or defaulted.
        source: FaceSource,
        /// Face center x in original-image pixels.
        cx: f64,
        /// Face center y in original-image pixels.
        cy: f64,
        /// Face radius in pixels.
        radius: f64,
    },
    /// Reading metrics.
    Reading {
        /// Minute-hand bearing in degrees.
        minute_angle: Option<f64>,
        /// Hour-hand bearing in degrees.
        hour_angle: Option<f64>,
        /// Hour provenance, when a time was read.
        hour_source: Option<HourSource>,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// The line the command-line tool would print.
    pub reading: String,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Contrast", &self.contrast),
            ("Hand Edges", &self.hand_edges),
            ("Line Detection", &self.line_detection),
            ("Face", &self.face),
            ("Reading", &self.reading),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Reading: {}", self.summary.reading));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.precision$}"))
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Contrast {
            kernel_size,
            sigma,
            clip_limit,
            tile_grid,
        } => format!(
            "k={kernel_size} sigma={sigma:.2} clip={clip_limit:.1} tiles={tile_grid}x{tile_grid}"
        ),
        StageMetrics::HandEdges {
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("edges={edge_pixel_count} ({density:.1}%)")
        }
        StageMetrics::LineDetection {
            segment_count,
            longest,
            runner_up,
        } => format!(
            "{segment_count} segments, longest={} next={}",
            format_optional(*longest, 1),
            format_optional(*runner_up, 1),
        ),
        StageMetrics::Face {
            candidate_count,
            source,
            cx,
            cy,
            radius,
        } => format!(
            "{source:?} ({candidate_count} candidates) c=({cx:.0}, {cy:.0}) r={radius:.0}"
        ),
        StageMetrics::Reading {
            minute_angle,
            hour_angle,
            hour_source,
        } => {
            let hour_source = hour_source.map_or_else(|| "-".to_owned(), |s| format!("{s:?}"));
            format!(
                "minute={}deg hour={}deg hour_source={hour_source}",
                format_optional(*minute_angle, 2),
                format_optional(*hour_angle, 2),
            )
        }
    }
}

/// Time one stage.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Run the pipeline on `gray`, recording per-stage diagnostics.
///
/// Produces the same [`Estimate`] as [`estimate_gray`](crate::estimate_gray).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::EmptyImage`] if the image has no pixels.
pub fn estimate_with_diagnostics<C: Clock>(
    gray: &GrayImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(Estimate, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    grayscale::ensure_nonempty(gray)?;
    Ok(run_stages(gray, config, clock))
}

/// A clock that never advances, for runs that discard timings.
pub(crate) struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// The image stages, on validated input.
pub(crate) fn run_stages<C: Clock>(
    gray: &GrayImage,
    config: &PipelineConfig,
    clock: &C,
) -> (Estimate, PipelineDiagnostics) {
    tracing::debug!(
        width = gray.width(),
        height = gray.height(),
        "estimating clock time"
    );

    let total_start = clock.now();
    let (width, height) = gray.dimensions();
    let pixel_count = u64::from(width) * u64::from(height);

    let (normalized, duration) = timed(clock, || contrast::normalize_contrast(gray, config));
    let contrast = StageDiagnostics {
        duration,
        metrics: StageMetrics::Contrast {
            kernel_size: config.blur_kernel_size,
            sigma: blur::kernel_sigma(config.blur_kernel_size),
            clip_limit: config.clahe_clip_limit,
            tile_grid: config.clahe_tile_grid,
        },
    };

    let (edges, duration) = timed(clock, || hands::prepare_hand_edges(&normalized, config));
    let hand_edges = StageDiagnostics {
        duration,
        metrics: StageMetrics::HandEdges {
            edge_pixel_count: edge::count_edge_pixels(&edges),
            total_pixel_count: pixel_count,
        },
    };

    let (segments, duration) = timed(clock, || hands::detect_hand_segments(&edges, config));
    let line_detection = StageDiagnostics {
        duration,
        metrics: StageMetrics::LineDetection {
            segment_count: segments.len(),
            longest: segments.first().map(crate::LineSegment::length),
            runner_up: segments.get(1).map(crate::LineSegment::length),
        },
    };

    let (location, duration) = timed(clock, || face::locate_face(gray, config));
    let face = StageDiagnostics {
        duration,
        metrics: StageMetrics::Face {
            candidate_count: location.candidates,
            source: location.source,
            cx: location.circle.center.x,
            cy: location.circle.center.y,
            radius: location.circle.radius,
        },
    };

    let (estimate, duration) = timed(clock, || {
        crate::estimate_from_detections(location.circle, location.source, segments, config)
    });
    let reading = StageDiagnostics {
        duration,
        metrics: StageMetrics::Reading {
            minute_angle: estimate.minute_angle.map(crate::HandAngle::degrees),
            hour_angle: estimate.hour_angle.map(crate::HandAngle::degrees),
            hour_source: estimate.time.map(|t| t.hour_source),
        },
    };

    let diagnostics = PipelineDiagnostics {
        contrast,
        hand_edges,
        line_detection,
        face,
        reading,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: width,
            image_height: height,
            pixel_count,
            reading: estimate.to_string(),
        },
    };
    (estimate, diagnostics)
}
