//! Hand detection and hand selection.
//!
//! The contrast-normalized image is binarized so ink strokes become
//! foreground, closed to heal small breaks in the strokes, and reduced to
//! an edge map. Line segments found in that map are ranked by length: the
//! longest is taken as the minute hand, the runner-up as the hour hand.

use image::GrayImage;

use crate::hough_lines::{self, LineParams};
use crate::types::{LineSegment, PipelineConfig};
use crate::{edge, morphology, threshold};

/// The two hand candidates picked from the ranked segments.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandCandidates {
    /// Longest segment.
    pub minute: Option<LineSegment>,
    /// Second-longest segment.
    pub hour: Option<LineSegment>,
}

/// Binarize, close and edge-detect a contrast-normalized image.
#[must_use = "returns the hand edge map"]
pub fn prepare_hand_edges(normalized: &GrayImage, config: &PipelineConfig) -> GrayImage {
    let binary = threshold::adaptive_threshold_inv(
        normalized,
        config.threshold_block_size,
        config.threshold_offset,
    );
    let closed = morphology::close(&binary, config.closing_iterations);
    let edges = edge::canny(&closed, config.canny_low, config.canny_high);
    tracing::debug!(
        edge_pixels = edge::count_edge_pixels(&edges),
        "hand edges prepared"
    );
    edges
}

/// Line-detection parameters from the pipeline configuration.
#[must_use]
pub fn line_params(config: &PipelineConfig) -> LineParams {
    LineParams {
        rho_resolution: config.line_rho_resolution,
        theta_resolution: config.line_theta_resolution.to_radians(),
        vote_threshold: config.line_vote_threshold,
        min_length: config.min_line_length,
        max_gap: config.max_line_gap,
    }
}

/// Detect segments in the hand edge map, longest first.
#[must_use]
pub fn detect_hand_segments(edges: &GrayImage, config: &PipelineConfig) -> Vec<LineSegment> {
    let mut segments = hough_lines::detect_segments(edges, &line_params(config));
    sort_by_length(&mut segments);
    segments
}

/// Sort by descending length. Equal lengths keep detection order.
pub fn sort_by_length(segments: &mut [LineSegment]) {
    segments.sort_by(|a, b| b.length().total_cmp(&a.length()));
}

/// Pick the minute and hour candidates from segments sorted longest first.
#[must_use]
pub fn select_hands(sorted: &[LineSegment]) -> HandCandidates {
    let hands = HandCandidates {
        minute: sorted.first().copied(),
        hour: sorted.get(1).copied(),
    };
    tracing::debug!(
        segments = sorted.len(),
        minute = ?hands.minute,
        hour = ?hands.hour,
        "hands selected"
    );
    hands
}
