//! Progressive probabilistic Hough transform for line segments.
//!
//! Edge pixels are visited one at a time in raster order. Each visited
//! pixel votes into a `(theta, rho)` accumulator. As soon as the pixel's
//! strongest bin reaches the vote threshold, the line through it is walked
//! in both directions along the bin's orientation, bridging gaps of at most
//! `max_gap` pixels. Every pixel on the walked run is removed from further
//! consideration; if the run is long enough it becomes a segment and its
//! pixels withdraw their votes so they cannot support another line.
//!
//! Raster order keeps the detector deterministic: the same edge map always
//! yields the same segments in the same order.

use std::f32::consts::PI;

use image::GrayImage;

use crate::types::LineSegment;

/// Fixed-point shift used while stepping along a line.
const SHIFT: u32 = 16;

/// Accumulator and walk parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    /// Distance resolution in pixels.
    pub rho_resolution: f32,
    /// Angle resolution in radians.
    pub theta_resolution: f32,
    /// Minimum votes before a line is walked.
    pub vote_threshold: u32,
    /// Minimum extent of a segment along x or y, in pixels.
    pub min_length: u32,
    /// Maximum run of missing pixels bridged during the walk.
    pub max_gap: u32,
}

/// Precomputed accumulator geometry.
struct Accumulator {
    votes: Vec<i32>,
    cos: Vec<f32>,
    sin: Vec<f32>,
    num_rho: usize,
    rho_offset: i32,
}

impl Accumulator {
    fn new(width: u32, height: u32, params: &LineParams) -> Self {
        let irho = 1.0 / params.rho_resolution;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let num_angle = ((PI / params.theta_resolution).round() as usize).max(1);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let num_rho = ((f64::from(width + height) * 2.0 + 1.0) / f64::from(params.rho_resolution))
            .round() as usize;

        let (cos, sin) = (0..num_angle)
            .map(|n| {
                #[allow(clippy::cast_precision_loss)]
                let theta = n as f32 * params.theta_resolution;
                (theta.cos() * irho, theta.sin() * irho)
            })
            .unzip();

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let rho_offset = (num_rho as i32 - 1) / 2;
        Self {
            votes: vec![0; num_angle * num_rho],
            cos,
            sin,
            num_rho,
            rho_offset,
        }
    }

    fn bins(&self, x: u32, y: u32) -> impl Iterator<Item = usize> + '_ {
        #[allow(clippy::cast_precision_loss)]
        let (xf, yf) = (x as f32, y as f32);
        self.cos
            .iter()
            .zip(self.sin.iter())
            .enumerate()
            .filter_map(move |(n, (&c, &s))| {
                #[allow(clippy::cast_possible_truncation)]
                let r = xf.mul_add(c, yf * s).round() as i32 + self.rho_offset;
                usize::try_from(r)
                    .ok()
                    .filter(|&r| r < self.num_rho)
                    .map(|r| n * self.num_rho + r)
            })
    }

    /// Add one vote per angle for `(x, y)`; return the best angle index and
    /// its vote count.
    fn vote(&mut self, x: u32, y: u32) -> (usize, i32) {
        let bins: Vec<usize> = self.bins(x, y).collect();
        let mut best = (0, i32::MIN);
        for bin in bins {
            self.votes[bin] += 1;
            if self.votes[bin] > best.1 {
                best = (bin / self.num_rho, self.votes[bin]);
            }
        }
        best
    }

    fn unvote(&mut self, x: u32, y: u32) {
        let bins: Vec<usize> = self.bins(x, y).collect();
        for bin in bins {
            self.votes[bin] -= 1;
        }
    }
}

/// A fixed-point stepper along a line, advancing one pixel along the
/// dominant axis per step.
#[derive(Clone, Copy)]
struct Walker {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    along_x: bool,
}

impl Walker {
    fn pixel(&self) -> (i64, i64) {
        if self.along_x {
            (self.x, self.y >> SHIFT)
        } else {
            (self.x >> SHIFT, self.y)
        }
    }

    const fn step(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }

    const fn reversed(mut self) -> Self {
        self.dx = -self.dx;
        self.dy = -self.dy;
        self
    }
}

/// Detect line segments in a binary edge map (non-zero = edge).
///
/// Segments are returned in detection order.
#[must_use]
pub fn detect_segments(edges: &GrayImage, params: &LineParams) -> Vec<LineSegment> {
    let (w, h) = edges.dimensions();
    if w == 0 || h == 0 || params.rho_resolution <= 0.0 || params.theta_resolution <= 0.0 {
        return Vec::new();
    }

    let stride = w as usize;
    let mut pending: Vec<bool> = edges.pixels().map(|p| p.0[0] != 0).collect();
    let mut voted = vec![false; pending.len()];
    let mut acc = Accumulator::new(w, h, params);
    let threshold = i32::try_from(params.vote_threshold).unwrap_or(i32::MAX);
    let min_length = i64::from(params.min_length);
    let (wi, hi) = (i64::from(w), i64::from(h));
    let in_bounds = |(x, y): (i64, i64)| x >= 0 && y >= 0 && x < wi && y < hi;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let index = |(x, y): (i64, i64)| y as usize * stride + x as usize;

    let mut segments = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y as usize * stride + x as usize;
            if !pending[idx] {
                continue;
            }

            let (best_angle, best_votes) = acc.vote(x, y);
            voted[idx] = true;
            if best_votes < threshold {
                continue;
            }

            // Direction along the line is perpendicular to its normal.
            let a = -acc.sin[best_angle];
            let b = acc.cos[best_angle];
            let origin = walker_from(x, y, a, b);

            // Find the run's two ends, bridging gaps up to max_gap.
            let mut ends = [(i64::from(x), i64::from(y)); 2];
            for (k, end) in ends.iter_mut().enumerate() {
                let mut walker = if k == 0 { origin } else { origin.reversed() };
                let mut gap = 0;
                loop {
                    let p = walker.pixel();
                    if !in_bounds(p) {
                        break;
                    }
                    if pending[index(p)] {
                        gap = 0;
                        *end = p;
                    } else {
                        gap += 1;
                        if gap > params.max_gap {
                            break;
                        }
                    }
                    walker.step();
                }
            }

            let good = (ends[1].0 - ends[0].0).abs() >= min_length
                || (ends[1].1 - ends[0].1).abs() >= min_length;

            // Consume the run; a kept segment also withdraws its votes.
            for (k, &end) in ends.iter().enumerate() {
                let mut walker = if k == 0 { origin } else { origin.reversed() };
                loop {
                    let p = walker.pixel();
                    if !in_bounds(p) {
                        break;
                    }
                    let i = index(p);
                    if pending[i] {
                        if good && voted[i] {
                            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                            let (px, py) = (p.0 as u32, p.1 as u32);
                            acc.unvote(px, py);
                            voted[i] = false;
                        }
                        pending[i] = false;
                    }
                    if p == end {
                        break;
                    }
                    walker.step();
                }
            }

            if good {
                #[allow(clippy::cast_possible_truncation)]
                let segment = LineSegment::from_coords(
                    ends[0].0 as i32,
                    ends[0].1 as i32,
                    ends[1].0 as i32,
                    ends[1].1 as i32,
                );
                segments.push(segment);
            }
        }
    }

    tracing::debug!(segments = segments.len(), "line detection complete");
    segments
}

/// Build the stepper for direction `(a, b)` starting at pixel `(x, y)`.
#[allow(clippy::cast_possible_truncation)]
fn walker_from(x: u32, y: u32, a: f32, b: f32) -> Walker {
    let one = f64::from(1u32 << SHIFT);
    let half = 1i64 << (SHIFT - 1);
    let (x, y) = (i64::from(x), i64::from(y));
    let (a, b) = (f64::from(a), f64::from(b));

    if a.abs() > b.abs() {
        Walker {
            x,
            y: (y << SHIFT) + half,
            dx: if a > 0.0 { 1 } else { -1 },
            dy: (b * one / a.abs()).round() as i64,
            along_x: true,
        }
    } else {
        Walker {
            x: (x << SHIFT) + half,
            y,
            dx: (a * one / b.abs()).round() as i64,
            dy: if b > 0.0 { 1 } else { -1 },
            along_x: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn default_params() -> LineParams {
        LineParams {
            rho_resolution: 1.0,
            theta_resolution: PI / 180.0,
            vote_threshold: 50,
            min_length: 30,
            max_gap: 10,
        }
    }

    fn canvas() -> GrayImage {
        GrayImage::new(200, 200)
    }

    fn span(seg: &LineSegment) -> (f64, f64) {
        (
            (seg.end().x - seg.start().x).abs(),
            (seg.end().y - seg.start().y).abs(),
        )
    }

    #[test]
    fn empty_map_has_no_segments() {
        assert!(detect_segments(&canvas(), &default_params()).is_empty());
    }

    #[test]
    fn horizontal_line_is_one_segment() {
        let mut img = canvas();
        for x in 40..=160 {
            img.put_pixel(x, 100, Luma([255]));
        }
        let segments = detect_segments(&img, &default_params());
        assert_eq!(segments.len(), 1, "got {segments:?}");
        let s = segments[0];
        let xs = (s.start().x.min(s.end().x), s.start().x.max(s.end().x));
        assert_eq!(xs, (40.0, 160.0));
        assert!((s.start().y - 100.0).abs() < f64::EPSILON);
        assert!((s.end().y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vertical_line_is_one_segment() {
        let mut img = canvas();
        for y in 20..=120 {
            img.put_pixel(70, y, Luma([255]));
        }
        let segments = detect_segments(&img, &default_params());
        assert_eq!(segments.len(), 1, "got {segments:?}");
        let (dx, dy) = span(&segments[0]);
        assert!(dx < 1.0);
        assert!((dy - 100.0).abs() < 1.0, "dy = {dy}");
    }

    #[test]
    fn small_gap_is_bridged() {
        let mut img = canvas();
        for x in (20..=80).chain(86..=150) {
            img.put_pixel(x, 60, Luma([255]));
        }
        let segments = detect_segments(&img, &default_params());
        assert_eq!(segments.len(), 1, "got {segments:?}");
        assert!((segments[0].length() - 130.0).abs() < 1.0);
    }

    #[test]
    fn short_line_is_rejected() {
        let mut img = canvas();
        for x in 10..=35 {
            img.put_pixel(x, 10, Luma([255]));
        }
        assert!(detect_segments(&img, &default_params()).is_empty());
    }

    #[test]
    fn diagonal_line_is_detected() {
        let mut img = canvas();
        for i in 30..=150 {
            img.put_pixel(i, i, Luma([255]));
        }
        let segments = detect_segments(&img, &default_params());
        assert!(!segments.is_empty());
        let (dx, dy) = span(&segments[0]);
        assert!(dx > 90.0 && dy > 90.0, "span ({dx}, {dy})");
        assert!((dx - dy).abs() < 3.0);
    }

    #[test]
    fn two_crossing_lines_are_both_found() {
        let mut img = canvas();
        for x in 30..=170 {
            img.put_pixel(x, 100, Luma([255]));
        }
        for y in 30..=170 {
            img.put_pixel(100, y, Luma([255]));
        }
        let segments = detect_segments(&img, &default_params());
        let horizontal = segments.iter().any(|s| {
            let (dx, dy) = span(s);
            dx > 60.0 && dy < 1.0
        });
        let vertical = segments.iter().any(|s| {
            let (dx, dy) = span(s);
            dy > 60.0 && dx < 1.0
        });
        assert!(horizontal && vertical, "got {segments:?}");
    }

    #[test]
    fn detection_is_deterministic() {
        let mut img = canvas();
        for i in 20..=180 {
            img.put_pixel(i, 200 - i, Luma([255]));
            img.put_pixel(i, 50, Luma([255]));
        }
        let params = default_params();
        assert_eq!(
            detect_segments(&img, &params),
            detect_segments(&img, &params)
        );
    }
}
