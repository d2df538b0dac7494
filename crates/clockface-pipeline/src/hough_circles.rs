//! Gradient Hough transform for circles.
//!
//! Every edge pixel with a non-zero gradient votes for possible centers
//! along its gradient line, in both directions, at every distance in
//! `[min_radius, max_radius]`. Real circles make these rays converge, so
//! their centers show up as peaks in a (possibly coarser, `dp`) accumulator.
//!
//! Peaks are visited from the strongest down. A peak too close to an
//! already accepted center is skipped, before and after refinement. For
//! the rest, the distances from the peak to all edge pixels are binned,
//! and the bin with the best support per unit radius gives the circle's
//! radius. The circle is accepted when that bin holds more than
//! `accumulator_threshold` pixels.
//!
//! Gradient directions on a digitized ring are coarse, so the strongest
//! accumulator cells cluster around the true center rather than on it.
//! Each accepted circle is therefore refined by a least-squares fit to the
//! edge pixels lying near it.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::edge;
use crate::types::{Circle, Point};

/// Parameters for circle detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    /// Inverse accumulator resolution: 1.0 is full resolution, 2.0 half.
    pub dp: f32,
    /// Minimum distance between accepted centers, in pixels.
    pub min_distance: f32,
    /// High threshold of the internal Canny pass (the low one is half).
    pub canny_high: f32,
    /// Votes a center needs, and the minimum radius support.
    pub accumulator_threshold: u32,
    /// Smallest radius considered.
    pub min_radius: u32,
    /// Largest radius considered; 0 means the larger image dimension.
    pub max_radius: u32,
}

/// A detected circle with its evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCandidate {
    /// Center and radius in input-image coordinates.
    pub circle: Circle,
    /// Accumulator votes at the center.
    pub votes: u32,
    /// Edge pixels in the winning radius bin.
    pub support: u32,
}

/// Half-width, in pixels, of the band around a circle whose edge pixels
/// feed the least-squares refinement.
const REFINE_BAND: f64 = 6.0;
/// Fit, reselect, refit.
const REFINE_ITERATIONS: usize = 3;

/// Detect circles, strongest center first.
#[must_use]
pub fn detect_circles(image: &GrayImage, params: &CircleParams) -> Vec<CircleCandidate> {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 || !(params.dp >= 1.0) {
        return Vec::new();
    }

    let edges = edge::canny(image, params.canny_high / 2.0, params.canny_high);
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);

    let dp = f64::from(params.dp);
    let idp = 1.0 / dp;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cols = (f64::from(w) * idp).ceil() as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rows = (f64::from(h) * idp).ceil() as usize;
    // One cell of padding on every side keeps the peak test branch-free.
    let stride = cols + 2;
    #[allow(clippy::cast_precision_loss)]
    let (cols_f, rows_f) = (cols as f64, rows as f64);
    let mut acc = vec![0u32; stride * (rows + 2)];

    let min_r = params.min_radius;
    let max_r = if params.max_radius == 0 {
        w.max(h)
    } else {
        params.max_radius
    };

    let mut points = Vec::new();
    for (x, y, p) in edges.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        let vx = f64::from(gx.get_pixel(x, y).0[0]);
        let vy = f64::from(gy.get_pixel(x, y).0[0]);
        let mag = vx.hypot(vy);
        if mag < f64::EPSILON {
            continue;
        }

        let (px, py) = (f64::from(x), f64::from(y));
        points.push(Point::new(px, py));

        let (ux, uy) = (vx / mag * idp, vy / mag * idp);
        let (ax, ay) = (px * idp, py * idp);
        for sign in [1.0, -1.0] {
            for r in min_r..=max_r {
                let r = f64::from(r) * sign;
                let cx = ux.mul_add(r, ax);
                let cy = uy.mul_add(r, ay);
                if cx < 0.0 || cy < 0.0 || cx >= cols_f || cy >= rows_f {
                    break;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let cell = (cy as usize + 1) * stride + cx as usize + 1;
                acc[cell] += 1;
            }
        }
    }

    // Local maxima above threshold; ties broken toward the top-left cell.
    let mut centers = Vec::new();
    for row in 1..=rows {
        for col in 1..=cols {
            let base = row * stride + col;
            let v = acc[base];
            if v > params.accumulator_threshold
                && v > acc[base - 1]
                && v >= acc[base + 1]
                && v > acc[base - stride]
                && v >= acc[base + stride]
            {
                centers.push((base, v));
            }
        }
    }
    centers.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    tracing::debug!(
        edge_points = points.len(),
        centers = centers.len(),
        "circle accumulator filled"
    );

    let min_dist = f64::from(params.min_distance);
    let (min_r2, max_r2) = (f64::from(min_r).powi(2), f64::from(max_r).powi(2));
    let mut found: Vec<CircleCandidate> = Vec::new();

    for (base, votes) in centers {
        let (row, col) = (base / stride, base % stride);
        #[allow(clippy::cast_precision_loss)]
        let center = Point::new((col as f64 - 0.5) * dp, (row as f64 - 0.5) * dp);
        let crowded = |p: Point| found.iter().any(|c| c.circle.center.distance(p) < min_dist);
        if crowded(center) {
            continue;
        }

        let mut distances: Vec<f64> = points
            .iter()
            .map(|p| (p.x - center.x).powi(2) + (p.y - center.y).powi(2))
            .filter(|d2| (min_r2..=max_r2).contains(d2))
            .map(f64::sqrt)
            .collect();
        distances.sort_by(f64::total_cmp);

        let Some((radius, support)) = best_radius(&distances, dp) else {
            continue;
        };
        if support <= params.accumulator_threshold {
            continue;
        }
        let coarse = Circle::new(center, radius);
        let circle = refine_circle(&points, coarse, support)
            .filter(|c| (f64::from(min_r)..=f64::from(max_r)).contains(&c.radius))
            .unwrap_or(coarse);
        // Refinement can move a center next to one already accepted.
        if crowded(circle.center) {
            continue;
        }
        found.push(CircleCandidate {
            circle,
            votes,
            support,
        });
    }

    tracing::debug!(circles = found.len(), "circle detection complete");
    found
}

/// Move a coarse circle onto the edge pixels around it.
///
/// Pixels within [`REFINE_BAND`] of the circle are fitted, and the fit is
/// repeated on the pixels near the new circle. The result is kept only if
/// its band holds at least `support` pixels. Returns `None` when a fit is
/// degenerate or the evidence does not hold up.
fn refine_circle(points: &[Point], coarse: Circle, support: u32) -> Option<Circle> {
    let mut current = coarse;
    for _ in 0..REFINE_ITERATIONS {
        current = fit_circle(&near_circle(points, current))?;
    }
    let kept = u32::try_from(near_circle(points, current).len()).unwrap_or(u32::MAX);
    (kept >= support).then_some(current)
}

/// Points within [`REFINE_BAND`] of the circle's rim.
fn near_circle(points: &[Point], circle: Circle) -> Vec<Point> {
    points
        .iter()
        .copied()
        .filter(|p| (p.distance(circle.center) - circle.radius).abs() <= REFINE_BAND)
        .collect()
}

/// Algebraic least-squares circle through `points`.
///
/// Minimizes `sum((x^2 + y^2 + D*x + E*y + F)^2)` on centroid-relative
/// coordinates, where the system reduces to 2x2. Returns `None` for fewer
/// than three points or a (near) collinear set.
fn fit_circle(points: &[Point]) -> Option<Circle> {
    if points.len() < 3 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (mut suu, mut suv, mut svv) = (0.0, 0.0, 0.0);
    let (mut suz, mut svz, mut sz) = (0.0, 0.0, 0.0);
    for p in points {
        let (u, v) = (p.x - mx, p.y - my);
        let z = u.mul_add(u, v * v);
        suu += u * u;
        suv += u * v;
        svv += v * v;
        suz += u * z;
        svz += v * z;
        sz += z;
    }

    let det = suu.mul_add(svv, -(suv * suv));
    if det.abs() <= 1e-9 * suu * svv {
        return None;
    }
    let d = suv.mul_add(svz, -(suz * svv)) / det;
    let e = suv.mul_add(suz, -(svz * suu)) / det;

    let (cu, cv) = (-d / 2.0, -e / 2.0);
    let radius = cu.mul_add(cu, cv.mul_add(cv, sz / n)).sqrt();
    Some(Circle::new(Point::new(cu + mx, cv + my), radius))
}

/// Pick the radius from sorted center-to-edge distances.
///
/// Distances are grouped into runs no wider than `bin_width`. The run with
/// the most pixels per unit radius wins (later runs win ties), and its
/// median distance is the radius. Returns `(radius, pixel count)`.
fn best_radius(sorted: &[f64], bin_width: f64) -> Option<(f64, u32)> {
    if sorted.is_empty() {
        return None;
    }

    let mut best: Option<(f64, usize)> = None;
    let mut consider = |count: usize, r: f64| {
        #[allow(clippy::cast_precision_loss)]
        let better = best.is_none_or(|(best_r, best_count)| {
            count as f64 * best_r >= best_count as f64 * r
        });
        if better {
            best = Some((r, count));
        }
    };

    let mut start = 0;
    for j in 1..sorted.len() {
        if sorted[j] - sorted[start] > bin_width {
            consider(j - start, sorted[(start + j) / 2]);
            start = j;
        }
    }
    consider(sorted.len() - start, sorted[(start + sorted.len()) / 2]);

    best.map(|(r, count)| (r, u32::try_from(count).unwrap_or(u32::MAX)))
}
