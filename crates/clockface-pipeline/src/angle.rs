//! Hand bearings.
//!
//! A hand's tip is the segment endpoint farther from the face center. Its
//! bearing is measured clockwise from 12 o'clock, in degrees.

use std::cmp::Ordering;

use crate::types::{HandAngle, LineSegment, Point};

/// The endpoint of `segment` farther from `center`.
///
/// When both endpoints are exactly as far, the one with the larger
/// `(x, y)` wins, so the result does not depend on endpoint order.
#[must_use]
pub fn hand_tip(segment: &LineSegment, center: Point) -> Point {
    let (a, b) = (segment.start(), segment.end());
    match a.distance(center).total_cmp(&b.distance(center)) {
        Ordering::Greater => a,
        Ordering::Less => b,
        Ordering::Equal => match a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)) {
            Ordering::Less => b,
            Ordering::Equal | Ordering::Greater => a,
        },
    }
}

/// Clockwise bearing of the hand's tip from 12 o'clock.
///
/// `raw` is the standard counter-clockwise angle from east with image y
/// flipped up; the bearing is `(360 - ((raw + 360) mod 360) + 90) mod 360`.
/// Returns `None` only for non-finite coordinates.
#[must_use]
pub fn hand_angle(segment: &LineSegment, center: Point) -> Option<HandAngle> {
    let tip = hand_tip(segment, center);
    let raw = (center.y - tip.y).atan2(tip.x - center.x).to_degrees();
    let bearing = (360.0 - (raw + 360.0) % 360.0 + 90.0) % 360.0;
    HandAngle::from_degrees(bearing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CENTER: Point = Point::new(100.0, 100.0);

    fn bearing(x1: i32, y1: i32, x2: i32, y2: i32) -> f64 {
        hand_angle(&LineSegment::from_coords(x1, y1, x2, y2), CENTER)
            .unwrap()
            .degrees()
    }

    #[test]
    fn cardinal_directions() {
        assert!(bearing(100, 95, 100, 40).abs() < 1e-9);
        assert!((bearing(105, 100, 160, 100) - 90.0).abs() < 1e-9);
        assert!((bearing(100, 105, 100, 160) - 180.0).abs() < 1e-9);
        assert!((bearing(95, 100, 40, 100) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn diagonal_bearings() {
        assert!((bearing(100, 100, 150, 50) - 45.0).abs() < 1e-9);
        assert!((bearing(100, 100, 50, 150) - 225.0).abs() < 1e-9);
        assert!((bearing(100, 100, 50, 50) - 315.0).abs() < 1e-9);
    }

    #[test]
    fn endpoint_order_does_not_matter() {
        let cases = [
            LineSegment::from_coords(100, 95, 100, 40),
            LineSegment::from_coords(103, 97, 170, 61),
            LineSegment::from_coords(90, 100, 110, 100),
            LineSegment::from_coords(100, 80, 100, 120),
            LineSegment::from_coords(20, 30, 140, 90),
        ];
        for s in cases {
            assert_eq!(
                hand_angle(&s, CENTER),
                hand_angle(&s.reversed(), CENTER),
                "{s:?}"
            );
        }
    }

    #[test]
    fn equidistant_endpoints_pick_larger_coordinate() {
        let s = LineSegment::from_coords(90, 100, 110, 100);
        assert_eq!(hand_tip(&s, CENTER), Point::new(110.0, 100.0));
        assert_eq!(hand_tip(&s.reversed(), CENTER), Point::new(110.0, 100.0));

        let s = LineSegment::from_coords(100, 80, 100, 120);
        assert_eq!(hand_tip(&s, CENTER), Point::new(100.0, 120.0));
    }

    #[test]
    fn bearing_is_always_in_range() {
        for deg in 0..720 {
            let t = f64::from(deg).to_radians();
            let x = 100.0 + 50.0 * t.cos();
            let y = 100.0 + 50.0 * t.sin();
            let s = LineSegment::new(CENTER, Point::new(x, y));
            let a = hand_angle(&s, CENTER).unwrap().degrees();
            assert!((0.0..360.0).contains(&a), "{deg}: {a}");
        }
    }

    #[test]
    fn non_finite_center_has_no_bearing() {
        let s = LineSegment::from_coords(0, 0, 10, 10);
        assert!(hand_angle(&s, Point::new(f64::NAN, 0.0)).is_none());
    }
}
