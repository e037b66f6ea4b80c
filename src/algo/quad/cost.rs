//! Cost of merging two triangles into a quad.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use nalgebra::Point2;

use crate::geometry::interior_angle;

/// Cost of a candidate quad given its four counter-clockwise corners.
///
/// Lower is better; `0` is a square.
pub type QuadCost = Arc<dyn Fn(&[Point2<f64>; 4]) -> f64 + Send + Sync>;

/// Default cost: `0.75 · angle deviation + 0.25 · (1 − min side / max side)`.
///
/// The angle deviation is the largest `|θ − 90°| / 90°` over the corners.
///
/// # Example
///
/// ```
/// use pavemesh::algo::quad::cost::default_cost;
/// use nalgebra::Point2;
///
/// let square = [
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(1.0, 1.0),
///     Point2::new(0.0, 1.0),
/// ];
/// assert!(default_cost(&square).abs() < 1e-12);
/// ```
pub fn default_cost(corners: &[Point2<f64>; 4]) -> f64 {
    0.75 * angle_deviation(corners) + 0.25 * (1.0 - side_ratio(corners))
}

/// Largest corner deviation from a right angle, normalized by 90°.
pub fn angle_deviation(corners: &[Point2<f64>; 4]) -> f64 {
    (0..4)
        .map(|i| {
            let angle = interior_angle(&corners[(i + 3) % 4], &corners[i], &corners[(i + 1) % 4]);
            (angle - FRAC_PI_2).abs() / FRAC_PI_2
        })
        .fold(0.0, f64::max)
}

/// Shortest side over longest side.
pub fn side_ratio(corners: &[Point2<f64>; 4]) -> f64 {
    let sides = (0..4).map(|i| (corners[(i + 1) % 4] - corners[i]).norm());
    let (lo, hi) = sides.fold((f64::INFINITY, 0.0_f64), |(lo, hi), s| (lo.min(s), hi.max(s)));
    if hi > 0.0 {
        lo / hi
    } else {
        0.0
    }
}

/// Matching weight of a cost: `round((2 − cost) · 1000)`.
pub(crate) fn weight(cost: f64) -> i64 {
    ((2.0 - cost) * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangle_cost() {
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_relative_eq!(angle_deviation(&rect), 0.0, epsilon = 1e-12);
        assert_relative_eq!(default_cost(&rect), 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_rhombus_cost() {
        // 60° and 120° corners deviate by a third of a right angle
        let h = 3.0_f64.sqrt() / 2.0;
        let rhombus = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.5, h),
            Point2::new(0.5, h),
        ];
        assert_relative_eq!(angle_deviation(&rhombus), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(default_cost(&rhombus), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_weight_prefers_low_cost() {
        assert_eq!(weight(0.0), 2000);
        assert_eq!(weight(0.8), 1200);
        assert!(weight(0.1) > weight(0.2));
    }
}
