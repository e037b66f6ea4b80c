//! Element shape quality.
//!
//! Both measures are normalized to `[0, 1]`: 1 for an equilateral triangle
//! or a rectangle-angled quad, 0 (or below) for degenerate and inverted
//! cells.

use std::f64::consts::FRAC_PI_2;

use nalgebra::Point2;

use crate::geometry::{interior_angle, triangle_area};

/// Normalized area-to-edge-length ratio `4√3 A / (l0² + l1² + l2²)`.
///
/// Negative for inverted triangles.
pub fn triangle_quality(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let sum_sq = (b - a).norm_squared() + (c - b).norm_squared() + (a - c).norm_squared();
    if sum_sq == 0.0 {
        return 0.0;
    }
    4.0 * 3.0_f64.sqrt() * triangle_area(a, b, c) / sum_sq
}

/// Worst corner-angle deviation from 90°, mapped so that a right-angled quad
/// scores 1 and a quad with a straight (or reflex) corner scores 0.
pub fn quad_quality(corners: &[Point2<f64>; 4]) -> f64 {
    let mut worst: f64 = 0.0;
    for i in 0..4 {
        let prev = &corners[(i + 3) % 4];
        let next = &corners[(i + 1) % 4];
        let angle = interior_angle(prev, &corners[i], next);
        worst = worst.max((angle - FRAC_PI_2).abs());
    }
    (1.0 - worst / FRAC_PI_2).max(0.0)
}

/// Quality of a triangle or quad given by its corners.
pub fn cell_quality(corners: &[Point2<f64>]) -> f64 {
    match corners {
        [a, b, c] => triangle_quality(a, b, c),
        [a, b, c, d] => quad_quality(&[*a, *b, *c, *d]),
        _ => 0.0,
    }
}

/// Summary statistics of cell quality over a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySummary {
    /// Worst cell quality (1.0 for an empty mesh).
    pub min: f64,
    /// Mean cell quality.
    pub mean: f64,
    /// Number of cells measured.
    pub count: usize,
}

impl QualitySummary {
    /// Summarize a sequence of quality values.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut min = 1.0_f64;
        let mut sum = 0.0;
        let mut count = 0;
        for q in values {
            min = min.min(q);
            sum += q;
            count += 1;
        }
        Self {
            min,
            mean: if count > 0 { sum / count as f64 } else { 1.0 },
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equilateral_is_one() {
        let q = triangle_quality(
            &Point2::new(0.0, 0.0),
            &Point2::new(1.0, 0.0),
            &Point2::new(0.5, 3.0_f64.sqrt() / 2.0),
        );
        assert_relative_eq!(q, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_triangle_negative() {
        let q = triangle_quality(
            &Point2::new(0.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Point2::new(1.0, 0.0),
        );
        assert!(q < 0.0);
    }

    #[test]
    fn test_quad_quality() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_relative_eq!(quad_quality(&square), 1.0, epsilon = 1e-12);

        // Rhombus with 60/120 degree corners
        let s = 3.0_f64.sqrt() / 2.0;
        let rhombus = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.5, s),
            Point2::new(0.5, s),
        ];
        assert_relative_eq!(quad_quality(&rhombus), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summary() {
        let s = QualitySummary::from_values([0.5, 1.0]);
        assert_relative_eq!(s.min, 0.5);
        assert_relative_eq!(s.mean, 0.75);
        assert_eq!(s.count, 2);
    }
}
