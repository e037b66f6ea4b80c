//! Inward polygon offsetting.
//!
//! Produces the next front of a polygon: every ring moves toward the domain
//! by a distance sampled from the size function, so the outer ring shrinks
//! and holes grow.
//!
//! # Algorithm
//!
//! 1. Offset each edge along its left normal by
//!    `size(midpoint, depth) * height_ratio`. The default ratio `sin 60°` is
//!    the height of an equilateral triangle, so the strip between two fronts
//!    holds well-shaped triangles.
//! 2. Join consecutive offset edges with a miter, clamped to
//!    `miter_limit * d`. Reflex corners sharper than `round_angle` get a
//!    rounded arc instead.
//! 3. Split the raw ring at its self-intersections. Loops whose orientation
//!    flipped are swallowtails and are dropped, as are loops too small to
//!    hold an element.
//! 4. With holes, subtract the grown holes from the shrunk outer pieces with
//!    `i_overlay`, which resolves fronts that collide.
//!
//! An empty result means the front collapsed.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::offset::{offset_polygon, OffsetOptions};
//! use pavemesh::geometry::Polygon;
//! use pavemesh::size::ConstantSize;
//! use nalgebra::Point2;
//!
//! let square = Polygon::new(
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(10.0, 0.0),
//!         Point2::new(10.0, 10.0),
//!         Point2::new(0.0, 10.0),
//!     ],
//!     vec![],
//! );
//! let size = ConstantSize::new(1.0).unwrap();
//! let fronts = offset_polygon(&square, &size, 0, &OffsetOptions::default()).unwrap();
//! assert_eq!(fronts.len(), 1);
//! assert!(fronts[0].area() < square.area());
//! ```

use std::f64::consts::PI;

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Vector2};

use super::clean::{clean_ring, orient, split_self_intersections};
use crate::error::Result;
use crate::geometry::{interior_angle, point_in_ring, signed_area, tolerance_from_extents, Polygon};
use crate::size::SizeFunction;

/// Options for polygon offsetting.
#[derive(Debug, Clone)]
pub struct OffsetOptions {
    /// Offset distance as a fraction of the local size (default: sin 60°).
    pub height_ratio: f64,

    /// Maximum miter length as a multiple of the offset distance (default: 3).
    pub miter_limit: f64,

    /// Interior angle (radians) above which a reflex corner is rounded
    /// (default: 240°).
    pub round_angle: f64,

    /// Loops with area below `min_area_ratio * d²` collapse (default: 0.5).
    pub min_area_ratio: f64,
}

impl Default for OffsetOptions {
    fn default() -> Self {
        Self {
            height_ratio: (PI / 3.0).sin(),
            miter_limit: 3.0,
            round_angle: 4.0 * PI / 3.0,
            min_area_ratio: 0.5,
        }
    }
}

impl OffsetOptions {
    /// Set the offset height ratio.
    pub fn with_height_ratio(mut self, ratio: f64) -> Self {
        self.height_ratio = ratio.clamp(0.05, 2.0);
        self
    }

    /// Set the miter limit.
    pub fn with_miter_limit(mut self, limit: f64) -> Self {
        self.miter_limit = limit.max(1.0);
        self
    }

    /// Set the collapse area ratio.
    pub fn with_min_area_ratio(mut self, ratio: f64) -> Self {
        self.min_area_ratio = ratio.max(0.0);
        self
    }
}

/// Offset every ring of a polygon inward and return the resulting domains.
///
/// Each returned polygon has an outer ring (counter-clockwise) and holes
/// (clockwise), with strictly smaller area than `polygon`. An empty vector
/// means the front collapsed.
///
/// # Errors
///
/// Propagates size function errors.
pub fn offset_polygon<S: SizeFunction + ?Sized>(
    polygon: &Polygon,
    size: &S,
    depth: usize,
    options: &OffsetOptions,
) -> Result<Vec<Polygon>> {
    let parent_area = polygon.area();
    let tol = tolerance_from_extents(&polygon.outer);

    let (raw_outer, d_outer) = offset_ring(&polygon.outer, size, depth, options)?;
    let min_outer = options.min_area_ratio * d_outer * d_outer;
    let outers: Vec<Vec<Point2<f64>>> = split_self_intersections(&clean_ring(&raw_outer, tol), tol)
        .into_iter()
        .filter(|l| signed_area(l) > min_outer)
        .collect();
    if outers.is_empty() {
        return Ok(Vec::new());
    }

    let mut hole_pieces = Vec::new();
    for hole in &polygon.holes {
        let (raw, _) = offset_ring(hole, size, depth, options)?;
        hole_pieces.extend(
            split_self_intersections(&clean_ring(&raw, tol), tol)
                .into_iter()
                .filter(|l| signed_area(l) < 0.0),
        );
    }

    let domains = if hole_pieces.is_empty() {
        outers.into_iter().map(|o| Polygon::new(o, Vec::new())).collect()
    } else {
        subtract_holes(&outers, &hole_pieces, tol)
    };

    let children: Vec<Polygon> = domains
        .into_iter()
        .filter(|p| {
            let area = p.area();
            area > min_outer && area < parent_area
        })
        .collect();
    log::debug!(
        "offset at depth {}: {} ring(s) -> {} domain(s)",
        depth,
        polygon.holes.len() + 1,
        children.len()
    );
    Ok(children)
}

/// Offset a single ring to its left and return the raw (possibly
/// self-intersecting) ring with the mean offset distance.
pub fn offset_ring<S: SizeFunction + ?Sized>(
    ring: &[Point2<f64>],
    size: &S,
    depth: usize,
    options: &OffsetOptions,
) -> Result<(Vec<Point2<f64>>, f64)> {
    let n = ring.len();
    if n < 3 {
        return Ok((Vec::new(), 0.0));
    }

    let mut tangents = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    let mut dists = Vec::with_capacity(n);
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        let t = (b - a).try_normalize(0.0).unwrap_or_else(Vector2::x);
        tangents.push(t);
        normals.push(Vector2::new(-t.y, t.x));
        let mid = Point2::from((a.coords + b.coords) * 0.5);
        dists.push(size.size_at_depth(&mid, depth)? * options.height_ratio);
    }
    let mean_d = dists.iter().sum::<f64>() / n as f64;

    let mut out = Vec::with_capacity(n + n / 2);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let p = ring[i];
        let theta = interior_angle(&ring[prev], &p, &ring[(i + 1) % n]);
        let (d0, d1) = (dists[prev], dists[i]);

        if theta > options.round_angle {
            let a0 = normals[prev].y.atan2(normals[prev].x);
            // Normals turn clockwise through (theta - pi) at a reflex corner
            let sweep = theta - PI;
            let count = ((sweep / (PI / 3.0)).round() as usize + 1).max(2);
            for k in 0..count {
                let f = k as f64 / (count - 1) as f64;
                let angle = a0 - sweep * f;
                let r = d0 + (d1 - d0) * f;
                out.push(p + Vector2::new(angle.cos(), angle.sin()) * r);
            }
            continue;
        }

        let q0 = p + normals[prev] * d0;
        let q1 = p + normals[i] * d1;
        let denom = tangents[prev].perp(&tangents[i]);
        let miter = if denom.abs() < 1e-9 {
            Point2::from((q0.coords + q1.coords) * 0.5)
        } else {
            // q0 + s * t_prev = q1 + r * t_i
            let s = (q1 - q0).perp(&tangents[i]) / denom;
            q0 + tangents[prev] * s
        };
        let limit = options.miter_limit * d0.max(d1);
        let reach = (miter - p).norm();
        if reach > limit {
            out.push(p + (miter - p) * (limit / reach));
        } else {
            out.push(miter);
        }
    }
    Ok((out, mean_d))
}

/// `outers - holes` as normalized polygons.
fn subtract_holes(
    outers: &[Vec<Point2<f64>>],
    holes: &[Vec<Point2<f64>>],
    tol: f64,
) -> Vec<Polygon> {
    let subject: Vec<Vec<[f64; 2]>> = outers
        .iter()
        .map(|r| r.iter().map(|p| [p.x, p.y]).collect())
        .collect();
    // Holes are clockwise; reversed they describe the regions to remove
    let clip: Vec<Vec<[f64; 2]>> = holes
        .iter()
        .map(|r| r.iter().rev().map(|p| [p.x, p.y]).collect())
        .collect();

    let shapes = subject.overlay(&clip, OverlayRule::Difference, FillRule::NonZero);

    let mut result = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let mut contours = shape.into_iter().filter_map(|contour| {
            let ring: Vec<Point2<f64>> = contour.iter().map(|&[x, y]| Point2::new(x, y)).collect();
            let ring = clean_ring(&ring, tol);
            (ring.len() >= 3).then_some(ring)
        });
        let Some(outer) = contours.next() else {
            continue;
        };
        let outer = orient(outer, true);
        let holes: Vec<Vec<Point2<f64>>> = contours
            .map(|h| orient(h, false))
            .filter(|h| point_in_ring(&outer, &h[0]))
            .collect();
        result.push(Polygon::new(outer, holes));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::ConstantSize;
    use approx::assert_relative_eq;

    fn rect(x0: f64, y0: f64, w: f64, h: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + w, y0),
            Point2::new(x0 + w, y0 + h),
            Point2::new(x0, y0 + h),
        ]
    }

    #[test]
    fn test_square_shrinks_by_height() {
        let poly = Polygon::new(rect(0.0, 0.0, 10.0, 10.0), vec![]);
        let size = ConstantSize::new(1.0).unwrap();
        let fronts = offset_polygon(&poly, &size, 0, &OffsetOptions::default()).unwrap();
        assert_eq!(fronts.len(), 1);
        let d = (PI / 3.0).sin();
        let side = 10.0 - 2.0 * d;
        assert_relative_eq!(fronts[0].area(), side * side, epsilon = 1e-9);
    }

    #[test]
    fn test_thin_strip_collapses() {
        let poly = Polygon::new(rect(0.0, 0.0, 10.0, 1.0), vec![]);
        let size = ConstantSize::new(1.0).unwrap();
        let fronts = offset_polygon(&poly, &size, 0, &OffsetOptions::default()).unwrap();
        assert!(fronts.is_empty());
    }

    #[test]
    fn test_dumbbell_splits() {
        // Two 4x4 squares joined by a 0.5-wide neck
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 1.75),
            Point2::new(6.0, 1.75),
            Point2::new(6.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 4.0),
            Point2::new(6.0, 4.0),
            Point2::new(6.0, 2.25),
            Point2::new(4.0, 2.25),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let poly = Polygon::new(outer, vec![]);
        let size = ConstantSize::new(0.6).unwrap();
        let fronts = offset_polygon(&poly, &size, 0, &OffsetOptions::default()).unwrap();
        assert_eq!(fronts.len(), 2);
        for f in &fronts {
            assert!(signed_area(&f.outer) > 0.0);
        }
    }

    #[test]
    fn test_hole_grows() {
        let mut hole = rect(4.0, 4.0, 2.0, 2.0);
        hole.reverse();
        let poly = Polygon::new(rect(0.0, 0.0, 10.0, 10.0), vec![hole]);
        let size = ConstantSize::new(0.5).unwrap();
        let fronts = offset_polygon(&poly, &size, 0, &OffsetOptions::default()).unwrap();
        assert_eq!(fronts.len(), 1);
        assert_eq!(fronts[0].holes.len(), 1);
        assert!(signed_area(&fronts[0].holes[0]) < -4.0);
        assert!(fronts[0].area() < poly.area());
    }

    #[test]
    fn test_monotonic_shrink() {
        let mut hole = rect(3.0, 3.0, 1.0, 1.0);
        hole.reverse();
        let mut current = vec![Polygon::new(rect(0.0, 0.0, 8.0, 6.0), vec![hole])];
        let size = ConstantSize::new(0.7).unwrap();
        let mut depth = 0;
        while !current.is_empty() && depth < 50 {
            let mut next = Vec::new();
            for poly in &current {
                for child in offset_polygon(poly, &size, depth, &OffsetOptions::default()).unwrap() {
                    assert!(child.area() < poly.area());
                    next.push(child);
                }
            }
            current = next;
            depth += 1;
        }
        assert!(current.is_empty());
    }

    #[test]
    fn test_reflex_corner_rounded() {
        // A notch with a 270 degree interior corner at (2, 2)
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let size = ConstantSize::new(0.5).unwrap();
        let (raw, _) = offset_ring(&outer, &size, 0, &OffsetOptions::default()).unwrap();
        // Five mitered corners and a three point arc
        assert_eq!(raw.len(), 8);
        let d = 0.5 * (PI / 3.0).sin();
        for p in &raw[3..6] {
            assert_relative_eq!((p - Point2::new(2.0, 2.0)).norm(), d, epsilon = 1e-12);
        }
    }
}
