//! Polygon cleaning.
//!
//! Normalizes raw polygon input so every later stage can rely on simple,
//! consistently oriented rings:
//!
//! 1. Drop a repeated closing point and merge consecutive near-duplicates.
//! 2. Remove zero-width spikes (the path doubling back on itself).
//! 3. Orient the outer ring counter-clockwise and holes clockwise.
//! 4. Split self-intersecting rings into simple loops and discard slivers.
//! 5. Rotate each ring to start at its lowest-left vertex.
//!
//! [`split_self_intersections`] is also used by the offsetter, whose raw
//! offset rings self-intersect at concave features.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::clean::{clean_polygon, CleanOptions};
//! use pavemesh::geometry::{signed_area, Polygon};
//! use nalgebra::Point2;
//!
//! // Clockwise square with a repeated closing point
//! let outer = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(0.0, 1.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(0.0, 0.0),
//! ];
//! let cleaned = clean_polygon(&Polygon::new(outer, vec![]), &CleanOptions::default()).unwrap();
//! assert_eq!(cleaned.polygon.outer.len(), 4);
//! assert!(signed_area(&cleaned.polygon.outer) > 0.0);
//! ```

use std::collections::HashMap;

use nalgebra::Point2;

use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::{MeshError, Result};
use crate::geometry::{
    cross, lex_less, point_in_ring, segment_intersection, signed_area, tolerance_from_extents,
    Bounds, Polygon,
};
use crate::spatial::{PointMerger, SegmentIndex};

/// Options for polygon cleaning.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Distance below which points are merged. `None` derives it from the
    /// polygon extents.
    pub tolerance: Option<f64>,

    /// Loops with area below this fraction of the squared extents diagonal
    /// are discarded (default: 1e-7).
    pub min_area_ratio: f64,

    /// Rotate rings to start at their lowest-left vertex (default: true).
    pub sort: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            tolerance: None,
            min_area_ratio: 1e-7,
            sort: true,
        }
    }
}

impl CleanOptions {
    /// Use a fixed merge tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance.abs());
        self
    }

    /// Set the sliver area ratio.
    pub fn with_min_area_ratio(mut self, ratio: f64) -> Self {
        self.min_area_ratio = ratio.max(0.0);
        self
    }
}

/// A cleaned polygon and the repairs that were applied to it.
#[derive(Debug, Clone)]
pub struct CleanedPolygon {
    /// The normalized polygon.
    pub polygon: Polygon,
    /// Repairs worth reporting (dropped loops, dropped holes).
    pub diagnostics: Vec<Diagnostic>,
}

/// Clean a polygon with holes.
///
/// # Errors
///
/// Returns [`MeshError::Geometry`] if the outer ring has no valid loop left
/// after cleaning.
pub fn clean_polygon(polygon: &Polygon, options: &CleanOptions) -> Result<CleanedPolygon> {
    let tol = options
        .tolerance
        .unwrap_or_else(|| tolerance_from_extents(polygon.rings().flatten()));
    let diag = Bounds::from_points(polygon.rings().flatten())
        .map(|b| b.diagonal())
        .unwrap_or(0.0);
    let min_area = options.min_area_ratio * diag * diag;
    let mut diagnostics = Vec::new();

    let outer = clean_ring(&polygon.outer, tol);
    if outer.len() < 3 {
        return Err(MeshError::geometry(
            "outer ring has fewer than three distinct vertices",
        ));
    }
    let outer = orient(outer, true);
    let (mut loops, discarded) = simple_loops(&outer, tol, true, min_area);
    if discarded > 0 {
        diagnostics.push(Diagnostic::warning(
            IssueKind::Geometry,
            format!("discarded {} twisted or sliver loops of the outer ring", discarded),
        ));
    }
    if loops.is_empty() {
        return Err(MeshError::geometry("outer ring has no area"));
    }
    if loops.len() > 1 {
        loops.sort_by(|a, b| signed_area(b).total_cmp(&signed_area(a)));
        diagnostics.push(Diagnostic::warning(
            IssueKind::Geometry,
            format!(
                "self-intersecting outer ring split into {} loops; kept the largest",
                loops.len()
            ),
        ));
    }
    let mut outer = loops.swap_remove(0);
    if options.sort {
        sort_ring(&mut outer);
    }

    let mut holes = Vec::new();
    for (hi, hole) in polygon.holes.iter().enumerate() {
        let ring = clean_ring(hole, tol);
        if ring.len() < 3 {
            diagnostics.push(Diagnostic::warning(
                IssueKind::Geometry,
                format!("hole {} is degenerate and was dropped", hi),
            ));
            continue;
        }
        let ring = orient(ring, false);
        let (pieces, discarded) = simple_loops(&ring, tol, false, min_area);
        if discarded > 0 {
            diagnostics.push(Diagnostic::warning(
                IssueKind::Geometry,
                format!("discarded {} twisted or sliver loops of hole {}", discarded, hi),
            ));
        }
        for mut piece in pieces {
            if !piece.iter().all(|p| point_in_ring(&outer, p)) || rings_intersect(&outer, &piece) {
                diagnostics.push(
                    Diagnostic::warning(
                        IssueKind::Geometry,
                        format!("hole {} is not inside the outer ring and was dropped", hi),
                    )
                    .at(piece[0]),
                );
                continue;
            }
            if options.sort {
                sort_ring(&mut piece);
            }
            holes.push(piece);
        }
    }

    Ok(CleanedPolygon {
        polygon: Polygon::new(outer, holes),
        diagnostics,
    })
}

/// Remove the closing duplicate, merge consecutive points closer than `tol`
/// and remove zero-width spikes.
pub fn clean_ring(ring: &[Point2<f64>], tol: f64) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(ring.len());
    for p in ring {
        if out.last().map_or(true, |q| (p - q).norm() > tol) {
            out.push(*p);
        }
    }
    while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= tol {
        out.pop();
    }
    remove_spikes(&mut out, tol);
    out
}

/// Repeatedly remove vertices where the ring doubles back on itself.
fn remove_spikes(ring: &mut Vec<Point2<f64>>, tol: f64) {
    let mut changed = true;
    while changed && ring.len() >= 3 {
        changed = false;
        let n = ring.len();
        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let u = prev - cur;
            let v = next - cur;
            let scale = u.norm() * v.norm();
            let collinear = cross(&cur, &prev, &next).abs() <= 1e-12 * scale;
            if (prev - next).norm() <= tol || (collinear && u.dot(&v) > 0.0) {
                ring.remove(i);
                if ring.len() >= 2 && (prev - next).norm() <= tol {
                    // The two neighbors now coincide
                    let j = if i < ring.len() { i } else { 0 };
                    ring.remove(j);
                }
                changed = true;
                break;
            }
        }
    }
    if ring.len() < 3 {
        ring.clear();
    }
}

/// Reverse the ring if needed so it is counter-clockwise (`ccw`) or
/// clockwise.
pub fn orient(mut ring: Vec<Point2<f64>>, ccw: bool) -> Vec<Point2<f64>> {
    if (signed_area(&ring) > 0.0) != ccw {
        ring.reverse();
    }
    ring
}

/// Rotate a ring to start at its lowest-left vertex (min x, then min y).
pub fn sort_ring(ring: &mut [Point2<f64>]) {
    let mut best = 0;
    for i in 1..ring.len() {
        if lex_less(&ring[i], &ring[best]) {
            best = i;
        }
    }
    ring.rotate_left(best);
}

/// Loops of `ring` with the requested orientation and area above
/// `min_area`, and the number of loops discarded.
fn simple_loops(
    ring: &[Point2<f64>],
    tol: f64,
    ccw: bool,
    min_area: f64,
) -> (Vec<Vec<Point2<f64>>>, usize) {
    let all = split_self_intersections(ring, tol);
    let total = all.len();
    let kept: Vec<_> = all
        .into_iter()
        .filter(|l| {
            let a = signed_area(l);
            if ccw {
                a > min_area
            } else {
                -a > min_area
            }
        })
        .collect();
    let discarded = total - kept.len();
    (kept, discarded)
}

/// Split a ring at its self-intersections into simple loops.
///
/// Intersection nodes are inserted on both crossing segments, then the ring
/// is walked with a stack: whenever a node repeats, the loop since its first
/// visit is cut off. Each returned loop keeps the traversal direction, so
/// twisted parts come back with the opposite orientation. A simple ring is
/// returned unchanged.
pub fn split_self_intersections(ring: &[Point2<f64>], tol: f64) -> Vec<Vec<Point2<f64>>> {
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }

    // Parameters of the nodes to insert on each segment
    let mut splits: Vec<Vec<f64>> = vec![Vec::new(); n];
    let index = SegmentIndex::from_ring(ring);
    const EPS: f64 = 1e-9;
    for i in 0..n {
        let (a0, a1) = (ring[i], ring[(i + 1) % n]);
        for j in index.candidates(&a0, &a1, tol) {
            if j <= i || j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b0, b1) = (ring[j], ring[(j + 1) % n]);
            if let Some((t, u)) = segment_intersection(&a0, &a1, &b0, &b1) {
                if t > EPS && t < 1.0 - EPS {
                    splits[i].push(t);
                }
                if u > EPS && u < 1.0 - EPS {
                    splits[j].push(u);
                }
            }
        }
    }

    let mut sequence: Vec<Point2<f64>> = Vec::with_capacity(n);
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        sequence.push(a);
        let ts = &mut splits[i];
        ts.sort_by(f64::total_cmp);
        sequence.extend(ts.iter().map(|&t| a + (b - a) * t));
    }

    // Coincident nodes get one id
    let mut merger = PointMerger::new(tol.max(f64::EPSILON));
    let ids: Vec<usize> = sequence.iter().map(|p| merger.add(*p)).collect();
    let positions = merger.points();

    let mut loops = Vec::new();
    let mut stack: Vec<usize> = Vec::with_capacity(ids.len());
    let mut in_stack: HashMap<usize, usize> = HashMap::new();
    for &id in ids.iter().chain(std::iter::once(&ids[0])) {
        if stack.last() == Some(&id) {
            continue;
        }
        if let Some(&pos) = in_stack.get(&id) {
            let cut: Vec<usize> = stack.drain(pos + 1..).collect();
            for c in &cut {
                in_stack.remove(c);
            }
            let mut lp = Vec::with_capacity(cut.len() + 1);
            lp.push(positions[id]);
            lp.extend(cut.iter().map(|&c| positions[c]));
            if lp.len() >= 3 {
                loops.push(lp);
            }
        } else {
            in_stack.insert(id, stack.len());
            stack.push(id);
        }
    }
    loops
}

/// Whether a ring is simple: no two non-adjacent edges touch and no
/// adjacent edges fold back onto each other.
pub fn is_simple(ring: &[Point2<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let index = SegmentIndex::from_ring(ring);
    for i in 0..n {
        let (a0, a1) = (ring[i], ring[(i + 1) % n]);
        if (a1 - a0).norm_squared() == 0.0 {
            return false;
        }
        let next = ring[(i + 2) % n];
        let (u, v) = (a0 - a1, next - a1);
        if cross(&a1, &a0, &next).abs() <= 1e-12 * u.norm() * v.norm() && u.dot(&v) > 0.0 {
            return false;
        }
        for j in index.candidates(&a0, &a1, 0.0) {
            if j <= i || j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            if segment_intersection(&a0, &a1, &ring[j], &ring[(j + 1) % n]).is_some() {
                return false;
            }
        }
    }
    true
}

/// Whether any edge of `a` touches or crosses any edge of `b`.
pub fn rings_intersect(a: &[Point2<f64>], b: &[Point2<f64>]) -> bool {
    if a.len() < 2 || b.len() < 2 {
        return false;
    }
    let index = SegmentIndex::from_ring(b);
    let (na, nb) = (a.len(), b.len());
    (0..na).any(|i| {
        let (a0, a1) = (a[i], a[(i + 1) % na]);
        index
            .candidates(&a0, &a1, 0.0)
            .into_iter()
            .any(|j| segment_intersection(&a0, &a1, &b[j], &b[(j + 1) % nb]).is_some())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point2<f64>> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Point2<f64>> {
        ring(&[(x0, y0), (x0 + side, y0), (x0 + side, y0 + side), (x0, y0 + side)])
    }

    #[test]
    fn test_orientation_fixed() {
        let mut outer = square(0.0, 0.0, 4.0);
        outer.reverse();
        let hole = square(1.0, 1.0, 2.0);
        let cleaned = clean_polygon(&Polygon::new(outer, vec![hole]), &CleanOptions::default()).unwrap();
        assert!(signed_area(&cleaned.polygon.outer) > 0.0);
        assert!(signed_area(&cleaned.polygon.holes[0]) < 0.0);
        assert!(cleaned.diagnostics.is_empty());
    }

    #[test]
    fn test_near_duplicates_merged() {
        let r = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0 + 1e-12, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        let cleaned = clean_ring(&r, 1e-9);
        assert_eq!(cleaned.len(), 4);
    }

    #[test]
    fn test_spike_removed() {
        let r = ring(&[(0.0, 0.0), (2.0, 0.0), (3.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        let cleaned = clean_ring(&r, 1e-9);
        assert_eq!(cleaned.len(), 4);
        assert_relative_eq!(signed_area(&cleaned), 4.0);
    }

    #[test]
    fn test_figure_eight_split() {
        // Bow tie: crosses itself at (1, 1)
        let bowtie = ring(&[(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)]);
        let loops = split_self_intersections(&bowtie, 1e-9);
        assert_eq!(loops.len(), 2);
        let mut areas: Vec<f64> = loops.iter().map(|l| signed_area(l)).collect();
        areas.sort_by(f64::total_cmp);
        assert_relative_eq!(areas[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(areas[1], 1.0, epsilon = 1e-12);
        assert!(loops.iter().all(|l| is_simple(l)));
    }

    #[test]
    fn test_self_intersecting_outer_keeps_largest() {
        // Large CCW square with a small twisted lobe at its top right
        let r = ring(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (5.0, 5.0),
            (5.0, 4.5),
            (4.5, 5.0),
            (0.0, 4.0),
        ]);
        let cleaned = clean_polygon(&Polygon::new(r, vec![]), &CleanOptions::default()).unwrap();
        assert!(is_simple(&cleaned.polygon.outer));
        assert!(signed_area(&cleaned.polygon.outer) > 15.0);
        assert_eq!(cleaned.diagnostics.len(), 1);
    }

    #[test]
    fn test_hole_outside_dropped() {
        let outer = square(0.0, 0.0, 4.0);
        let hole = square(10.0, 10.0, 1.0);
        let cleaned = clean_polygon(&Polygon::new(outer, vec![hole]), &CleanOptions::default()).unwrap();
        assert!(cleaned.polygon.holes.is_empty());
        assert_eq!(cleaned.diagnostics.len(), 1);
    }

    #[test]
    fn test_degenerate_outer_is_error() {
        let r = ring(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(matches!(
            clean_polygon(&Polygon::new(r, vec![]), &CleanOptions::default()),
            Err(MeshError::Geometry { .. })
        ));
    }

    #[test]
    fn test_sort_ring() {
        let mut r = ring(&[(1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        sort_ring(&mut r);
        assert_eq!(r[0], Point2::new(0.0, 0.0));
        assert_eq!(r[1], Point2::new(1.0, 0.0));
    }

    #[test]
    fn test_rings_intersect() {
        let a = square(0.0, 0.0, 2.0);
        assert!(rings_intersect(&a, &square(1.0, 1.0, 2.0)));
        assert!(!rings_intersect(&a, &square(0.5, 0.5, 1.0)));
        assert!(!rings_intersect(&a, &square(5.0, 5.0, 1.0)));
    }
}
