//! Structured grid filling for four-sided polygons.
//!
//! A polygon with exactly four corners and matching opposite sides is filled
//! with a structured quad grid by transfinite (Coons) interpolation of its
//! boundary, which gives far more regular cells than paving.
//!
//! # Algorithm
//!
//! 1. Corners are the vertices with an interior angle below `corner_angle`.
//! 2. The four chains between corners are the sides. Opposite sides must have
//!    the same number of segments; a side may be resampled when the counts
//!    are close enough and resampling is allowed.
//! 3. Grid node `(i, j)` is placed by discrete Coons interpolation, using
//!    normalized arc-length parameters along each side.
//! 4. If any cell is not strictly convex the patch is rejected.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::patch::{fill_patch, PatchOptions, PatchResult};
//! use pavemesh::algo::redistribute::{redistribute_constant, RedistributeOptions};
//! use nalgebra::Point2;
//!
//! let square = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(4.0, 0.0),
//!     Point2::new(4.0, 4.0),
//!     Point2::new(0.0, 4.0),
//! ];
//! let ring = redistribute_constant(&square, true, 1.0, &RedistributeOptions::default()).unwrap();
//!
//! match fill_patch(&ring, &PatchOptions::default()).unwrap() {
//!     PatchResult::Filled { points, quads, .. } => {
//!         assert_eq!(quads.len(), 16);
//!         assert_eq!(points.len(), 25);
//!     }
//!     PatchResult::NotApplicable { reason } => panic!("{reason}"),
//! }
//! ```

use std::f64::consts::PI;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::geometry::{interior_angle, signed_area};
use crate::mesh::cell_is_valid;

/// Options for patch filling.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Interior angle (radians) below which a vertex is a corner
    /// (default: 135°).
    pub corner_angle: f64,

    /// Largest relative difference between opposite side counts that is
    /// fixed by resampling (default: 0.25).
    pub side_tolerance: f64,

    /// Whether sides may be resampled (default: true). Disable when the
    /// boundary is shared with a neighbor.
    pub resample: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            corner_angle: 0.75 * PI,
            side_tolerance: 0.25,
            resample: true,
        }
    }
}

impl PatchOptions {
    /// Set the corner angle in radians.
    pub fn with_corner_angle(mut self, angle: f64) -> Self {
        self.corner_angle = angle;
        self
    }

    /// Set the side count tolerance.
    pub fn with_side_tolerance(mut self, tolerance: f64) -> Self {
        self.side_tolerance = tolerance.max(0.0);
        self
    }

    /// Allow or forbid side resampling.
    pub fn with_resample(mut self, resample: bool) -> Self {
        self.resample = resample;
        self
    }
}

/// Outcome of a patch attempt.
#[derive(Debug, Clone)]
pub enum PatchResult {
    /// The polygon was filled with a structured grid.
    Filled {
        /// Grid points; the boundary ring comes first, in ring order.
        points: Vec<Point2<f64>>,
        /// Counter-clockwise quads.
        quads: Vec<[usize; 4]>,
        /// Number of boundary points. Equals the input ring length unless a
        /// side was resampled.
        boundary: usize,
    },
    /// The polygon is not a patch; pave it instead.
    NotApplicable {
        /// Why the patch was rejected.
        reason: String,
    },
}

impl PatchResult {
    fn reject(reason: impl Into<String>) -> Self {
        PatchResult::NotApplicable {
            reason: reason.into(),
        }
    }
}

/// Fill a counter-clockwise ring with a structured quad grid.
///
/// # Errors
///
/// Returns [`MeshError::Geometry`] if the ring has fewer than 4 points or is
/// not counter-clockwise. Shapes that simply are not patches give
/// [`PatchResult::NotApplicable`].
pub fn fill_patch(ring: &[Point2<f64>], options: &PatchOptions) -> Result<PatchResult> {
    let n = ring.len();
    if n < 4 || signed_area(ring) <= 0.0 {
        return Err(MeshError::geometry("patch boundary must be a counter-clockwise ring"));
    }

    let corners: Vec<usize> = (0..n)
        .filter(|&i| {
            interior_angle(&ring[(i + n - 1) % n], &ring[i], &ring[(i + 1) % n]) < options.corner_angle
        })
        .collect();
    if corners.len() != 4 {
        return Ok(PatchResult::reject(format!(
            "{} corners found, 4 required",
            corners.len()
        )));
    }

    let mut sides: Vec<Vec<Point2<f64>>> = (0..4)
        .map(|s| {
            let (a, b) = (corners[s], corners[(s + 1) % 4]);
            let len = (b + n - a) % n;
            (0..=len).map(|k| ring[(a + k) % n]).collect()
        })
        .collect();

    let mut resampled = false;
    for s in 0..2 {
        let (a, b) = (sides[s].len() - 1, sides[s + 2].len() - 1);
        if a == b {
            continue;
        }
        let diff = a.abs_diff(b) as f64 / a.max(b) as f64;
        if !options.resample || diff > options.side_tolerance {
            return Ok(PatchResult::reject(format!(
                "opposite sides have {a} and {b} segments"
            )));
        }
        let (short, count) = if a < b { (s, b) } else { (s + 2, a) };
        sides[short] = resample_side(&sides[short], count);
        resampled = true;
    }

    let m = sides[0].len() - 1;
    let k = sides[1].len() - 1;

    // Boundary ring in grid order, starting at the first corner
    let mut boundary: Vec<Point2<f64>> = Vec::with_capacity(2 * (m + k));
    for side in &sides {
        boundary.extend_from_slice(&side[..side.len() - 1]);
    }
    let start = if resampled { 0 } else { corners[0] };
    let nb = boundary.len();
    // Ring index of boundary position `b` (positions count from the first corner)
    let ring_index = |b: usize| (start + b) % nb;

    let bottom = &sides[0];
    let right = &sides[1];
    let top: Vec<Point2<f64>> = sides[2].iter().rev().copied().collect();
    let left: Vec<Point2<f64>> = sides[3].iter().rev().copied().collect();
    let (ub, ut) = (arc_params(bottom), arc_params(&top));
    let (vl, vr) = (arc_params(&left), arc_params(right));
    let (c00, c10, c11, c01) = (bottom[0], bottom[m], top[m], top[0]);

    let mut points: Vec<Point2<f64>> = if resampled {
        boundary.clone()
    } else {
        ring.to_vec()
    };
    let mut ids = vec![vec![0usize; k + 1]; m + 1];
    for (i, column) in ids.iter_mut().enumerate() {
        for (j, id) in column.iter_mut().enumerate() {
            *id = if j == 0 {
                ring_index(i)
            } else if i == m {
                ring_index(m + j)
            } else if j == k {
                ring_index(m + k + (m - i))
            } else if i == 0 {
                ring_index(2 * m + k + (k - j))
            } else {
                let denom = 1.0 - (vr[j] - vl[j]) * (ut[i] - ub[i]);
                let u = (ub[i] + vl[j] * (ut[i] - ub[i])) / denom;
                let v = vl[j] + u * (vr[j] - vl[j]);
                let p = bottom[i].coords * (1.0 - v)
                    + top[i].coords * v
                    + left[j].coords * (1.0 - u)
                    + right[j].coords * u
                    - (c00.coords * ((1.0 - u) * (1.0 - v))
                        + c10.coords * (u * (1.0 - v))
                        + c11.coords * (u * v)
                        + c01.coords * ((1.0 - u) * v));
                points.push(Point2::from(p));
                points.len() - 1
            };
        }
    }

    let mut quads = Vec::with_capacity(m * k);
    for i in 0..m {
        for j in 0..k {
            let q = [ids[i][j], ids[i + 1][j], ids[i + 1][j + 1], ids[i][j + 1]];
            if !cell_is_valid(&q.map(|v| points[v])) {
                return Ok(PatchResult::reject(format!("grid cell ({i}, {j}) is not convex")));
            }
            quads.push(q);
        }
    }

    log::debug!("patch filled with a {}x{} grid", m, k);
    Ok(PatchResult::Filled {
        points,
        quads,
        boundary: nb,
    })
}

/// Normalized cumulative arc length along a polyline.
fn arc_params(side: &[Point2<f64>]) -> Vec<f64> {
    let mut params = Vec::with_capacity(side.len());
    let mut s = 0.0;
    params.push(0.0);
    for w in side.windows(2) {
        s += (w[1] - w[0]).norm();
        params.push(s);
    }
    if s > 0.0 {
        params.iter_mut().for_each(|t| *t /= s);
    } else {
        let last = (side.len() - 1).max(1) as f64;
        params.iter_mut().enumerate().for_each(|(i, t)| *t = i as f64 / last);
    }
    params
}

/// Resample a polyline into `segments` equal arc-length pieces.
fn resample_side(side: &[Point2<f64>], segments: usize) -> Vec<Point2<f64>> {
    let params = arc_params(side);
    let mut out = Vec::with_capacity(segments + 1);
    out.push(side[0]);
    let mut k = 1;
    for s in 1..segments {
        let t = s as f64 / segments as f64;
        while k + 1 < params.len() && params[k] < t {
            k += 1;
        }
        let (a, b) = (params[k - 1], params[k]);
        let f = if b > a { (t - a) / (b - a) } else { 0.0 };
        out.push(side[k - 1] + (side[k] - side[k - 1]) * f);
    }
    out.push(side[side.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::redistribute::{redistribute_constant, RedistributeOptions};
    use crate::mesh::{Cell, Mesh2d};
    use approx::assert_relative_eq;

    fn ring(corners: &[(f64, f64)], spacing: f64) -> Vec<Point2<f64>> {
        let pts: Vec<_> = corners.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        redistribute_constant(&pts, true, spacing, &RedistributeOptions::default()).unwrap()
    }

    fn filled(result: PatchResult) -> (Vec<Point2<f64>>, Vec<[usize; 4]>, usize) {
        match result {
            PatchResult::Filled {
                points,
                quads,
                boundary,
            } => (points, quads, boundary),
            PatchResult::NotApplicable { reason } => panic!("not applicable: {reason}"),
        }
    }

    #[test]
    fn test_square_grid() {
        let boundary = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], 1.0);
        let (points, quads, nb) = filled(fill_patch(&boundary, &PatchOptions::default()).unwrap());
        assert_eq!(nb, boundary.len());
        assert_eq!(&points[..nb], &boundary[..]);
        assert_eq!(quads.len(), 16);

        let mut mesh = Mesh2d::new();
        mesh.points = points;
        for q in quads {
            mesh.add_cell(Cell::Quad(q));
        }
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.total_area(), 16.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.quality().min, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parallelogram_grid() {
        let boundary = ring(&[(0.0, 0.0), (4.0, 0.0), (5.0, 3.0), (1.0, 3.0)], 1.0);
        let (points, quads, _) = filled(fill_patch(&boundary, &PatchOptions::default()).unwrap());
        let area: f64 = quads
            .iter()
            .map(|q| signed_area(&q.map(|v| points[v])))
            .sum();
        assert_eq!(quads.len(), 12);
        assert_relative_eq!(area, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resamples_close_counts() {
        // Top side gets 4 segments, bottom 5
        let mut boundary: Vec<Point2<f64>> = (0..5).map(|i| Point2::new(i as f64, 0.0)).collect();
        boundary.extend((0..2).map(|j| Point2::new(5.0, j as f64)));
        boundary.extend((0..5).map(|i| Point2::new(5.0 - 1.25 * i as f64, 2.0)));
        boundary.push(Point2::new(0.0, 1.0));

        let (_, quads, nb) = filled(fill_patch(&boundary, &PatchOptions::default()).unwrap());
        assert_eq!(quads.len(), 10);
        assert_eq!(nb, 14);

        let strict = PatchOptions::default().with_resample(false);
        assert!(matches!(
            fill_patch(&boundary, &strict).unwrap(),
            PatchResult::NotApplicable { .. }
        ));
    }

    #[test]
    fn test_rejects_non_quad_shapes() {
        let triangle = ring(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)], 1.0);
        assert!(matches!(
            fill_patch(&triangle, &PatchOptions::default()).unwrap(),
            PatchResult::NotApplicable { .. }
        ));

        let l_shape = ring(
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (2.0, 2.0), (2.0, 4.0), (0.0, 4.0)],
            1.0,
        );
        assert!(matches!(
            fill_patch(&l_shape, &PatchOptions::default()).unwrap(),
            PatchResult::NotApplicable { .. }
        ));
    }

    #[test]
    fn test_rejects_clockwise() {
        let mut boundary = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], 1.0);
        boundary.reverse();
        assert!(fill_patch(&boundary, &PatchOptions::default()).is_err());
    }
}
