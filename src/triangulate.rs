//! Constrained Delaunay triangulation.
//!
//! The [`Triangulator`] trait is the seam used by paving whenever a region
//! cannot be filled by strips or ears. [`SpadeTriangulator`] implements it
//! with `spade`'s constrained Delaunay triangulation.
//!
//! # Example
//!
//! ```
//! use pavemesh::triangulate::{SpadeTriangulator, Triangulator};
//! use nalgebra::Point2;
//!
//! let points = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let tri = SpadeTriangulator.triangulate(&points, &[[0, 2]]).unwrap();
//! assert_eq!(tri.triangles.len(), 2);
//! assert!(tri.skipped_constraints.is_empty());
//! ```

use nalgebra::Point2;
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint, Triangulation as _};

use crate::error::{MeshError, Result};

/// Output of a triangulation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    /// Counter-clockwise triangles indexing into the input points.
    pub triangles: Vec<[usize; 3]>,
    /// Constraints that crossed an earlier constraint and were not inserted.
    pub skipped_constraints: Vec<[usize; 2]>,
}

/// Triangulates a point set with constraint edges.
pub trait Triangulator: Send + Sync {
    /// Triangulate the convex hull of `points`, honoring `constraints` where
    /// possible.
    ///
    /// Coincident points are unified: triangles reference the first input
    /// index at each location.
    fn triangulate(&self, points: &[Point2<f64>], constraints: &[[usize; 2]]) -> Result<Triangulation>;
}

/// [`Triangulator`] backed by `spade`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpadeTriangulator;

impl Triangulator for SpadeTriangulator {
    fn triangulate(&self, points: &[Point2<f64>], constraints: &[[usize; 2]]) -> Result<Triangulation> {
        let mut cdt: ConstrainedDelaunayTriangulation<SpadePoint<f64>> =
            ConstrainedDelaunayTriangulation::new();

        let mut handles = Vec::with_capacity(points.len());
        // spade vertex index -> first input index at that location
        let mut owner: Vec<usize> = Vec::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            let handle = cdt
                .insert(SpadePoint::new(p.x, p.y))
                .map_err(|e| MeshError::Triangulation {
                    details: format!("cannot insert point {} ({}, {}): {:?}", i, p.x, p.y, e),
                })?;
            if handle.index() == owner.len() {
                owner.push(i);
            }
            handles.push(handle);
        }

        let mut skipped = Vec::new();
        for &[a, b] in constraints {
            if a >= points.len() || b >= points.len() {
                return Err(MeshError::Triangulation {
                    details: format!("constraint ({}, {}) references a missing point", a, b),
                });
            }
            let (ha, hb) = (handles[a], handles[b]);
            if ha == hb {
                continue;
            }
            if cdt.can_add_constraint(ha, hb) {
                cdt.add_constraint(ha, hb);
            } else {
                skipped.push([a, b]);
            }
        }
        if !skipped.is_empty() {
            log::debug!("triangulation skipped {} crossing constraints", skipped.len());
        }

        let triangles = cdt
            .inner_faces()
            .map(|face| {
                let [v0, v1, v2] = face.vertices();
                [
                    owner[v0.fix().index()],
                    owner[v1.fix().index()],
                    owner[v2.fix().index()],
                ]
            })
            .collect();

        Ok(Triangulation {
            triangles,
            skipped_constraints: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::triangle_area;

    #[test]
    fn test_triangles_are_ccw() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(1.0, 1.0),
        ];
        let tri = SpadeTriangulator.triangulate(&points, &[]).unwrap();
        assert_eq!(tri.triangles.len(), 4);
        for t in &tri.triangles {
            assert!(triangle_area(&points[t[0]], &points[t[1]], &points[t[2]]) > 0.0);
        }
    }

    #[test]
    fn test_constraint_is_an_edge() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        for diag in [[0, 2], [1, 3]] {
            let tri = SpadeTriangulator.triangulate(&points, &[diag]).unwrap();
            let has = tri.triangles.iter().any(|t| {
                (0..3).any(|k| {
                    let (a, b) = (t[k], t[(k + 1) % 3]);
                    (a == diag[0] && b == diag[1]) || (a == diag[1] && b == diag[0])
                })
            });
            assert!(has, "diagonal {:?} missing", diag);
        }
    }

    #[test]
    fn test_crossing_constraint_is_skipped() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tri = SpadeTriangulator
            .triangulate(&points, &[[0, 2], [1, 3]])
            .unwrap();
        assert_eq!(tri.skipped_constraints, vec![[1, 3]]);
    }

    #[test]
    fn test_duplicate_points_unified() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 0.0),
        ];
        let tri = SpadeTriangulator.triangulate(&points, &[]).unwrap();
        assert_eq!(tri.triangles.len(), 1);
        assert!(!tri.triangles[0].contains(&3));
    }

    #[test]
    fn test_nan_point_is_an_error() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(f64::NAN, 0.0)];
        assert!(matches!(
            SpadeTriangulator.triangulate(&points, &[]),
            Err(MeshError::Triangulation { .. })
        ));
    }
}
