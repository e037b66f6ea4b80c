//! Refine points.
//!
//! A refine point asks for a smaller element size around a location. It is
//! turned into a small auxiliary ring that the paver treats as an extra hole,
//! so the fronts grow outward from it, and into a [`RefineRegion`] that
//! shrinks the size function around it. After paving the auxiliary holes are
//! filled again ([`fill_refine_rings`]).
//!
//! A refine point with a size at or below the tolerance that asks for a mesh
//! point becomes a hard point instead: a fixed vertex of the mesh.

use std::f64::consts::PI;

use nalgebra::{Point2, Vector2};

use super::pave::ear_clip;
use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::{MeshError, Result};
use crate::geometry::Polygon;
use crate::mesh::{Cell, Mesh2d};
use crate::size::RefineRegion;

/// A request for local refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinePoint {
    /// Location of the refinement.
    pub location: Point2<f64>,
    /// Element size at the location.
    pub size: f64,
    /// Place a mesh vertex at the location.
    pub create_mesh_point: bool,
}

impl RefinePoint {
    /// A refine point that creates a mesh vertex at its location.
    pub fn new(location: Point2<f64>, size: f64) -> Self {
        Self {
            location,
            size,
            create_mesh_point: true,
        }
    }

    /// Enable or disable the mesh vertex at the location.
    pub fn with_mesh_point(mut self, create: bool) -> Self {
        self.create_mesh_point = create;
        self
    }

    /// Radius of the auxiliary ring.
    fn radius(&self) -> f64 {
        if self.create_mesh_point {
            self.size
        } else {
            self.size / 3.0_f64.sqrt()
        }
    }
}

/// A small clockwise ring around an accepted refine point.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxRing {
    /// Ring points, clockwise.
    pub ring: Vec<Point2<f64>>,
    /// Fan center, when the refine point asks for a mesh vertex.
    pub center: Option<Point2<f64>>,
}

/// How a polygon's refine points are used.
#[derive(Debug, Clone, Default)]
pub struct RefinePlan {
    /// Locations that become fixed mesh vertices.
    pub hard_points: Vec<Point2<f64>>,
    /// Auxiliary rings to pave around, as extra holes.
    pub rings: Vec<AuxRing>,
    /// Size refinements for the accepted rings.
    pub regions: Vec<RefineRegion>,
    /// Skipped refine points.
    pub diagnostics: Vec<Diagnostic>,
}

impl RefinePlan {
    /// `true` if nothing changes the polygon.
    pub fn is_empty(&self) -> bool {
        self.hard_points.is_empty() && self.rings.is_empty()
    }
}

/// Decide how each refine point of `polygon` is realized.
///
/// Larger refine points are placed first; a ring that would overlap an
/// already placed ring is skipped. Points outside the polygon, or closer than
/// their size to its boundary, are skipped too. Every skip is reported.
///
/// # Example
///
/// ```
/// use pavemesh::algo::refine::{plan_refinement, RefinePoint};
/// use pavemesh::geometry::Polygon;
/// use nalgebra::Point2;
///
/// let square = Polygon::new(
///     vec![
///         Point2::new(0.0, 0.0),
///         Point2::new(10.0, 0.0),
///         Point2::new(10.0, 10.0),
///         Point2::new(0.0, 10.0),
///     ],
///     vec![],
/// );
/// let plan = plan_refinement(&square, &[RefinePoint::new(Point2::new(5.0, 5.0), 0.5)], 1e-9);
///
/// assert_eq!(plan.rings.len(), 1);
/// assert_eq!(plan.rings[0].ring.len(), 6);
/// ```
pub fn plan_refinement(polygon: &Polygon, points: &[RefinePoint], tol: f64) -> RefinePlan {
    let mut plan = RefinePlan::default();

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[b].size.total_cmp(&points[a].size).then(a.cmp(&b)));

    // Accepted rings as (center, radius)
    let mut placed: Vec<(Point2<f64>, f64)> = Vec::new();
    for i in order {
        let rp = &points[i];
        let p = rp.location;
        let skip = |reason: &str| {
            Diagnostic::warning(
                IssueKind::RefinePointSkipped,
                format!("refine point {} skipped: {}", i, reason),
            )
            .at(p)
        };

        if !rp.size.is_finite() || rp.size < 0.0 {
            plan.diagnostics.push(skip("invalid size"));
            continue;
        }
        if !polygon.contains(&p) {
            plan.diagnostics.push(skip("outside the polygon"));
            continue;
        }
        if rp.size <= tol {
            if rp.create_mesh_point {
                if placed.iter().any(|(c, r)| (p - c).norm() < *r) {
                    plan.diagnostics.push(skip("inside a larger refine point"));
                } else {
                    plan.hard_points.push(p);
                }
            } else {
                plan.diagnostics.push(Diagnostic::info(
                    IssueKind::RefinePointSkipped,
                    format!("refine point {} has no size and no mesh point", i),
                ));
            }
            continue;
        }
        if polygon.distance_to_boundary(&p) < rp.size {
            plan.diagnostics.push(skip("too close to the boundary"));
            continue;
        }
        let radius = rp.radius();
        if placed.iter().any(|(c, r)| (p - c).norm() < r + radius) {
            plan.diagnostics.push(skip("overlaps a larger refine point"));
            continue;
        }
        placed.push((p, radius));

        let sides = if rp.create_mesh_point { 6 } else { 3 };
        let phase = if rp.create_mesh_point { 0.0 } else { PI / 2.0 };
        plan.rings.push(AuxRing {
            ring: regular_ring(&p, radius, sides, phase),
            center: rp.create_mesh_point.then_some(p),
        });
        plan.regions.push(RefineRegion {
            center: p,
            size: rp.size,
        });
    }
    plan
}

/// Clockwise regular polygon.
fn regular_ring(center: &Point2<f64>, radius: f64, sides: usize, phase: f64) -> Vec<Point2<f64>> {
    (0..sides)
        .map(|k| {
            let theta = phase - 2.0 * PI * k as f64 / sides as f64;
            center + Vector2::new(theta.cos(), theta.sin()) * radius
        })
        .collect()
}

/// Fill the auxiliary holes left in a paved mesh.
///
/// `starts[k]` is the index of the first mesh point of `rings[k]`; the ring
/// points must be stored consecutively, in ring order. Rings with a center
/// are fanned to a new center vertex, the others are ear clipped. Returns the
/// ids of the center vertices.
///
/// # Errors
///
/// Returns [`MeshError::PavingFailure`] if a ring does not fit in the mesh or
/// cannot be ear clipped.
pub fn fill_refine_rings(
    mesh: &mut Mesh2d,
    starts: &[usize],
    rings: &[AuxRing],
) -> Result<Vec<usize>> {
    let mut centers = Vec::new();
    for (k, (&start, aux)) in starts.iter().zip(rings).enumerate() {
        let n = aux.ring.len();
        if start + n > mesh.num_points() {
            return Err(MeshError::paving(format!("refine ring {} is not in the mesh", k)));
        }
        // Counter-clockwise
        let ids: Vec<usize> = (start..start + n).rev().collect();
        match aux.center {
            Some(c) => {
                let ci = mesh.add_point(c);
                for i in 0..n {
                    mesh.add_cell(Cell::Triangle([ids[i], ids[(i + 1) % n], ci]));
                }
                centers.push(ci);
            }
            None => {
                let triangles = ear_clip(&ids, &mesh.points)
                    .ok_or_else(|| MeshError::paving("refine ring cannot be closed"))?;
                for t in triangles {
                    mesh.add_cell(Cell::Triangle(t));
                }
            }
        }
    }
    Ok(centers)
}
