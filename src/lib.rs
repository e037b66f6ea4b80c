//! # Pavemesh
//!
//! Quad-dominant meshing of 2D polygonal domains.
//!
//! Pavemesh turns polygons (with holes, breaklines, refine points and a
//! spatially varying target size) into conforming meshes of triangles and
//! quadrilaterals for numerical simulation.
//!
//! ## Features
//!
//! - **Boundary preparation**: cleaning, size- and curvature-driven point
//!   redistribution
//! - **Paving**: advancing fronts from inward offsets, with strip lofting and
//!   constrained Delaunay fallback
//! - **Structured patches**: transfinite grids for four-cornered polygons
//! - **Quads**: triangle pairing by weighted blossom matching, bad-quad repair
//! - **Relaxation**: smoothing that never inverts a cell
//! - **Multi-polygon meshing**: parallel per-polygon pipelines, conforming
//!   shared boundaries, per-polygon status reports
//!
//! ## Quick Start
//!
//! ```
//! use pavemesh::prelude::*;
//! use nalgebra::Point2;
//!
//! let outer = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 0.0),
//!     Point2::new(10.0, 10.0),
//!     Point2::new(0.0, 10.0),
//! ];
//! let hole = vec![
//!     Point2::new(4.0, 4.0),
//!     Point2::new(4.0, 6.0),
//!     Point2::new(6.0, 6.0),
//!     Point2::new(6.0, 4.0),
//! ];
//! let job = MeshingJob::new(outer).with_hole(hole).with_constant_size(1.0);
//! let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
//!
//! assert_ne!(output.status, JobStatus::Failed);
//! assert!(output.mesh.validate().is_ok());
//! println!(
//!     "{} points, {} quads, {} triangles",
//!     output.mesh.num_points(),
//!     output.mesh.num_quads(),
//!     output.mesh.num_triangles()
//! );
//! ```
//!
//! ## Running Stages Directly
//!
//! Every stage is also usable on its own:
//!
//! ```
//! use pavemesh::algo::pave::{pave, PaveOptions};
//! use pavemesh::algo::quad::{merge_triangles, QuadOptions};
//! use pavemesh::algo::redistribute::{redistribute_constant, RedistributeOptions};
//! use pavemesh::prelude::*;
//! use nalgebra::Point2;
//!
//! let square = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(5.0, 0.0),
//!     Point2::new(5.0, 5.0),
//!     Point2::new(0.0, 5.0),
//! ];
//! let boundary = redistribute_constant(&square, true, 1.0, &RedistributeOptions::default()).unwrap();
//! let size = ConstantSize::new(1.0).unwrap();
//! let mut paved = pave(&Polygon::new(boundary, vec![]), &size, &PaveOptions::default()).unwrap();
//! merge_triangles(&mut paved.mesh, &[], &QuadOptions::default()).unwrap();
//!
//! assert!(paved.mesh.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod mesher;
pub mod size;
pub mod spatial;
pub mod triangulate;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use pavemesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::refine::RefinePoint;
    pub use crate::algo::Progress;
    pub use crate::diagnostics::{Diagnostic, IssueKind, JobStatus, PolygonStatus, Severity};
    pub use crate::error::{MeshError, Result};
    pub use crate::geometry::Polygon;
    pub use crate::mesh::{Cell, Mesh2d, Topology};
    pub use crate::mesher::{
        mesh_polygons, mesh_polygons_with_progress, MeshOutput, MesherOptions, MeshingJob,
        PolygonReport, SizeSpec,
    };
    pub use crate::size::{ConstantSize, FnSize, SizeFunction};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::spatial::{PointIndex, SpatialIndex};
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Point2<f64>> {
        rect(x0, y0, x0 + side, y0 + side)
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    fn inside_box(p: &Point2<f64>, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        let eps = 1e-9;
        p.x >= x0 - eps && p.x <= x1 + eps && p.y >= y0 - eps && p.y <= y1 + eps
    }

    #[test]
    fn test_square_quad_mode() {
        let job = MeshingJob::new(square(0.0, 0.0, 4.0)).with_constant_size(1.0);
        let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
        assert_ne!(output.status, JobStatus::Failed);
        assert_eq!(output.mesh.num_quads(), 16);
        assert_eq!(output.mesh.num_triangles(), 0);
        assert!(output.mesh.quality().min > 0.9);
        assert!(output
            .mesh
            .points
            .iter()
            .all(|p| inside_box(p, 0.0, 0.0, 4.0, 4.0)));
    }

    #[test]
    fn test_square_triangle_mode() {
        let job = MeshingJob::new(square(0.0, 0.0, 4.0)).with_constant_size(1.0);
        let options = MesherOptions::default().with_quads(false);
        let output = mesh_polygons(&[job], &options).unwrap();
        assert_eq!(output.mesh.num_triangles(), 32);
        assert_relative_eq!(output.mesh.total_area(), 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_square_paved() {
        let job = MeshingJob::new(square(0.0, 0.0, 4.0))
            .with_constant_size(1.0)
            .with_patch(false);
        let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
        assert_ne!(output.status, JobStatus::Failed);
        let mesh = &output.mesh;
        assert!(mesh.validate().is_ok());
        assert!(mesh.num_quads() > 0);
        assert_relative_eq!(mesh.total_area(), 16.0, epsilon = 1e-9);
        assert!(mesh.points.iter().all(|p| inside_box(p, 0.0, 0.0, 4.0, 4.0)));
    }

    #[test]
    fn test_square_with_hole() {
        let mut hole = square(4.0, 4.0, 2.0);
        hole.reverse();
        let job = MeshingJob::new(square(0.0, 0.0, 10.0))
            .with_hole(hole)
            .with_constant_size(1.0);
        let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
        assert_ne!(output.status, JobStatus::Failed);
        let mesh = &output.mesh;
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.total_area(), 96.0, epsilon = 1e-9);

        let on_outer = |p: &Point2<f64>| {
            p.x.abs() < 1e-9
                || p.y.abs() < 1e-9
                || (p.x - 10.0).abs() < 1e-9
                || (p.y - 10.0).abs() < 1e-9
        };
        let on_hole = |p: &Point2<f64>| {
            inside_box(p, 4.0, 4.0, 6.0, 6.0)
                && ((p.x - 4.0).abs() < 1e-9
                    || (p.x - 6.0).abs() < 1e-9
                    || (p.y - 4.0).abs() < 1e-9
                    || (p.y - 6.0).abs() < 1e-9)
        };
        assert!(mesh.points.iter().any(|p| on_outer(p)));
        assert!(mesh.points.iter().any(|p| on_hole(p)));
        assert!(!mesh
            .points
            .iter()
            .any(|p| p.x > 4.0 + 1e-9 && p.x < 6.0 - 1e-9 && p.y > 4.0 + 1e-9 && p.y < 6.0 - 1e-9));

        // Closed annulus: every boundary edge lies on one of the two rings
        // and every boundary vertex has exactly two boundary edges
        let topo = Topology::build(mesh).unwrap();
        let boundary = topo.boundary_edges();
        let mut degree = vec![0usize; mesh.num_points()];
        for &(a, b) in &boundary {
            let (pa, pb) = (mesh.points[a], mesh.points[b]);
            assert!((on_outer(&pa) && on_outer(&pb)) || (on_hole(&pa) && on_hole(&pb)));
            degree[a] += 1;
            degree[b] += 1;
        }
        assert!(degree.iter().all(|&d| d == 0 || d == 2));
    }

    #[test]
    fn test_refine_point_density() {
        let job = MeshingJob::new(square(0.0, 0.0, 10.0))
            .with_constant_size(1.0)
            .with_refine_point(RefinePoint::new(Point2::new(5.0, 5.0), 0.1));
        let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
        assert!(output.reports[0].error.is_none());
        let mesh = &output.mesh;
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.total_area(), 100.0, epsilon = 1e-9);

        let count_near = |c: Point2<f64>| {
            mesh.points
                .iter()
                .filter(|p| (*p - c).norm() < 1.0)
                .count()
        };
        let center = count_near(Point2::new(5.0, 5.0));
        let edge = count_near(Point2::new(5.0, 1.0));
        assert!(center > 2 * edge, "center {} vs edge {}", center, edge);
        // The refine point itself is a mesh vertex
        assert!(mesh.points.iter().any(|p| (p - Point2::new(5.0, 5.0)).norm() < 1e-12));
    }

    #[test]
    fn test_adjacent_rectangles_share_points() {
        let jobs = [
            MeshingJob::new(rect(0.0, 0.0, 4.0, 3.0)).with_constant_size(0.5),
            MeshingJob::new(rect(4.0, 0.0, 7.0, 3.0)).with_constant_size(0.75),
        ];
        let output = mesh_polygons(&jobs, &MesherOptions::default()).unwrap();
        assert_ne!(output.status, JobStatus::Failed);
        let mesh = &output.mesh;
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.total_area(), 21.0, epsilon = 1e-9);

        // No duplicate points
        let index = PointIndex::build(&mesh.points);
        for (i, p) in mesh.points.iter().enumerate() {
            assert_eq!(index.within_distance(p, 1e-9), vec![i]);
        }

        // No hanging nodes: no boundary edge runs along the shared edge
        let topo = Topology::build(mesh).unwrap();
        for (a, b) in topo.boundary_edges() {
            let (pa, pb) = (mesh.points[a], mesh.points[b]);
            assert!(!((pa.x - 4.0).abs() < 1e-12 && (pb.x - 4.0).abs() < 1e-12));
        }
        assert!(output.cell_polygons.contains(&0) && output.cell_polygons.contains(&1));
    }

    #[test]
    fn test_deterministic() {
        let jobs = [
            MeshingJob::new(rect(0.0, 0.0, 4.0, 3.0))
                .with_constant_size(0.5)
                .with_patch(false),
            MeshingJob::new(rect(4.0, 0.0, 7.0, 3.0)).with_constant_size(0.75),
        ];
        let parallel = mesh_polygons(&jobs, &MesherOptions::default()).unwrap();
        let sequential = mesh_polygons(&jobs, &MesherOptions::default().sequential()).unwrap();
        assert_eq!(parallel.mesh, sequential.mesh);
    }
}
