//! Quality-guarded mesh relaxation.
//!
//! Free vertices (not on the boundary and not fixed) are moved toward a
//! better position without changing connectivity. Every move is checked
//! against its incident cells before it is committed, so relaxation can
//! never invert or collapse a cell.
//!
//! # Methods
//!
//! - [`RelaxMethod::AreaCentroid`]: area-weighted average of incident cell
//!   centroids (default)
//! - [`RelaxMethod::Laplacian`]: neighbor average, damped by `lambda`
//! - [`RelaxMethod::Spring`]: edges act as springs at their natural length
//! - [`RelaxMethod::Angle`]: average of the ideal apex positions over the
//!   edges opposite the vertex
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::relax::{relax, RelaxOptions};
//! use pavemesh::mesh::{Cell, Mesh2d};
//! use nalgebra::Point2;
//!
//! // A 2x2 quad grid whose center vertex is off-center
//! let mut mesh = Mesh2d::new();
//! for j in 0..3 {
//!     for i in 0..3 {
//!         mesh.add_point(Point2::new(i as f64, j as f64));
//!     }
//! }
//! mesh.points[4] = Point2::new(1.3, 0.8);
//! for (a, b, c, d) in [(0, 1, 4, 3), (1, 2, 5, 4), (3, 4, 7, 6), (4, 5, 8, 7)] {
//!     mesh.add_cell(Cell::Quad([a, b, c, d]));
//! }
//!
//! let report = relax(&mut mesh, &[], None, &RelaxOptions::default().with_iterations(20)).unwrap();
//! assert!(report.converged);
//! assert!((mesh.points[4] - Point2::new(1.0, 1.0)).norm() < 1e-2);
//! ```

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use super::Progress;
use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::{MeshError, Result};
use crate::geometry::{ring_centroid, signed_area};
use crate::mesh::{cell_is_valid, cell_quality, Mesh2d, Topology};
use crate::size::SizeFunction;

/// How candidate positions are computed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RelaxMethod {
    /// Area-weighted centroid of the incident cells.
    #[default]
    AreaCentroid,
    /// Move toward the neighbor average by `lambda` (0 to 1).
    Laplacian {
        /// Step factor.
        lambda: f64,
    },
    /// Spring equilibrium with natural lengths from the size function, or
    /// the mean incident edge length without one.
    Spring,
    /// Average of the ideal apex over each opposite edge.
    Angle,
}

/// Options for mesh relaxation.
#[derive(Debug, Clone)]
pub struct RelaxOptions {
    /// Position update rule (default: area-weighted centroid).
    pub method: RelaxMethod,

    /// Maximum number of passes (default: 3).
    pub iterations: usize,

    /// Convergence threshold on the largest move, relative to the mean edge
    /// length (default: 1e-3).
    pub tolerance: f64,

    /// Fraction of the initial worst quality a move may drop a cell to
    /// (default: 0.9).
    pub quality_floor: f64,

    /// Whether to compute candidates in parallel (default: true).
    pub parallel: bool,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            method: RelaxMethod::default(),
            iterations: 3,
            tolerance: 1e-3,
            quality_floor: 0.9,
            parallel: true,
        }
    }
}

impl RelaxOptions {
    /// Set the relaxation method.
    pub fn with_method(mut self, method: RelaxMethod) -> Self {
        self.method = match method {
            RelaxMethod::Laplacian { lambda } => RelaxMethod::Laplacian {
                lambda: lambda.clamp(0.0, 1.0),
            },
            m => m,
        };
        self
    }

    /// Set the maximum number of passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Set the quality floor.
    pub fn with_quality_floor(mut self, floor: f64) -> Self {
        self.quality_floor = floor.clamp(0.0, 1.0);
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Outcome of relaxation.
#[derive(Debug, Clone, Default)]
pub struct RelaxReport {
    /// Passes run.
    pub passes: usize,
    /// Largest vertex move in the last pass.
    pub max_displacement: f64,
    /// Whether the last pass moved less than the tolerance.
    pub converged: bool,
    /// Moves accepted over all passes.
    pub moves: usize,
    /// Recovered problems.
    pub diagnostics: Vec<Diagnostic>,
}

/// Relax the free vertices of `mesh`.
///
/// # Arguments
///
/// * `mesh` - The mesh to relax (modified in place)
/// * `fixed` - Vertices that must not move, in addition to boundary vertices
/// * `size` - Natural edge lengths for [`RelaxMethod::Spring`]
/// * `options` - Relaxation parameters
///
/// # Algorithm
///
/// Each pass computes every candidate from a snapshot of the positions, then
/// commits them in vertex order. A move is accepted when every incident cell
/// stays valid and the worst incident quality does not drop below
/// `min(old worst, quality_floor · initial global worst)`. A rejected move is
/// retried once at half the step.
///
/// # Errors
///
/// Returns an error if the mesh topology is invalid.
pub fn relax(
    mesh: &mut Mesh2d,
    fixed: &[usize],
    size: Option<&dyn SizeFunction>,
    options: &RelaxOptions,
) -> Result<RelaxReport> {
    relax_internal(mesh, fixed, size, options, None)
}

/// Relax with progress reporting, once per pass.
pub fn relax_with_progress(
    mesh: &mut Mesh2d,
    fixed: &[usize],
    size: Option<&dyn SizeFunction>,
    options: &RelaxOptions,
    progress: &Progress,
) -> Result<RelaxReport> {
    relax_internal(mesh, fixed, size, options, Some(progress))
}

fn relax_internal(
    mesh: &mut Mesh2d,
    fixed: &[usize],
    size: Option<&dyn SizeFunction>,
    options: &RelaxOptions,
    progress: Option<&Progress>,
) -> Result<RelaxReport> {
    let mut report = RelaxReport::default();
    if mesh.cells.is_empty() || options.iterations == 0 {
        report.converged = true;
        return Ok(report);
    }
    let topo = Topology::build(mesh)?;
    let mut pinned = vec![false; mesh.num_points()];
    for &v in fixed {
        match pinned.get_mut(v) {
            Some(p) => *p = true,
            None => {
                return Err(MeshError::invalid_param(
                    "fixed",
                    v,
                    "vertex index out of range",
                ))
            }
        }
    }
    let free: Vec<usize> = (0..mesh.num_points())
        .filter(|&v| !pinned[v] && !topo.is_boundary_vertex(v))
        .collect();
    if free.is_empty() {
        report.converged = true;
        return Ok(report);
    }

    let mean_edge = mean_edge_length(mesh, &topo);
    let threshold = options.tolerance * mean_edge;
    let floor = options.quality_floor * mesh.quality().min;

    for pass in 0..options.iterations {
        let snapshot = &mesh.points;
        let candidates: Vec<(usize, Point2<f64>)> = if options.parallel {
            free.par_iter()
                .map(|&v| (v, candidate(snapshot, &mesh.cells, &topo, v, size, options.method)))
                .collect()
        } else {
            free.iter()
                .map(|&v| (v, candidate(snapshot, &mesh.cells, &topo, v, size, options.method)))
                .collect()
        };

        let mut max_move: f64 = 0.0;
        for (v, target) in candidates {
            let old = mesh.points[v];
            let old_min = local_min_quality(mesh, &topo, v, old);
            let limit = old_min.min(floor);
            let accepted = [target, Point2::from((old.coords + target.coords) * 0.5)]
                .into_iter()
                .find(|&p| p != old && move_is_acceptable(mesh, &topo, v, p, limit));
            if let Some(p) = accepted {
                mesh.points[v] = p;
                max_move = max_move.max((p - old).norm());
                report.moves += 1;
            }
        }

        report.passes = pass + 1;
        report.max_displacement = max_move;
        if let Some(p) = progress {
            p.report(pass + 1, options.iterations, "relax");
        }
        if max_move <= threshold {
            report.converged = true;
            break;
        }
    }

    if !report.converged {
        report.diagnostics.push(Diagnostic::warning(
            IssueKind::RelaxationNonConvergence,
            format!(
                "relaxation stopped after {} passes with a largest move of {:.3e}",
                report.passes, report.max_displacement
            ),
        ));
    }
    log::debug!(
        "relaxed {} free vertices in {} passes ({} moves)",
        free.len(),
        report.passes,
        report.moves
    );
    Ok(report)
}

fn mean_edge_length(mesh: &Mesh2d, topo: &Topology) -> f64 {
    let (sum, count) = (0..topo.num_vertices())
        .flat_map(|v| topo.vertex_neighbors(v).iter().filter(move |&&n| n > v).map(move |&n| (v, n)))
        .fold((0.0, 0usize), |(s, c), (a, b)| {
            (s + (mesh.points[b] - mesh.points[a]).norm(), c + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Corners of cell `ci` with vertex `v` placed at `p`.
fn corners_with(mesh: &Mesh2d, ci: usize, v: usize, p: Point2<f64>) -> Vec<Point2<f64>> {
    mesh.cells[ci]
        .vertices()
        .iter()
        .map(|&w| if w == v { p } else { mesh.points[w] })
        .collect()
}

fn local_min_quality(mesh: &Mesh2d, topo: &Topology, v: usize, p: Point2<f64>) -> f64 {
    topo.vertex_cells(v)
        .iter()
        .map(|&ci| cell_quality(&corners_with(mesh, ci, v, p)))
        .fold(f64::INFINITY, f64::min)
}

fn move_is_acceptable(mesh: &Mesh2d, topo: &Topology, v: usize, p: Point2<f64>, limit: f64) -> bool {
    let mut worst = f64::INFINITY;
    for &ci in topo.vertex_cells(v) {
        let corners = corners_with(mesh, ci, v, p);
        if !cell_is_valid(&corners) {
            return false;
        }
        worst = worst.min(cell_quality(&corners));
    }
    worst >= limit
}

/// Candidate position of vertex `v` computed from `points`.
fn candidate(
    points: &[Point2<f64>],
    cells: &[crate::mesh::Cell],
    topo: &Topology,
    v: usize,
    size: Option<&dyn SizeFunction>,
    method: RelaxMethod,
) -> Point2<f64> {
    let p = points[v];
    let neighbors = topo.vertex_neighbors(v);
    if neighbors.is_empty() {
        return p;
    }
    match method {
        RelaxMethod::AreaCentroid => {
            let mut weighted = Vector2::zeros();
            let mut total = 0.0;
            for &ci in topo.vertex_cells(v) {
                let corners: Vec<Point2<f64>> =
                    cells[ci].vertices().iter().map(|&w| points[w]).collect();
                let area = signed_area(&corners).abs();
                weighted += ring_centroid(&corners).coords * area;
                total += area;
            }
            if total > 0.0 {
                Point2::from(weighted / total)
            } else {
                p
            }
        }
        RelaxMethod::Laplacian { lambda } => {
            let avg = neighbors
                .iter()
                .fold(Vector2::zeros(), |acc, &n| acc + points[n].coords)
                / neighbors.len() as f64;
            p + (Point2::from(avg) - p) * lambda
        }
        RelaxMethod::Spring => {
            let mean = neighbors.iter().map(|&n| (points[n] - p).norm()).sum::<f64>()
                / neighbors.len() as f64;
            let factor = 1.7 / neighbors.len() as f64;
            let mut force = Vector2::zeros();
            for &n in neighbors {
                let d = points[n] - p;
                let len = d.norm();
                if len == 0.0 {
                    continue;
                }
                let mid = Point2::from((points[n].coords + p.coords) * 0.5);
                let natural = size
                    .and_then(|s| s.size_at(&mid).ok())
                    .filter(|l| l.is_finite() && *l > 0.0)
                    .unwrap_or(mean);
                force += d * ((len - natural) / len);
            }
            p + force * factor
        }
        RelaxMethod::Angle => {
            let mut sum = Vector2::zeros();
            let mut count = 0usize;
            for &ci in topo.vertex_cells(v) {
                let vs = cells[ci].vertices();
                let k = vs.len();
                let Some(i) = vs.iter().position(|&w| w == v) else {
                    continue;
                };
                let (a, b) = (points[vs[(i + 1) % k]], points[vs[(i + k - 1) % k]]);
                let ab = b - a;
                let len = ab.norm();
                if len == 0.0 {
                    continue;
                }
                // Equilateral apex for triangles, right-angle apex for quads
                let height = if k == 3 { 0.5 * 3.0_f64.sqrt() * len } else { 0.5 * len };
                let normal = Vector2::new(-ab.y, ab.x) / len;
                let mid = (a.coords + b.coords) * 0.5;
                sum += mid + normal * height;
                count += 1;
            }
            if count == 0 {
                p
            } else {
                Point2::from(sum / count as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Cell;
    use crate::size::ConstantSize;
    use approx::assert_relative_eq;

    /// `n × n` unit quad grid with its interior vertices jittered.
    fn jittered_grid(n: usize) -> Mesh2d {
        let mut mesh = Mesh2d::new();
        for j in 0..=n {
            for i in 0..=n {
                let interior = i > 0 && j > 0 && i < n && j < n;
                let (dx, dy) = if interior {
                    (0.2 * ((i * 7 + j * 3) % 5) as f64 / 5.0 - 0.1, 0.15 * ((i + j) % 3) as f64 / 3.0 - 0.05)
                } else {
                    (0.0, 0.0)
                };
                mesh.add_point(Point2::new(i as f64 + dx, j as f64 + dy));
            }
        }
        let id = |i: usize, j: usize| j * (n + 1) + i;
        for j in 0..n {
            for i in 0..n {
                mesh.add_cell(Cell::Quad([id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1)]));
            }
        }
        mesh
    }

    fn triangle_fan() -> Mesh2d {
        // Hexagon around an off-center vertex
        let mut points: Vec<Point2<f64>> = (0..6)
            .map(|k| {
                let t = std::f64::consts::PI / 3.0 * k as f64;
                Point2::new(t.cos(), t.sin())
            })
            .collect();
        points.push(Point2::new(0.3, -0.2));
        let triangles: Vec<[usize; 3]> = (0..6).map(|k| [6, k, (k + 1) % 6]).collect();
        Mesh2d::from_triangles(points, &triangles)
    }

    #[test]
    fn test_boundary_never_moves() {
        let mut mesh = jittered_grid(4);
        let before = mesh.points.clone();
        let topo = Topology::build(&mesh).unwrap();
        relax(&mut mesh, &[], None, &RelaxOptions::default()).unwrap();
        for v in 0..mesh.num_points() {
            if topo.is_boundary_vertex(v) {
                assert_eq!(mesh.points[v], before[v]);
            }
        }
    }

    #[test]
    fn test_quality_improves() {
        let mut mesh = jittered_grid(5);
        let before = mesh.quality().min;
        relax(&mut mesh, &[], None, &RelaxOptions::default().with_iterations(20)).unwrap();
        assert!(mesh.validate().is_ok());
        assert!(mesh.quality().min >= 0.9 * before);
        assert!(mesh.quality().mean > 0.95);
    }

    #[test]
    fn test_fixed_vertex_stays() {
        let mut mesh = triangle_fan();
        let report = relax(&mut mesh, &[6], None, &RelaxOptions::default()).unwrap();
        assert_eq!(mesh.points[6], Point2::new(0.3, -0.2));
        assert!(report.converged);
        assert_eq!(report.moves, 0);
    }

    #[test]
    fn test_all_methods_center_the_fan() {
        let methods = [
            RelaxMethod::AreaCentroid,
            RelaxMethod::Laplacian { lambda: 0.5 },
            RelaxMethod::Spring,
            RelaxMethod::Angle,
        ];
        let size = ConstantSize::new(1.0).unwrap();
        for method in methods {
            let mut mesh = triangle_fan();
            let options = RelaxOptions::default()
                .with_method(method)
                .with_iterations(50)
                .sequential();
            relax(&mut mesh, &[], Some(&size), &options).unwrap();
            assert!(mesh.validate().is_ok(), "{method:?}");
            assert!(mesh.points[6].coords.norm() < 0.1, "{method:?}");
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut a = jittered_grid(6);
        let mut b = a.clone();
        relax(&mut a, &[], None, &RelaxOptions::default()).unwrap();
        relax(&mut b, &[], None, &RelaxOptions::default().sequential()).unwrap();
        assert_eq!(a.points, b.points);
    }

    #[test]
    fn test_non_convergence_reported() {
        let mut mesh = jittered_grid(4);
        let report = relax(&mut mesh, &[], None, &RelaxOptions::default().with_iterations(1)).unwrap();
        assert!(!report.converged);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, IssueKind::RelaxationNonConvergence);
    }

    #[test]
    fn test_rejects_inverting_move() {
        let mut mesh = triangle_fan();
        let topo = Topology::build(&mesh).unwrap();
        assert!(!move_is_acceptable(&mesh, &topo, 6, Point2::new(2.0, 0.0), 0.0));
        relax(&mut mesh, &[], None, &RelaxOptions::default()).unwrap();
        for cell in &mesh.cells {
            assert!(mesh.cell_area(cell) > 0.0);
        }
        assert_relative_eq!(mesh.total_area(), 1.5 * 3.0_f64.sqrt(), epsilon = 1e-12);
    }
}
