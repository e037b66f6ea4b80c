//! Local repair of low-quality quads.
//!
//! After matching and relaxation a few quads may still be badly shaped.
//! Each one is repaired locally, together with at most one neighbor:
//!
//! 1. **Re-pair** with an adjacent triangle: the quad and the triangle form a
//!    pentagon, which is re-split into a quad and a triangle.
//! 2. **Re-split** with an adjacent quad: the two quads form a hexagon, which
//!    is split along one of its other two long diagonals.
//! 3. **Split** the quad into two triangles along the better diagonal.
//!
//! A strategy is accepted only if every new cell is valid and the worst
//! quality of the affected cells goes up. Cells touched by a repair are left
//! alone for the rest of the pass.

use std::collections::HashSet;

use nalgebra::Point2;

use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::Result;
use crate::geometry::ring_centroid;
use crate::mesh::{cell_is_valid, cell_quality, Cell, Mesh2d, Topology};

/// Options for bad-quad repair.
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Quads below this quality are repaired (default: 0.35).
    pub threshold: f64,

    /// Maximum number of passes (default: 2).
    pub max_passes: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            max_passes: 2,
        }
    }
}

impl RepairOptions {
    /// Set the quality threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the maximum number of passes.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }
}

/// Outcome of bad-quad repair.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    /// Bad quads found before the first pass.
    pub bad_quads: usize,
    /// Repairs applied.
    pub repaired: usize,
    /// Passes run.
    pub passes: usize,
    /// One warning per quad left below the threshold.
    pub diagnostics: Vec<Diagnostic>,
}

/// A local replacement: `cell` (and `consumed`, if any) become `cells`.
#[derive(Debug, Clone)]
struct Fix {
    cells: Vec<Cell>,
    consumed: Option<usize>,
    quality: f64,
}

/// Repair the quads of `mesh` whose quality is below the threshold.
///
/// Edges in `locked_edges` are never removed.
///
/// # Example
///
/// ```
/// use pavemesh::algo::repair::{repair_quads, RepairOptions};
/// use pavemesh::mesh::{Cell, Mesh2d};
/// use nalgebra::Point2;
///
/// let mut mesh = Mesh2d::new();
/// for (x, y) in [(0.0, 0.0), (3.0, 0.0), (1.2, 1.0), (0.0, 1.0)] {
///     mesh.add_point(Point2::new(x, y));
/// }
/// mesh.add_cell(Cell::Quad([0, 1, 2, 3]));
///
/// let report = repair_quads(&mut mesh, &[], &RepairOptions::default()).unwrap();
/// assert_eq!(report.repaired, 1);
/// assert_eq!(mesh.num_triangles(), 2);
/// ```
///
/// # Errors
///
/// Returns an error if the mesh topology is invalid.
pub fn repair_quads(
    mesh: &mut Mesh2d,
    locked_edges: &[(usize, usize)],
    options: &RepairOptions,
) -> Result<RepairReport> {
    let locked: HashSet<(usize, usize)> = locked_edges
        .iter()
        .map(|&(a, b)| (a.min(b), a.max(b)))
        .collect();
    let mut report = RepairReport::default();

    for pass in 0..options.max_passes {
        let bad = bad_quads(mesh, options.threshold);
        if pass == 0 {
            report.bad_quads = bad.len();
        }
        if bad.is_empty() {
            break;
        }
        let topo = Topology::build(mesh)?;
        let mut touched = vec![false; mesh.num_cells()];
        let mut replacement: Vec<Option<Vec<Cell>>> = vec![None; mesh.num_cells()];
        let mut repaired = 0;

        for (ci, quality) in bad {
            if touched[ci] {
                continue;
            }
            let Cell::Quad(quad) = mesh.cells[ci] else {
                continue;
            };
            let Some(fix) = find_fix(mesh, &topo, &locked, &touched, quad, quality) else {
                continue;
            };
            touched[ci] = true;
            if let Some(n) = fix.consumed {
                touched[n] = true;
                replacement[n] = Some(Vec::new());
            }
            replacement[ci] = Some(fix.cells);
            repaired += 1;
        }

        report.passes = pass + 1;
        if repaired == 0 {
            break;
        }
        report.repaired += repaired;
        let mut cells = Vec::with_capacity(mesh.num_cells() + repaired);
        for (cell, replaced) in mesh.cells.iter().zip(replacement) {
            match replaced {
                Some(new_cells) => cells.extend(new_cells),
                None => cells.push(*cell),
            }
        }
        mesh.cells = cells;
    }

    for (ci, quality) in bad_quads(mesh, options.threshold) {
        let corners = mesh.cell_points(&mesh.cells[ci]);
        report.diagnostics.push(
            Diagnostic::warning(
                IssueKind::BadQuadUnrepaired,
                format!("quad {} left with quality {:.3}", ci, quality),
            )
            .at(ring_centroid(&corners)),
        );
    }
    log::debug!(
        "repaired {} of {} bad quads in {} passes",
        report.repaired,
        report.bad_quads,
        report.passes
    );
    Ok(report)
}

/// Quads below `threshold`, worst first.
fn bad_quads(mesh: &Mesh2d, threshold: f64) -> Vec<(usize, f64)> {
    let mut bad: Vec<(usize, f64)> = mesh
        .cells
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_quad())
        .map(|(i, c)| (i, cell_quality(&mesh.cell_points(c))))
        .filter(|&(_, q)| q < threshold)
        .collect();
    bad.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    bad
}

fn find_fix(
    mesh: &Mesh2d,
    topo: &Topology,
    locked: &HashSet<(usize, usize)>,
    touched: &[bool],
    quad: [usize; 4],
    quality: f64,
) -> Option<Fix> {
    let mut with_triangle: Option<Fix> = None;
    let mut with_quad: Option<Fix> = None;

    for i in 0..4 {
        let (u, v) = (quad[i], quad[(i + 1) % 4]);
        if locked.contains(&(u.min(v), u.max(v))) {
            continue;
        }
        let Some(n) = topo.cell_across(u, v) else {
            continue;
        };
        if touched[n] {
            continue;
        }
        let neighbor = mesh.cells[n];
        let old = quality.min(cell_quality(&mesh.cell_points(&neighbor)));
        // The union, counter-clockwise, starting at v
        let mut ring = vec![v, quad[(i + 2) % 4], quad[(i + 3) % 4], u];
        let vs = neighbor.vertices();
        let Some(at_u) = vs.iter().position(|&w| w == u) else {
            continue;
        };
        ring.extend((1..vs.len() - 1).map(|k| vs[(at_u + k) % vs.len()]));

        let (best, candidates) = match neighbor {
            Cell::Triangle(_) => (&mut with_triangle, split_pentagon(&ring)),
            Cell::Quad(_) => (&mut with_quad, split_hexagon(&ring)),
        };
        for cells in candidates {
            let Some(q) = min_quality_if_valid(mesh, &cells) else {
                continue;
            };
            if q > old + 1e-12 && best.as_ref().map_or(true, |b| q > b.quality) {
                *best = Some(Fix {
                    cells,
                    consumed: Some(n),
                    quality: q,
                });
            }
        }
    }
    if with_triangle.is_some() {
        return with_triangle;
    }
    if with_quad.is_some() {
        return with_quad;
    }

    let [a, b, c, d] = quad;
    [
        vec![Cell::Triangle([a, b, c]), Cell::Triangle([a, c, d])],
        vec![Cell::Triangle([a, b, d]), Cell::Triangle([b, c, d])],
    ]
    .into_iter()
    .filter_map(|cells| Some((min_quality_if_valid(mesh, &cells)?, cells)))
    .filter(|(q, _)| *q > quality + 1e-12)
    .max_by(|x, y| x.0.total_cmp(&y.0))
    .map(|(q, cells)| Fix {
        cells,
        consumed: None,
        quality: q,
    })
}

/// The five quad-plus-triangle splits of a pentagon.
fn split_pentagon(p: &[usize]) -> Vec<Vec<Cell>> {
    (0..5)
        .map(|e| {
            let at = |k: usize| p[(e + k) % 5];
            vec![
                Cell::Triangle([at(4), at(0), at(1)]),
                Cell::Quad([at(1), at(2), at(3), at(4)]),
            ]
        })
        .collect()
}

/// The two alternative quad-pair splits of a hexagon (the current split runs
/// from vertex 0 to vertex 3).
fn split_hexagon(h: &[usize]) -> Vec<Vec<Cell>> {
    (1..3)
        .map(|k| {
            let at = |j: usize| h[(k + j) % 6];
            vec![
                Cell::Quad([at(0), at(1), at(2), at(3)]),
                Cell::Quad([at(3), at(4), at(5), at(0)]),
            ]
        })
        .collect()
}

fn min_quality_if_valid(mesh: &Mesh2d, cells: &[Cell]) -> Option<f64> {
    let mut worst = f64::INFINITY;
    for cell in cells {
        let corners: Vec<Point2<f64>> = mesh.cell_points(cell);
        if !cell_is_valid(&corners) {
            return None;
        }
        worst = worst.min(cell_quality(&corners));
    }
    Some(worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mesh_from(points: &[(f64, f64)], cells: &[Cell]) -> Mesh2d {
        let mut mesh = Mesh2d::new();
        for &(x, y) in points {
            mesh.add_point(Point2::new(x, y));
        }
        for &c in cells {
            mesh.add_cell(c);
        }
        mesh
    }

    #[test]
    fn test_lone_bad_quad_is_split() {
        let mut mesh = mesh_from(
            &[(0.0, 0.0), (3.0, 0.0), (1.2, 1.0), (0.0, 1.0)],
            &[Cell::Quad([0, 1, 2, 3])],
        );
        let report = repair_quads(&mut mesh, &[], &RepairOptions::default()).unwrap();
        assert_eq!(report.bad_quads, 1);
        assert_eq!(report.repaired, 1);
        assert!(report.diagnostics.is_empty());
        assert!(mesh.validate().is_ok());
        assert_relative_eq!(mesh.total_area(), 2.1, epsilon = 1e-12);
    }

    #[test]
    fn test_repair_with_adjacent_triangle() {
        let mut mesh = mesh_from(
            &[(0.0, 0.0), (3.0, 0.0), (1.2, 1.0), (0.0, 1.0), (3.0, 1.0)],
            &[Cell::Quad([0, 1, 2, 3]), Cell::Triangle([2, 1, 4])],
        );
        let before = mesh.quality().min;
        let report = repair_quads(&mut mesh, &[], &RepairOptions::default()).unwrap();
        assert_eq!(report.repaired, 1);
        assert_eq!(mesh.num_quads(), 1);
        assert_eq!(mesh.num_triangles(), 1);
        assert!(mesh.validate().is_ok());
        assert!(mesh.quality().min > before);
        assert_relative_eq!(mesh.total_area(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_locked_edge_blocks_repair() {
        let mut mesh = mesh_from(
            &[(0.0, 0.0), (3.0, 0.0), (1.2, 1.0), (0.0, 1.0), (3.0, 1.0)],
            &[Cell::Quad([0, 1, 2, 3]), Cell::Triangle([2, 1, 4])],
        );
        repair_quads(&mut mesh, &[(1, 2)], &RepairOptions::default()).unwrap();
        // Falls back to splitting the quad; the locked edge survives
        assert_eq!(mesh.num_quads(), 0);
        let topo = Topology::build(&mesh).unwrap();
        assert!(topo.edge_cell(1, 2).is_some() || topo.edge_cell(2, 1).is_some());
    }

    #[test]
    fn test_good_quads_untouched() {
        let mut mesh = mesh_from(
            &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)],
            &[Cell::Quad([0, 1, 2, 3])],
        );
        let report = repair_quads(&mut mesh, &[], &RepairOptions::default()).unwrap();
        assert_eq!(report.bad_quads, 0);
        assert_eq!(report.passes, 0);
        assert_eq!(mesh.num_quads(), 1);
    }

    #[test]
    fn test_unrepairable_quad_reported() {
        let mut mesh = mesh_from(
            &[(0.0, 0.0), (3.0, 0.0), (1.2, 1.0), (0.0, 1.0)],
            &[Cell::Quad([0, 1, 2, 3])],
        );
        let options = RepairOptions::default().with_max_passes(0);
        let report = repair_quads(&mut mesh, &[], &options).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, IssueKind::BadQuadUnrepaired);
    }
}
