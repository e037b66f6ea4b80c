//! Triangle-to-quad conversion by weighted matching.
//!
//! Two triangles sharing an interior edge form a candidate quad. Each
//! candidate is scored by a cost function, and a maximum-weight,
//! maximum-cardinality matching on the triangle adjacency graph picks the set
//! of merges that converts as many triangles as possible while preferring
//! well-shaped quads.
//!
//! # Algorithm
//!
//! 1. For every interior edge `u-v` between triangles `A = (u, v, p)` and
//!    `B = (v, u, q)` (with `A < B`) form the quad `(u, q, v, p)`.
//! 2. Skip locked edges, non-convex quads and quads with cost above
//!    `max_cost`.
//! 3. Weight each candidate `round((2 − cost) · 1000)` and solve the
//!    matching ([`blossom::max_weight_matching`]).
//! 4. Replace every matched pair by its quad.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::quad::{merge_triangles, QuadOptions};
//! use pavemesh::mesh::Mesh2d;
//! use nalgebra::Point2;
//!
//! let points = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ];
//! let mut mesh = Mesh2d::from_triangles(points, &[[0, 1, 2], [0, 2, 3]]);
//! let report = merge_triangles(&mut mesh, &[], &QuadOptions::default()).unwrap();
//!
//! assert_eq!(report.quads_formed, 1);
//! assert_eq!(mesh.num_quads(), 1);
//! ```

pub mod blossom;
pub mod cost;

use std::collections::HashSet;
use std::sync::Arc;

use nalgebra::Point2;

use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::Result;
use crate::mesh::{cell_is_valid, Cell, Mesh2d, Topology};

pub use cost::{default_cost, QuadCost};

/// Options for triangle merging.
#[derive(Clone)]
pub struct QuadOptions {
    /// Cost of a candidate quad (default: [`default_cost`]).
    pub cost: QuadCost,

    /// Candidates above this cost are not considered (default: 0.8).
    pub max_cost: f64,

    /// Prefer the largest number of quads over total weight (default: true).
    pub max_cardinality: bool,
}

impl Default for QuadOptions {
    fn default() -> Self {
        Self {
            cost: Arc::new(default_cost),
            max_cost: 0.8,
            max_cardinality: true,
        }
    }
}

impl QuadOptions {
    /// Replace the cost function.
    pub fn with_cost<F>(mut self, cost: F) -> Self
    where
        F: Fn(&[Point2<f64>; 4]) -> f64 + Send + Sync + 'static,
    {
        self.cost = Arc::new(cost);
        self
    }

    /// Set the maximum candidate cost.
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Enable or disable max-cardinality matching.
    pub fn with_max_cardinality(mut self, max_cardinality: bool) -> Self {
        self.max_cardinality = max_cardinality;
        self
    }
}

impl std::fmt::Debug for QuadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadOptions")
            .field("max_cost", &self.max_cost)
            .field("max_cardinality", &self.max_cardinality)
            .finish_non_exhaustive()
    }
}

/// Outcome of triangle merging.
#[derive(Debug, Clone, Default)]
pub struct QuadReport {
    /// Candidate triangle pairs that passed the convexity and cost checks.
    pub pairs_considered: usize,
    /// Quads formed.
    pub quads_formed: usize,
    /// Triangles left unmatched.
    pub triangles_left: usize,
    /// Recovered problems.
    pub diagnostics: Vec<Diagnostic>,
}

/// A triangle pair that may be merged.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    first: usize,
    second: usize,
    quad: [usize; 4],
    weight: i64,
}

/// Merge triangle pairs of `mesh` into quads.
///
/// Quads already in the mesh are kept. Edges listed in `locked_edges`
/// (in either orientation) are never removed.
///
/// # Errors
///
/// Returns an error if the mesh topology is invalid.
pub fn merge_triangles(
    mesh: &mut Mesh2d,
    locked_edges: &[(usize, usize)],
    options: &QuadOptions,
) -> Result<QuadReport> {
    let locked: HashSet<(usize, usize)> = locked_edges
        .iter()
        .map(|&(a, b)| (a.min(b), a.max(b)))
        .collect();
    let candidates = find_candidates(mesh, &locked, options)?;

    let mut report = QuadReport {
        pairs_considered: candidates.len(),
        ..Default::default()
    };
    if candidates.is_empty() {
        report.triangles_left = mesh.num_triangles();
        if mesh.num_triangles() > 1 {
            report.diagnostics.push(Diagnostic::info(
                IssueKind::MatchingInfeasible,
                "no triangle pair forms an acceptable quad",
            ));
        }
        return Ok(report);
    }

    // Dense numbering of the triangles taking part in the matching
    let mut slot = vec![usize::MAX; mesh.num_cells()];
    let mut cells_of_slot = Vec::new();
    for c in &candidates {
        for cell in [c.first, c.second] {
            if slot[cell] == usize::MAX {
                slot[cell] = cells_of_slot.len();
                cells_of_slot.push(cell);
            }
        }
    }
    let edges: Vec<(usize, usize, i64)> = candidates
        .iter()
        .map(|c| (slot[c.first], slot[c.second], c.weight))
        .collect();
    let mate = blossom::max_weight_matching(cells_of_slot.len(), &edges, options.max_cardinality);

    let mut merged: Vec<Option<[usize; 4]>> = vec![None; mesh.num_cells()];
    let mut partner = vec![usize::MAX; mesh.num_cells()];
    for c in &candidates {
        if mate[slot[c.first]] == Some(slot[c.second]) {
            merged[c.first] = Some(c.quad);
            partner[c.second] = c.first;
        }
    }

    let mut cells = Vec::with_capacity(mesh.num_cells());
    for (ci, cell) in mesh.cells.iter().enumerate() {
        if let Some(quad) = merged[ci] {
            cells.push(Cell::Quad(quad));
            report.quads_formed += 1;
        } else if partner[ci] == usize::MAX {
            if cell.is_triangle() {
                report.triangles_left += 1;
            }
            cells.push(*cell);
        }
    }
    mesh.cells = cells;

    log::debug!(
        "quad matching: {} candidates, {} quads, {} triangles left",
        report.pairs_considered,
        report.quads_formed,
        report.triangles_left
    );
    Ok(report)
}

/// Candidate pairs in sorted triangle order.
fn find_candidates(
    mesh: &Mesh2d,
    locked: &HashSet<(usize, usize)>,
    options: &QuadOptions,
) -> Result<Vec<Candidate>> {
    let topo = Topology::build(mesh)?;
    let mut candidates = Vec::new();
    for (first, cell) in mesh.cells.iter().enumerate() {
        let Cell::Triangle(t) = *cell else {
            continue;
        };
        for e in 0..3 {
            let (u, v, p) = (t[e], t[(e + 1) % 3], t[(e + 2) % 3]);
            if locked.contains(&(u.min(v), u.max(v))) {
                continue;
            }
            let Some(second) = topo.cell_across(u, v) else {
                continue;
            };
            if second <= first {
                continue;
            }
            let Cell::Triangle(s) = mesh.cells[second] else {
                continue;
            };
            let Some(q) = s.iter().copied().find(|&w| w != u && w != v) else {
                continue;
            };
            let quad = [u, q, v, p];
            let corners = quad.map(|i| mesh.points[i]);
            if !cell_is_valid(&corners) {
                continue;
            }
            let cost = (options.cost)(&corners);
            if !cost.is_finite() || cost > options.max_cost {
                continue;
            }
            candidates.push(Candidate {
                first,
                second,
                quad,
                weight: cost::weight(cost),
            });
        }
    }
    candidates.sort_by_key(|c| (c.first, c.second));
    Ok(candidates)
}
