//! Core mesh data structures.
//!
//! This module provides the mixed triangle/quadrilateral mesh produced by the
//! meshing pipeline, together with adjacency queries and element quality
//! measures.
//!
//! # Overview
//!
//! [`Mesh2d`] stores points in a contiguous array and cells as small index
//! arrays into it. Every cell is counter-clockwise. Quadrilaterals are kept
//! strictly convex by every stage that creates or moves them.
//!
//! [`Topology`] is built on demand from a mesh and answers edge, vertex and
//! boundary queries. It is a snapshot: rebuild it after changing cells.
//!
//! # Construction
//!
//! ```
//! use pavemesh::mesh::{Cell, Mesh2d};
//! use nalgebra::Point2;
//!
//! let mut mesh = Mesh2d::new();
//! let a = mesh.add_point(Point2::new(0.0, 0.0));
//! let b = mesh.add_point(Point2::new(1.0, 0.0));
//! let c = mesh.add_point(Point2::new(1.0, 1.0));
//! let d = mesh.add_point(Point2::new(0.0, 1.0));
//! mesh.add_cell(Cell::Quad([a, b, c, d]));
//!
//! assert!(mesh.validate().is_ok());
//! assert_eq!(mesh.num_quads(), 1);
//! ```

mod quality;
mod topology;

pub use quality::{cell_quality, quad_quality, triangle_quality, QualitySummary};
pub use topology::Topology;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::geometry::{cross, signed_area};

/// A mesh cell: a triangle or a quadrilateral, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// Three point indices.
    Triangle([usize; 3]),
    /// Four point indices.
    Quad([usize; 4]),
}

impl Cell {
    /// The point indices of the cell, in counter-clockwise order.
    #[inline]
    pub fn vertices(&self) -> &[usize] {
        match self {
            Cell::Triangle(v) => v,
            Cell::Quad(v) => v,
        }
    }

    /// Whether the cell is a triangle.
    #[inline]
    pub fn is_triangle(&self) -> bool {
        matches!(self, Cell::Triangle(_))
    }

    /// Whether the cell is a quadrilateral.
    #[inline]
    pub fn is_quad(&self) -> bool {
        matches!(self, Cell::Quad(_))
    }

    /// Directed edges of the cell.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let v = self.vertices();
        let n = v.len();
        (0..n).map(move |i| (v[i], v[(i + 1) % n]))
    }

    /// Apply an index mapping to every vertex.
    pub fn remap(&self, map: impl Fn(usize) -> usize) -> Cell {
        match *self {
            Cell::Triangle([a, b, c]) => Cell::Triangle([map(a), map(b), map(c)]),
            Cell::Quad([a, b, c, d]) => Cell::Quad([map(a), map(b), map(c), map(d)]),
        }
    }

    /// Whether any vertex index repeats.
    pub fn has_duplicate_vertices(&self) -> bool {
        let v = self.vertices();
        (0..v.len()).any(|i| (i + 1..v.len()).any(|j| v[i] == v[j]))
    }
}

/// A 2D mesh of triangles and quadrilaterals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh2d {
    /// Point positions.
    pub points: Vec<Point2<f64>>,
    /// Cells indexing into `points`.
    pub cells: Vec<Cell>,
    /// Optional per-point elevation.
    pub elevations: Option<Vec<f64>>,
}

impl Mesh2d {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh with preallocated storage.
    pub fn with_capacity(num_points: usize, num_cells: usize) -> Self {
        Self {
            points: Vec::with_capacity(num_points),
            cells: Vec::with_capacity(num_cells),
            elevations: None,
        }
    }

    /// Build a triangle mesh from points and index triples.
    pub fn from_triangles(points: Vec<Point2<f64>>, triangles: &[[usize; 3]]) -> Self {
        Self {
            points,
            cells: triangles.iter().map(|&t| Cell::Triangle(t)).collect(),
            elevations: None,
        }
    }

    /// Append a point and return its index.
    pub fn add_point(&mut self, p: Point2<f64>) -> usize {
        self.points.push(p);
        self.points.len() - 1
    }

    /// Append a cell and return its index.
    pub fn add_cell(&mut self, cell: Cell) -> usize {
        self.cells.push(cell);
        self.cells.len() - 1
    }

    /// Number of points.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.cells.iter().filter(|c| c.is_triangle()).count()
    }

    /// Number of quadrilaterals.
    pub fn num_quads(&self) -> usize {
        self.cells.iter().filter(|c| c.is_quad()).count()
    }

    /// Positions of the cell's corners.
    pub fn cell_points(&self, cell: &Cell) -> Vec<Point2<f64>> {
        cell.vertices().iter().map(|&i| self.points[i]).collect()
    }

    /// Signed area of a cell.
    pub fn cell_area(&self, cell: &Cell) -> f64 {
        signed_area(&self.cell_points(cell))
    }

    /// Whether a cell is valid at the current point positions.
    pub fn cell_is_valid(&self, cell: &Cell) -> bool {
        cell_is_valid(&self.cell_points(cell))
    }

    /// Total area of all cells.
    pub fn total_area(&self) -> f64 {
        self.cells.iter().map(|c| self.cell_area(c)).sum()
    }

    /// Check indices, degeneracy and orientation of every cell.
    pub fn validate(&self) -> Result<()> {
        if self.cells.is_empty() {
            return Err(MeshError::EmptyMesh);
        }
        for (ci, cell) in self.cells.iter().enumerate() {
            for &v in cell.vertices() {
                if v >= self.points.len() {
                    return Err(MeshError::InvalidVertexIndex { cell: ci, vertex: v });
                }
            }
            if cell.has_duplicate_vertices() {
                return Err(MeshError::DegenerateCell { cell: ci });
            }
            if !self.cell_is_valid(cell) {
                return Err(MeshError::InvertedCell {
                    cell: ci,
                    area: self.cell_area(cell),
                });
            }
        }
        Ok(())
    }

    /// Whether [`validate`](Self::validate) succeeds.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Quality statistics over all cells.
    pub fn quality(&self) -> QualitySummary {
        QualitySummary::from_values(self.cells.iter().map(|c| cell_quality(&self.cell_points(c))))
    }

    /// Replace every quad by two triangles along its shorter diagonal.
    pub fn split_quads(&mut self) {
        let points = &self.points;
        let mut cells = Vec::with_capacity(self.cells.len() * 2);
        for cell in &self.cells {
            match *cell {
                Cell::Triangle(t) => cells.push(Cell::Triangle(t)),
                Cell::Quad([a, b, c, d]) => {
                    let ac = (points[c] - points[a]).norm_squared();
                    let bd = (points[d] - points[b]).norm_squared();
                    if ac <= bd {
                        cells.push(Cell::Triangle([a, b, c]));
                        cells.push(Cell::Triangle([a, c, d]));
                    } else {
                        cells.push(Cell::Triangle([a, b, d]));
                        cells.push(Cell::Triangle([b, c, d]));
                    }
                }
            }
        }
        self.cells = cells;
    }

    /// Remove points not referenced by any cell, re-indexing the cells.
    ///
    /// Returns the old-to-new index map (`None` for removed points).
    pub fn compact(&mut self) -> Vec<Option<usize>> {
        let mut used = vec![false; self.points.len()];
        for cell in &self.cells {
            for &v in cell.vertices() {
                used[v] = true;
            }
        }
        let mut map = vec![None; self.points.len()];
        let mut points = Vec::with_capacity(self.points.len());
        let mut elevations = self.elevations.as_ref().map(|_| Vec::new());
        for (i, &keep) in used.iter().enumerate() {
            if keep {
                map[i] = Some(points.len());
                points.push(self.points[i]);
                if let (Some(out), Some(z)) = (elevations.as_mut(), self.elevations.as_ref()) {
                    out.push(z[i]);
                }
            }
        }
        self.cells = self
            .cells
            .iter()
            .map(|c| c.remap(|v| map[v].unwrap_or(v)))
            .collect();
        self.points = points;
        self.elevations = elevations;
        map
    }
}

/// Whether a cell given by its corner positions is valid.
///
/// Triangles need a strictly positive area. Quads must be strictly convex
/// and counter-clockwise.
pub fn cell_is_valid(corners: &[Point2<f64>]) -> bool {
    let n = corners.len();
    let scale = corners
        .iter()
        .skip(1)
        .map(|p| (p - corners[0]).norm_squared())
        .fold(0.0, f64::max);
    let eps = 1e-12 * scale;
    if scale == 0.0 {
        return false;
    }
    (0..n).all(|i| cross(&corners[i], &corners[(i + 1) % n], &corners[(i + 2) % n]) > eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad_mesh() -> Mesh2d {
        let mut mesh = Mesh2d::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.add_point(Point2::new(x, y));
        }
        mesh.add_cell(Cell::Quad([0, 1, 2, 3]));
        mesh
    }

    #[test]
    fn test_validate_quad() {
        let mesh = unit_quad_mesh();
        assert!(mesh.validate().is_ok());
        assert!((mesh.total_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_inverted_and_bad_index() {
        let mut mesh = unit_quad_mesh();
        mesh.cells[0] = Cell::Quad([0, 3, 2, 1]);
        assert!(matches!(mesh.validate(), Err(MeshError::InvertedCell { .. })));

        mesh.cells[0] = Cell::Triangle([0, 1, 7]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::InvalidVertexIndex { cell: 0, vertex: 7 })
        ));

        mesh.cells[0] = Cell::Triangle([0, 1, 1]);
        assert!(matches!(mesh.validate(), Err(MeshError::DegenerateCell { cell: 0 })));
    }

    #[test]
    fn test_nonconvex_quad_is_invalid() {
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(0.0, 2.0),
        ];
        assert!(!cell_is_valid(&corners));
    }

    #[test]
    fn test_split_quads() {
        let mut mesh = unit_quad_mesh();
        mesh.split_quads();
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.num_quads(), 0);
        assert!(mesh.validate().is_ok());
        assert!((mesh.total_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_compact_removes_unused() {
        let mut mesh = unit_quad_mesh();
        mesh.add_point(Point2::new(5.0, 5.0));
        mesh.points.swap(0, 4);
        mesh.cells[0] = Cell::Quad([4, 1, 2, 3]);
        let map = mesh.compact();
        assert_eq!(mesh.num_points(), 4);
        assert_eq!(map[0], None);
        assert!(mesh.validate().is_ok());
    }
}
