//! Adjacency snapshot of a [`Mesh2d`].
//!
//! Every cell contributes its directed edges to an edge map. Two cells are
//! neighbors when one holds `(v0, v1)` and the other holds `(v1, v0)`. An edge
//! with no opposite entry lies on the boundary.

use std::collections::HashMap;

use super::Mesh2d;
use crate::error::{MeshError, Result};

/// Edge, vertex and boundary adjacency of a mesh.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Directed edge -> owning cell.
    edge_cells: HashMap<(usize, usize), usize>,
    /// Cells incident to each vertex.
    vertex_cells: Vec<Vec<usize>>,
    /// Sorted, unique neighbors of each vertex.
    vertex_neighbors: Vec<Vec<usize>>,
    /// Whether each vertex touches a boundary edge (or no cell at all).
    boundary: Vec<bool>,
}

impl Topology {
    /// Build the adjacency of `mesh`.
    ///
    /// # Errors
    ///
    /// * [`MeshError::InvalidVertexIndex`] if a cell references a missing point
    /// * [`MeshError::NonManifoldEdge`] if two cells share a directed edge,
    ///   which means they overlap or disagree on orientation
    pub fn build(mesh: &Mesh2d) -> Result<Self> {
        let n = mesh.num_points();
        let mut edge_cells: HashMap<(usize, usize), usize> =
            HashMap::with_capacity(mesh.num_cells() * 4);
        let mut vertex_cells = vec![Vec::new(); n];

        for (ci, cell) in mesh.cells.iter().enumerate() {
            for &v in cell.vertices() {
                if v >= n {
                    return Err(MeshError::InvalidVertexIndex { cell: ci, vertex: v });
                }
                vertex_cells[v].push(ci);
            }
            for (v0, v1) in cell.edges() {
                if edge_cells.insert((v0, v1), ci).is_some() {
                    return Err(MeshError::NonManifoldEdge { v0, v1 });
                }
            }
        }

        let mut vertex_neighbors = vec![Vec::new(); n];
        let mut boundary = vec![false; n];
        for &(v0, v1) in edge_cells.keys() {
            vertex_neighbors[v0].push(v1);
            vertex_neighbors[v1].push(v0);
            if !edge_cells.contains_key(&(v1, v0)) {
                boundary[v0] = true;
                boundary[v1] = true;
            }
        }
        for (v, nbrs) in vertex_neighbors.iter_mut().enumerate() {
            nbrs.sort_unstable();
            nbrs.dedup();
            if vertex_cells[v].is_empty() {
                boundary[v] = true;
            }
        }

        Ok(Self {
            edge_cells,
            vertex_cells,
            vertex_neighbors,
            boundary,
        })
    }

    /// Number of vertices covered by the snapshot.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertex_cells.len()
    }

    /// The cell that owns the directed edge `(v0, v1)`.
    #[inline]
    pub fn edge_cell(&self, v0: usize, v1: usize) -> Option<usize> {
        self.edge_cells.get(&(v0, v1)).copied()
    }

    /// The cell on the other side of the directed edge `(v0, v1)`.
    #[inline]
    pub fn cell_across(&self, v0: usize, v1: usize) -> Option<usize> {
        self.edge_cells.get(&(v1, v0)).copied()
    }

    /// Whether the undirected edge `{v0, v1}` has exactly one incident cell.
    pub fn is_boundary_edge(&self, v0: usize, v1: usize) -> bool {
        self.edge_cells.contains_key(&(v0, v1)) != self.edge_cells.contains_key(&(v1, v0))
    }

    /// Whether a vertex lies on the mesh boundary.
    #[inline]
    pub fn is_boundary_vertex(&self, v: usize) -> bool {
        self.boundary[v]
    }

    /// Cells incident to a vertex.
    #[inline]
    pub fn vertex_cells(&self, v: usize) -> &[usize] {
        &self.vertex_cells[v]
    }

    /// Neighbors of a vertex, sorted.
    #[inline]
    pub fn vertex_neighbors(&self, v: usize) -> &[usize] {
        &self.vertex_neighbors[v]
    }

    /// Directed boundary edges (cell on the left), sorted.
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .edge_cells
            .keys()
            .filter(|&&(v0, v1)| !self.edge_cells.contains_key(&(v1, v0)))
            .copied()
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Interior edges as `(min, max)` pairs, each listed once, sorted.
    pub fn interior_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .edge_cells
            .keys()
            .filter(|&&(v0, v1)| v0 < v1 && self.edge_cells.contains_key(&(v1, v0)))
            .copied()
            .collect();
        edges.sort_unstable();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Cell;
    use nalgebra::Point2;

    /// Two triangles sharing the diagonal of the unit square.
    fn two_triangles() -> Mesh2d {
        Mesh2d::from_triangles(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    /// 3x3 grid of points, 2x2 quads, with one interior vertex (4).
    fn quad_grid() -> Mesh2d {
        let mut mesh = Mesh2d::new();
        for j in 0..3 {
            for i in 0..3 {
                mesh.add_point(Point2::new(i as f64, j as f64));
            }
        }
        for j in 0..2 {
            for i in 0..2 {
                let v = j * 3 + i;
                mesh.add_cell(Cell::Quad([v, v + 1, v + 4, v + 3]));
            }
        }
        mesh
    }

    #[test]
    fn test_two_triangles() {
        let mesh = two_triangles();
        let topo = Topology::build(&mesh).unwrap();
        assert_eq!(topo.cell_across(0, 2), Some(1));
        assert_eq!(topo.cell_across(2, 0), Some(0));
        assert_eq!(topo.cell_across(0, 1), None);
        assert!(topo.is_boundary_edge(0, 1));
        assert!(!topo.is_boundary_edge(0, 2));
        assert_eq!(topo.interior_edges(), vec![(0, 2)]);
        assert_eq!(topo.boundary_edges().len(), 4);
        assert_eq!(topo.vertex_neighbors(0), &[1, 2, 3]);
    }

    #[test]
    fn test_interior_vertex() {
        let mesh = quad_grid();
        let topo = Topology::build(&mesh).unwrap();
        assert!(!topo.is_boundary_vertex(4));
        assert!(topo.is_boundary_vertex(0));
        assert_eq!(topo.vertex_cells(4).len(), 4);
        assert_eq!(topo.vertex_neighbors(4), &[1, 3, 5, 7]);
    }

    #[test]
    fn test_duplicate_directed_edge() {
        let mut mesh = two_triangles();
        mesh.cells.push(Cell::Triangle([0, 1, 3]));
        assert!(matches!(
            Topology::build(&mesh),
            Err(MeshError::NonManifoldEdge { v0: 0, v1: 1 })
        ));
    }

    #[test]
    fn test_unreferenced_point_is_fixed() {
        let mut mesh = two_triangles();
        mesh.add_point(Point2::new(3.0, 3.0));
        let topo = Topology::build(&mesh).unwrap();
        assert!(topo.is_boundary_vertex(4));
        assert!(topo.vertex_cells(4).is_empty());
    }
}
