//! Error types for pavemesh.
//!
//! Errors that abort a polygon's pipeline are [`MeshError`] values. Softer
//! outcomes (no quads could be formed, relaxation did not converge) are
//! reported as [`Diagnostic`](crate::diagnostics::Diagnostic)s instead.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while meshing a polygon.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// The mesh has no cells.
    #[error("mesh has no cells")]
    EmptyMesh,

    /// Degenerate or self-intersecting input that cleaning could not resolve.
    #[error("geometry error: {details}")]
    Geometry {
        /// Description of the geometric problem.
        details: String,
    },

    /// Non-positive, non-finite or unreachable target size.
    #[error("spacing error: {details}")]
    Spacing {
        /// Description of the spacing problem.
        details: String,
    },

    /// A front could not be closed without violating the quality threshold.
    #[error("paving failed: {details}")]
    PavingFailure {
        /// Description of the failure.
        details: String,
    },

    /// The size function was queried outside of its domain.
    #[error("size function is undefined at ({x}, {y})")]
    OutOfDomain {
        /// X coordinate of the query.
        x: f64,
        /// Y coordinate of the query.
        y: f64,
    },

    /// The triangulation collaborator rejected its input.
    #[error("triangulation failed: {details}")]
    Triangulation {
        /// Description of the failure.
        details: String,
    },

    /// Two input polygons overlap.
    #[error("polygon {first} overlaps polygon {second}")]
    Overlap {
        /// Index of the first polygon.
        first: usize,
        /// Index of the second polygon.
        second: usize,
    },

    /// A cell references an invalid point index.
    #[error("cell {cell} references invalid point index {vertex}")]
    InvalidVertexIndex {
        /// The cell index.
        cell: usize,
        /// The invalid point index.
        vertex: usize,
    },

    /// A cell has duplicate point indices.
    #[error("cell {cell} is degenerate (has duplicate points)")]
    DegenerateCell {
        /// The cell index.
        cell: usize,
    },

    /// A cell is inverted or has zero area.
    #[error("cell {cell} is inverted (signed area {area})")]
    InvertedCell {
        /// The cell index.
        cell: usize,
        /// The signed area of the cell.
        area: f64,
    },

    /// A directed edge is used by more than one cell.
    #[error("edge ({v0}, {v1}) is used by more than one cell in the same direction")]
    NonManifoldEdge {
        /// First point of the edge.
        v0: usize,
        /// Second point of the edge.
        v1: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a geometry error.
    pub fn geometry(details: impl Into<String>) -> Self {
        MeshError::Geometry {
            details: details.into(),
        }
    }

    /// Create a spacing error.
    pub fn spacing(details: impl Into<String>) -> Self {
        MeshError::Spacing {
            details: details.into(),
        }
    }

    /// Create a paving failure.
    pub fn paving(details: impl Into<String>) -> Self {
        MeshError::PavingFailure {
            details: details.into(),
        }
    }
}
