//! Error types for meshcollapse.
//!
//! This module defines all error types used throughout the library. Illegal
//! collapses are not errors: the decimator discards them and moves on (see
//! [`crate::algo::decimate::Rejection`]).

use thiserror::Error;

use crate::mesh::{TriangleId, ValidityReport, VertexId};

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A vertex handle does not name a live vertex of this mesh.
    #[error("vertex {0:?} does not exist or has been retired")]
    InvalidVertex(VertexId),

    /// A triangle handle does not name a live triangle of this mesh.
    #[error("triangle {0:?} does not exist or has been retired")]
    InvalidTriangle(TriangleId),

    /// A triangle has duplicate vertex references.
    #[error("triangle {triangle} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// Index the triangle had or would have had in the mesh.
        triangle: usize,
    },

    /// A vertex link must name a triangle incident to that vertex.
    #[error("triangle {triangle:?} does not reference vertex {vertex:?}")]
    LinkNotIncident {
        /// The vertex whose link was being set.
        vertex: VertexId,
        /// The offending triangle.
        triangle: TriangleId,
    },

    /// Adjacency was not built, or the mesh changed since it was.
    #[error("adjacency has not been built (call Mesh::build_adjacency first)")]
    AdjacencyNotBuilt,

    /// The mesh failed the validity checker.
    #[error("mesh is not valid: {report}")]
    InvalidMesh {
        /// Every violation found.
        report: ValidityReport,
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
}
