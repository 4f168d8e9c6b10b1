//! # meshcollapse
//!
//! In-place triangle mesh decimation for manifold and non-manifold surfaces.
//!
//! meshcollapse keeps a triangle mesh in index arenas with per-edge adjacency
//! that can describe any number of triangles meeting on an edge, and reduces
//! it by collapsing the cheapest legal edges first.
//!
//! ## Features
//!
//! - **Non-manifold adjacency**: edges shared by three or more sheets, and
//!   vertices where separate fans touch, are first-class
//! - **Quadric error costs**: with constraint planes holding the boundary and
//!   non-manifold frame in place
//! - **Validity oracle**: every invariant can be checked at any time, with a
//!   report naming each violation
//! - **Group preservation**: surviving triangles keep their group id
//!
//! ## Quick Start
//!
//! ```
//! use meshcollapse::prelude::*;
//!
//! let mut mesh = Mesh::new();
//! let v: Vec<VertexId> = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]
//!     .iter()
//!     .map(|&(x, y)| mesh.create_vertex(x, y, 0.0))
//!     .collect();
//! for [a, b, c] in [[0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4]] {
//!     let group = mesh.next_group_id();
//!     let t = mesh.create_triangle(v[a], v[b], v[c]).with_group(group);
//!     mesh.add(t).unwrap();
//! }
//! mesh.build_adjacency();
//! assert!(mesh.is_valid());
//!
//! let mut decimator = Decimator::new(&mut mesh, [("size", "0.1")]).unwrap();
//! let stats = decimator.compute().unwrap();
//! assert_eq!(stats.triangles_after, 2);
//! assert_eq!(Decimator::count_inner_triangles(&mesh), 2);
//! assert!(mesh.is_valid());
//! ```
//!
//! ## Inspecting Validity
//!
//! ```
//! use meshcollapse::prelude::*;
//! use nalgebra::Point3;
//!
//! # let vertices = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(0.5, 1.0, 0.0),
//! # ];
//! # let faces = vec![[0, 1, 2]];
//! let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
//! mesh.set_position(VertexId::new(2), Point3::new(2.0, 0.0, 0.0)).unwrap();
//!
//! let report = mesh.validate();
//! assert!(report.has(ViolationKind::Degenerate));
//! println!("{}", report);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use meshcollapse::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::decimate::{
        count_inner_triangles, DecimateOptions, DecimateStats, Decimator, NonManifoldPolicy,
        Placement,
    };
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, to_face_vertex, Adjacency, EdgeKind, GroupId, Label, Mesh,
        Triangle, TriangleId, ValidityReport, Vertex, VertexId, ViolationKind,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
