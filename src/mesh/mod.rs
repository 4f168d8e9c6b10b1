//! Core mesh data structures.
//!
//! This module provides the triangle mesh representation used by the
//! decimator, together with adjacency construction, the edge collapse
//! primitive and the validity checker.
//!
//! # Overview
//!
//! The primary type is [`Mesh`], an arena of vertices and triangles with
//! per-edge adjacency. Unlike a classic half-edge structure, an edge may be
//! shared by any number of triangles: manifold edges link two triangles
//! directly, non-manifold edges point at a shared [`Fan`] record.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`TriangleId`] - Identifies a triangle
//! - [`FanId`] - Identifies a non-manifold fan
//!
//! # Construction
//!
//! ```
//! use meshcollapse::mesh::Mesh;
//!
//! let mut mesh = Mesh::new();
//! let a = mesh.create_vertex(0.0, 0.0, 0.0);
//! let b = mesh.create_vertex(1.0, 0.0, 0.0);
//! let c = mesh.create_vertex(0.5, 1.0, 0.0);
//! let group = mesh.next_group_id();
//! let t = mesh.create_triangle(a, b, c).with_group(group);
//! mesh.add(t).unwrap();
//!
//! let report = mesh.build_adjacency();
//! assert_eq!(report.boundary_edges, 3);
//! assert!(mesh.is_valid());
//! ```

mod adjacency;
mod builder;
mod collapse;
mod container;
mod element;
mod index;
mod validate;

pub use adjacency::AdjacencyReport;
pub use builder::{build_from_triangles, to_face_vertex};
pub use container::{Mesh, DEGENERATE_EPSILON};
pub use element::{Adjacency, EdgeKind, EdgeSlot, Fan, Triangle, Vertex};
pub use index::{edge_key, FanId, GroupId, Label, TriangleId, VertexId};
pub use validate::{check, GroupSnapshot, ValidityReport, Violation, ViolationKind};

pub(crate) use container::{is_degenerate, triangle_cross};
