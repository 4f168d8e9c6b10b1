//! Mesh elements: vertices, triangles and the per-edge adjacency record.
//!
//! # Edge numbering
//!
//! Edge `i` of a triangle joins `vertices[i]` and `vertices[(i + 1) % 3]`, in
//! that direction. Two triangles sharing a manifold edge traverse it in
//! opposite directions.
//!
//! # Adjacency
//!
//! Each triangle edge carries an [`Adjacency`] value rather than a fixed
//! neighbor pointer. Boundary edges have no neighbor, manifold edges point at
//! exactly one neighbor slot, and non-manifold edges point at a shared [`Fan`]
//! listing every triangle on the edge.

use nalgebra::Point3;
use smallvec::SmallVec;

use super::index::{FanId, GroupId, Label, TriangleId, VertexId};

/// A `(triangle, edge)` pair naming one side of an undirected edge.
pub type EdgeSlot = (TriangleId, u8);

/// A vertex of the mesh.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) position: Point3<f64>,
    pub(crate) label: Label,
    /// One incident triangle per edge-connected fan of the vertex star.
    pub(crate) link: SmallVec<[TriangleId; 1]>,
    pub(crate) manifold: bool,
    pub(crate) alive: bool,
}

impl Vertex {
    pub(crate) fn new(position: Point3<f64>, label: Label) -> Self {
        Self {
            position,
            label,
            link: SmallVec::new(),
            manifold: true,
            alive: true,
        }
    }

    /// The 3D position of this vertex.
    #[inline]
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    /// The stable label of this vertex.
    #[inline]
    pub fn label(&self) -> Label {
        self.label
    }

    /// One incident triangle, if the vertex is referenced by any.
    #[inline]
    pub fn link(&self) -> Option<TriangleId> {
        self.link.first().copied()
    }

    /// One incident triangle per fan around this vertex.
    ///
    /// A manifold vertex has at most one fan. Vertices shared by patches that
    /// only touch at the vertex have several.
    #[inline]
    pub fn fans(&self) -> &[TriangleId] {
        &self.link
    }

    /// Whether the vertex has a single fan and lies on no non-manifold edge.
    ///
    /// Only meaningful once adjacency has been built.
    #[inline]
    pub fn is_manifold(&self) -> bool {
        self.manifold
    }

    /// Whether the vertex is still part of the mesh.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Neighbor record of one triangle edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjacency {
    /// Adjacency has not been computed for this edge.
    #[default]
    Unset,
    /// No other triangle shares this edge.
    Boundary,
    /// Exactly one other triangle shares this edge, with opposite winding.
    Manifold {
        /// The neighboring triangle.
        triangle: TriangleId,
        /// The index of the shared edge inside the neighbor.
        edge: u8,
    },
    /// The edge is shared by three or more triangles, or by two with the same
    /// winding.
    NonManifold(FanId),
}

impl Adjacency {
    /// Whether this edge belongs to the frame (boundary or non-manifold).
    #[inline]
    pub fn is_frame(&self) -> bool {
        matches!(self, Adjacency::Boundary | Adjacency::NonManifold(_))
    }
}

/// Classification of an undirected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// One incident triangle.
    Boundary,
    /// Two incident triangles with opposite winding.
    Manifold,
    /// Three or more incident triangles, or two with inconsistent winding.
    NonManifold,
}

/// All triangles sharing one non-manifold edge.
#[derive(Debug, Clone)]
pub struct Fan {
    pub(crate) members: SmallVec<[EdgeSlot; 4]>,
    pub(crate) winding_conflict: bool,
    pub(crate) alive: bool,
}

impl Fan {
    /// The `(triangle, edge)` slots on this edge, in triangle order.
    #[inline]
    pub fn members(&self) -> &[EdgeSlot] {
        &self.members
    }

    /// True when the fan only exists because two triangles disagree on the
    /// edge's direction.
    #[inline]
    pub fn is_winding_conflict(&self) -> bool {
        self.winding_conflict
    }

    /// Whether the fan still describes a live edge.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// A triangle of the mesh.
///
/// Obtained detached from [`Mesh::create_triangle`](super::Mesh::create_triangle)
/// and handed back through [`Mesh::add`](super::Mesh::add).
#[derive(Debug, Clone)]
pub struct Triangle {
    pub(crate) vertices: [VertexId; 3],
    pub(crate) adjacency: [Adjacency; 3],
    pub(crate) group: GroupId,
    pub(crate) alive: bool,
}

impl Triangle {
    pub(crate) fn new(vertices: [VertexId; 3]) -> Self {
        Self {
            vertices,
            adjacency: [Adjacency::Unset; 3],
            group: 0,
            alive: true,
        }
    }

    /// Set the group this triangle belongs to before it is added.
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = group;
        self
    }

    /// The three vertices, in winding order.
    #[inline]
    pub fn vertices(&self) -> [VertexId; 3] {
        self.vertices
    }

    /// The group identifier.
    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Adjacency of edge `i`.
    #[inline]
    pub fn adjacency(&self, edge: usize) -> Adjacency {
        self.adjacency[edge]
    }

    /// Whether the triangle is still part of the mesh.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Directed edge `i`.
    #[inline]
    pub fn edge(&self, edge: usize) -> (VertexId, VertexId) {
        (self.vertices[edge], self.vertices[(edge + 1) % 3])
    }

    /// Position of `v` inside this triangle.
    #[inline]
    pub fn index_of(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&w| w == v)
    }

    /// Whether `v` is one of the corners.
    #[inline]
    pub fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    /// Index of the edge joining `a` and `b` in either direction.
    pub fn edge_index(&self, a: VertexId, b: VertexId) -> Option<usize> {
        (0..3).find(|&i| {
            let (p, q) = self.edge(i);
            (p == a && q == b) || (p == b && q == a)
        })
    }

    /// The corner that is neither `a` nor `b`.
    pub fn opposite(&self, a: VertexId, b: VertexId) -> Option<VertexId> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        self.vertices.iter().copied().find(|&w| w != a && w != b)
    }

    /// Whether any edge touches a non-manifold fan.
    pub fn touches_non_manifold(&self) -> bool {
        self.adjacency
            .iter()
            .any(|adj| matches!(adj, Adjacency::NonManifold(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Triangle {
        Triangle::new([VertexId::new(4), VertexId::new(7), VertexId::new(9)])
    }

    #[test]
    fn test_edge_numbering() {
        let t = tri();
        assert_eq!(t.edge(0), (VertexId::new(4), VertexId::new(7)));
        assert_eq!(t.edge(2), (VertexId::new(9), VertexId::new(4)));
        assert_eq!(t.edge_index(VertexId::new(4), VertexId::new(9)), Some(2));
        assert_eq!(t.edge_index(VertexId::new(9), VertexId::new(7)), Some(1));
        assert_eq!(t.edge_index(VertexId::new(9), VertexId::new(1)), None);
    }

    #[test]
    fn test_opposite() {
        let t = tri();
        assert_eq!(
            t.opposite(VertexId::new(7), VertexId::new(4)),
            Some(VertexId::new(9))
        );
        assert_eq!(t.opposite(VertexId::new(7), VertexId::new(1)), None);
    }

    #[test]
    fn test_new_triangle_has_no_adjacency() {
        let t = tri().with_group(3);
        assert_eq!(t.group(), 3);
        assert!((0..3).all(|i| t.adjacency(i) == Adjacency::Unset));
        assert!(!t.touches_non_manifold());
    }
}
