//! The mesh container.
//!
//! [`Mesh`] owns three arenas: vertices, triangles and non-manifold fans.
//! Elements are addressed by stable handles and are retired in place, never
//! freed, so a handle taken before a collapse can always be checked with
//! `is_alive()` afterwards.
//!
//! The label and group counters live here too. Callers either let the mesh
//! allocate them ([`Mesh::next_label`], [`Mesh::next_group_id`]) or assign
//! their own values, which pushes the counters past them.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Point3, Vector3};
use smallvec::{smallvec, SmallVec};

use super::element::{Adjacency, EdgeKind, EdgeSlot, Fan, Triangle, Vertex};
use super::index::{FanId, GroupId, Label, TriangleId, VertexId};
use crate::error::{MeshError, Result};

/// Relative area threshold below which a triangle counts as degenerate.
///
/// A triangle is degenerate when `|e1 x e2| <= DEGENERATE_EPSILON * l_max^2`,
/// with `l_max` its longest edge.
pub const DEGENERATE_EPSILON: f64 = 1e-10;

/// Twice the signed area vector of a triangle.
#[inline]
pub(crate) fn triangle_cross(p: &[Point3<f64>; 3]) -> Vector3<f64> {
    (p[1] - p[0]).cross(&(p[2] - p[0]))
}

/// Whether a triangle has (near) zero area relative to its size.
pub(crate) fn is_degenerate(p: &[Point3<f64>; 3]) -> bool {
    let l2 = (p[1] - p[0])
        .norm_squared()
        .max((p[2] - p[1]).norm_squared())
        .max((p[0] - p[2]).norm_squared());
    // Non-finite corners fail the comparison and count as degenerate
    !(l2 > 0.0 && triangle_cross(p).norm() > DEGENERATE_EPSILON * l2)
}

/// A triangle mesh with half-edge style adjacency and non-manifold fans.
///
/// # Example
///
/// ```
/// use meshcollapse::prelude::*;
///
/// let mut mesh = Mesh::new();
/// let v0 = mesh.create_vertex(0.0, 0.0, 0.0);
/// let v1 = mesh.create_vertex(1.0, 0.0, 0.0);
/// let v2 = mesh.create_vertex(0.0, 1.0, 0.0);
/// let t = mesh.create_triangle(v0, v1, v2);
/// mesh.add(t).unwrap();
///
/// mesh.build_adjacency();
/// assert!(mesh.is_valid());
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) triangles: Vec<Triangle>,
    pub(crate) fans: Vec<Fan>,
    pub(crate) groups: BTreeSet<GroupId>,
    pub(crate) adjacency_built: bool,
    next_label: Label,
    next_group: GroupId,
    live_vertices: usize,
    live_triangles: usize,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity(num_triangles),
            ..Self::default()
        }
    }

    // ==================== Construction ====================

    /// Allocate the next free vertex label.
    pub fn next_label(&mut self) -> Label {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Allocate the next free group identifier.
    pub fn next_group_id(&mut self) -> GroupId {
        let group = self.next_group;
        self.next_group += 1;
        group
    }

    /// Create a vertex at `(x, y, z)` with a freshly allocated label.
    pub fn create_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexId {
        self.add_vertex(Point3::new(x, y, z))
    }

    /// Add a vertex at `position` with a freshly allocated label.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId {
        let id = VertexId::new(self.vertices.len());
        let label = self.next_label();
        self.vertices.push(Vertex::new(position, label));
        self.live_vertices += 1;
        id
    }

    /// Override the label of a vertex.
    ///
    /// Labels must stay unique; the validity checker reports duplicates.
    pub fn set_label(&mut self, v: VertexId, label: Label) -> Result<()> {
        self.check_vertex(v)?;
        self.vertices[v.index()].label = label;
        self.next_label = self.next_label.max(label.saturating_add(1));
        Ok(())
    }

    /// Record `t` as the link triangle of `v`.
    ///
    /// Before adjacency is built, `t` becomes the first fan representative
    /// kept by [`Mesh::build_adjacency`]. Afterwards, `t` replaces the link of
    /// the fan it belongs to and the other fans keep theirs.
    pub fn set_link(&mut self, v: VertexId, t: TriangleId) -> Result<()> {
        self.check_vertex(v)?;
        self.check_triangle(t)?;
        if !self.triangles[t.index()].contains(v) {
            return Err(MeshError::LinkNotIncident {
                vertex: v,
                triangle: t,
            });
        }

        if !self.adjacency_built {
            let link = &mut self.vertices[v.index()].link;
            link.retain(|&mut u| u != t);
            link.insert(0, t);
            return Ok(());
        }

        let mut fan = Vec::new();
        self.collect_fan(v, t, &mut fan);
        let link = &mut self.vertices[v.index()].link;
        match link.iter().position(|u| fan.contains(u)) {
            Some(i) => link[i] = t,
            None => link.push(t),
        }
        Ok(())
    }

    /// Create a detached triangle over three vertices.
    ///
    /// The triangle is not part of the mesh until passed to [`Mesh::add`].
    pub fn create_triangle(&self, v0: VertexId, v1: VertexId, v2: VertexId) -> Triangle {
        Triangle::new([v0, v1, v2])
    }

    /// Add a triangle to the mesh.
    ///
    /// Invalidates adjacency.
    pub fn add(&mut self, triangle: Triangle) -> Result<TriangleId> {
        let index = self.triangles.len();
        for &v in &triangle.vertices {
            self.check_vertex(v)?;
        }
        let [a, b, c] = triangle.vertices;
        if a == b || b == c || a == c {
            return Err(MeshError::DegenerateFace { triangle: index });
        }

        let mut triangle = triangle;
        triangle.adjacency = [Adjacency::Unset; 3];
        triangle.alive = true;
        self.register_group(triangle.group);
        self.triangles.push(triangle);
        self.live_triangles += 1;
        self.adjacency_built = false;
        Ok(TriangleId::new(index))
    }

    /// Assign a triangle to a group.
    pub fn set_group_id(&mut self, t: TriangleId, group: GroupId) -> Result<()> {
        self.check_triangle(t)?;
        self.triangles[t.index()].group = group;
        self.register_group(group);
        Ok(())
    }

    /// Reverse the winding of a triangle.
    ///
    /// Invalidates adjacency.
    pub fn flip_triangle(&mut self, t: TriangleId) -> Result<()> {
        self.check_triangle(t)?;
        self.triangles[t.index()].vertices.swap(1, 2);
        self.adjacency_built = false;
        Ok(())
    }

    /// Set the position of a vertex.
    pub fn set_position(&mut self, v: VertexId, position: Point3<f64>) -> Result<()> {
        self.check_vertex(v)?;
        self.vertices[v.index()].position = position;
        Ok(())
    }

    fn register_group(&mut self, group: GroupId) {
        self.groups.insert(group);
        self.next_group = self.next_group.max(group.saturating_add(1));
    }

    fn check_vertex(&self, v: VertexId) -> Result<()> {
        match self.vertices.get(v.index()) {
            Some(vertex) if v.is_valid() && vertex.alive => Ok(()),
            _ => Err(MeshError::InvalidVertex(v)),
        }
    }

    fn check_triangle(&self, t: TriangleId) -> Result<()> {
        match self.triangles.get(t.index()) {
            Some(tri) if t.is_valid() && tri.alive => Ok(()),
            _ => Err(MeshError::InvalidTriangle(t)),
        }
    }

    // ==================== Accessors ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.live_vertices
    }

    /// Number of live triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.live_triangles
    }

    /// Whether adjacency is current.
    #[inline]
    pub fn has_adjacency(&self) -> bool {
        self.adjacency_built
    }

    /// Get a vertex by handle. Retired vertices remain readable.
    ///
    /// # Panics
    ///
    /// If `id` is not a handle of this mesh.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a triangle by handle. Retired triangles remain readable.
    ///
    /// # Panics
    ///
    /// If `id` is not a handle of this mesh.
    #[inline]
    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id.index()]
    }

    /// Get a fan record by handle.
    ///
    /// # Panics
    ///
    /// If `id` is not a handle of this mesh.
    #[inline]
    pub fn fan(&self, id: FanId) -> &Fan {
        &self.fans[id.index()]
    }

    /// Position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertices[v.index()].position
    }

    /// All group identifiers ever assigned in this mesh.
    pub fn groups(&self) -> &BTreeSet<GroupId> {
        &self.groups
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex handles.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.alive)
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live triangle handles.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, _)| TriangleId::new(i))
    }

    /// Iterate over live triangles with their handles.
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, &Triangle)> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, t)| (TriangleId::new(i), t))
    }

    /// Live triangles partitioned by group.
    pub fn triangles_by_group(&self) -> BTreeMap<GroupId, Vec<TriangleId>> {
        let mut out: BTreeMap<GroupId, Vec<TriangleId>> = BTreeMap::new();
        for (t, tri) in self.triangles() {
            out.entry(tri.group).or_default().push(t);
        }
        out
    }

    // ==================== Geometry ====================

    /// Positions of the three corners of a triangle.
    pub fn triangle_positions(&self, t: TriangleId) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[t.index()].vertices;
        [*self.position(a), *self.position(b), *self.position(c)]
    }

    /// Unit normal of a triangle, following its winding.
    pub fn triangle_normal(&self, t: TriangleId) -> Vector3<f64> {
        triangle_cross(&self.triangle_positions(t)).normalize()
    }

    /// Area of a triangle.
    pub fn triangle_area(&self, t: TriangleId) -> f64 {
        0.5 * triangle_cross(&self.triangle_positions(t)).norm()
    }

    /// Total area of the live triangles.
    pub fn surface_area(&self) -> f64 {
        self.triangle_ids().map(|t| self.triangle_area(t)).sum()
    }

    // ==================== Topology Queries ====================

    /// The other slots sharing edge `edge` of triangle `t`.
    pub(crate) fn across(&self, t: TriangleId, edge: usize) -> SmallVec<[EdgeSlot; 4]> {
        match self.triangles[t.index()].adjacency[edge] {
            Adjacency::Unset | Adjacency::Boundary => SmallVec::new(),
            Adjacency::Manifold { triangle, edge } => smallvec![(triangle, edge)],
            Adjacency::NonManifold(fan) => self.fans[fan.index()]
                .members
                .iter()
                .copied()
                .filter(|&(u, _)| u != t)
                .collect(),
        }
    }

    /// Append to `out` every triangle of the fan of `v` containing `seed`.
    ///
    /// Walks across the two edges incident to `v` in each triangle; crossing a
    /// non-manifold fan reaches every sheet attached to it.
    pub(crate) fn collect_fan(&self, v: VertexId, seed: TriangleId, out: &mut Vec<TriangleId>) {
        if out.contains(&seed) {
            return;
        }
        let mut next = out.len();
        out.push(seed);
        while next < out.len() {
            let t = out[next];
            next += 1;
            let Some(k) = self.triangles[t.index()].index_of(v) else {
                continue;
            };
            for edge in [k, (k + 2) % 3] {
                for (u, _) in self.across(t, edge) {
                    let tri = &self.triangles[u.index()];
                    if tri.alive && tri.contains(v) && !out.contains(&u) {
                        out.push(u);
                    }
                }
            }
        }
    }

    /// All live triangles incident to `v`.
    ///
    /// Uses the vertex links once adjacency is built and falls back to a scan
    /// otherwise.
    pub fn vertex_triangles(&self, v: VertexId) -> Vec<TriangleId> {
        if !self.adjacency_built {
            return self
                .triangles()
                .filter(|(_, tri)| tri.contains(v))
                .map(|(t, _)| t)
                .collect();
        }
        let mut out = Vec::new();
        for &seed in &self.vertices[v.index()].link {
            if self.triangles[seed.index()].alive {
                self.collect_fan(v, seed, &mut out);
            }
        }
        out
    }

    /// Vertices sharing an edge with `v`, sorted.
    pub fn vertex_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .vertex_triangles(v)
            .into_iter()
            .flat_map(|t| self.triangles[t.index()].vertices)
            .filter(|&w| w != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The `(triangle, edge)` slots on the edge between `a` and `b`.
    pub fn edge_slots(&self, a: VertexId, b: VertexId) -> SmallVec<[EdgeSlot; 4]> {
        self.vertex_triangles(a)
            .into_iter()
            .filter_map(|t| {
                self.triangles[t.index()]
                    .edge_index(a, b)
                    .map(|e| (t, e as u8))
            })
            .collect()
    }

    /// Triangles containing the edge between `a` and `b`, in either direction.
    pub fn edge_triangles(&self, a: VertexId, b: VertexId) -> Vec<TriangleId> {
        self.edge_slots(a, b).into_iter().map(|(t, _)| t).collect()
    }

    /// Classification of the edge between `a` and `b`, if it exists.
    pub fn edge_kind(&self, a: VertexId, b: VertexId) -> Option<EdgeKind> {
        let slots = self.edge_slots(a, b);
        let &(t, e) = slots.first()?;
        match self.triangles[t.index()].adjacency[e as usize] {
            Adjacency::Boundary => Some(EdgeKind::Boundary),
            Adjacency::Manifold { .. } => Some(EdgeKind::Manifold),
            Adjacency::NonManifold(_) => Some(EdgeKind::NonManifold),
            Adjacency::Unset => None,
        }
    }

    /// Whether `v` lies on a boundary or non-manifold edge, or has several fans.
    pub fn is_frame_vertex(&self, v: VertexId) -> bool {
        let vertex = &self.vertices[v.index()];
        if vertex.link.len() > 1 {
            return true;
        }
        self.vertex_triangles(v).into_iter().any(|t| {
            let tri = &self.triangles[t.index()];
            let Some(k) = tri.index_of(v) else {
                return false;
            };
            tri.adjacency[k].is_frame() || tri.adjacency[(k + 2) % 3].is_frame()
        })
    }

    // ==================== Retirement ====================

    pub(crate) fn retire_triangle(&mut self, t: TriangleId) {
        let tri = &mut self.triangles[t.index()];
        if tri.alive {
            tri.alive = false;
            self.live_triangles -= 1;
        }
    }

    pub(crate) fn retire_vertex(&mut self, v: VertexId) {
        let vertex = &mut self.vertices[v.index()];
        if vertex.alive {
            vertex.alive = false;
            vertex.link.clear();
            self.live_vertices -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Mesh, [VertexId; 4]) {
        let mut mesh = Mesh::new();
        let v0 = mesh.create_vertex(0.0, 0.0, 0.0);
        let v1 = mesh.create_vertex(1.0, 0.0, 0.0);
        let v2 = mesh.create_vertex(0.0, 1.0, 0.0);
        let v3 = mesh.create_vertex(1.0, 1.0, 0.0);
        let t0 = mesh.create_triangle(v0, v1, v2);
        let t1 = mesh.create_triangle(v3, v2, v1).with_group(5);
        mesh.add(t0).unwrap();
        mesh.add(t1).unwrap();
        (mesh, [v0, v1, v2, v3])
    }

    #[test]
    fn test_labels_are_allocated_in_order() {
        let (mut mesh, v) = quad();
        assert_eq!(mesh.vertex(v[3]).label(), 3);
        mesh.set_label(v[0], 40).unwrap();
        assert_eq!(mesh.next_label(), 41);
    }

    #[test]
    fn test_group_counter_follows_assignments() {
        let (mut mesh, _) = quad();
        assert_eq!(mesh.groups().iter().copied().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(mesh.next_group_id(), 6);
    }

    #[test]
    fn test_add_rejects_repeated_vertex() {
        let mut mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0, 0.0);
        let b = mesh.create_vertex(1.0, 0.0, 0.0);
        let t = mesh.create_triangle(a, b, a);
        assert!(matches!(mesh.add(t), Err(MeshError::DegenerateFace { .. })));
    }

    #[test]
    fn test_add_invalidates_adjacency() {
        let (mut mesh, v) = quad();
        mesh.build_adjacency();
        assert!(mesh.has_adjacency());
        let extra = mesh.create_vertex(2.0, 0.0, 0.0);
        let t = mesh.create_triangle(v[1], extra, v[3]);
        mesh.add(t).unwrap();
        assert!(!mesh.has_adjacency());
    }

    #[test]
    fn test_set_link_requires_incidence() {
        let (mut mesh, v) = quad();
        let err = mesh.set_link(v[0], TriangleId::new(1)).unwrap_err();
        assert!(matches!(err, MeshError::LinkNotIncident { .. }));
        mesh.set_link(v[1], TriangleId::new(1)).unwrap();
        assert_eq!(mesh.vertex(v[1]).link(), Some(TriangleId::new(1)));
    }

    #[test]
    fn test_set_link_after_build_keeps_one_link_per_fan() {
        let (mut mesh, v) = quad();
        mesh.build_adjacency();
        let before = mesh.vertex(v[1]).link();
        let other = if before == Some(TriangleId::new(0)) {
            TriangleId::new(1)
        } else {
            TriangleId::new(0)
        };

        mesh.set_link(v[1], other).unwrap();

        assert_eq!(mesh.vertex(v[1]).fans(), &[other]);
        assert!(mesh.has_adjacency());
        assert!(mesh.is_valid(), "{}", mesh.validate());
    }

    #[test]
    fn test_set_link_after_build_on_bowtie() {
        // Two triangles touching only at the center
        let mut mesh = Mesh::new();
        let c = mesh.create_vertex(0.0, 0.0, 0.0);
        let a = mesh.create_vertex(1.0, 0.0, 0.0);
        let b = mesh.create_vertex(1.0, 1.0, 0.0);
        let d = mesh.create_vertex(-1.0, 0.0, 0.0);
        let e = mesh.create_vertex(-1.0, -1.0, 0.0);
        let t0 = mesh.add(mesh.create_triangle(c, a, b)).unwrap();
        let t1 = mesh.add(mesh.create_triangle(c, d, e)).unwrap();
        mesh.build_adjacency();
        assert_eq!(mesh.vertex(c).fans().len(), 2);

        mesh.set_link(c, t1).unwrap();
        mesh.set_link(c, t0).unwrap();

        let mut fans = mesh.vertex(c).fans().to_vec();
        fans.sort_unstable();
        assert_eq!(fans, vec![t0, t1]);
        assert!(mesh.is_valid(), "{}", mesh.validate());
    }

    #[test]
    fn test_vertex_queries() {
        let (mut mesh, v) = quad();
        mesh.build_adjacency();
        assert_eq!(mesh.vertex_triangles(v[1]).len(), 2);
        assert_eq!(mesh.vertex_neighbors(v[0]), vec![v[1], v[2]]);
        assert_eq!(mesh.edge_kind(v[1], v[2]), Some(EdgeKind::Manifold));
        assert_eq!(mesh.edge_kind(v[0], v[1]), Some(EdgeKind::Boundary));
        assert_eq!(mesh.edge_kind(v[0], v[3]), None);
        assert_eq!(
            mesh.edge_triangles(v[2], v[1]),
            vec![TriangleId::new(0), TriangleId::new(1)]
        );
        assert!(mesh.edge_triangles(v[0], v[3]).is_empty());
        assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_detection() {
        let flat = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(is_degenerate(&flat));
        let fine = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(!is_degenerate(&fine));
    }

    #[test]
    fn test_non_finite_triangle_is_degenerate() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let p = [
                Point3::new(bad, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ];
            assert!(is_degenerate(&p), "{} corner", bad);
        }

        let (mut mesh, v) = quad();
        mesh.build_adjacency();
        mesh.set_position(v[0], Point3::new(f64::NAN, 0.0, 0.0)).unwrap();
        assert!(!mesh.is_valid());
    }
}
