//! Adjacency construction and maintenance.
//!
//! [`Mesh::build_adjacency`] hashes every undirected edge to the triangle
//! slots declaring it and links each edge according to its incidence count.
//! The same per-edge routine ([`Mesh::link_edge`]) and per-vertex routine
//! ([`Mesh::relink_vertex`]) are reused by the collapse operation to repair
//! the neighborhood it rewrites.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::container::Mesh;
use super::element::{Adjacency, EdgeKind, EdgeSlot, Fan};
use super::index::{edge_key, FanId, TriangleId, VertexId};

/// Every live undirected edge mapped to its slots, ordered by edge key.
pub(crate) type EdgeCensus = BTreeMap<(VertexId, VertexId), SmallVec<[EdgeSlot; 4]>>;

/// Summary of an adjacency build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyReport {
    /// Edges with one incident triangle.
    pub boundary_edges: usize,
    /// Edges with two oppositely wound triangles.
    pub manifold_edges: usize,
    /// Edges with three or more triangles, or two with the same winding.
    pub non_manifold_edges: usize,
    /// Two-triangle edges whose triangles traverse them in the same direction.
    pub winding_conflicts: Vec<(VertexId, VertexId)>,
    /// Vertices on a non-manifold edge or with several fans.
    pub non_manifold_vertices: usize,
}

impl AdjacencyReport {
    /// Whether every edge is boundary or manifold.
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edges == 0
    }
}

impl std::fmt::Display for AdjacencyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} boundary, {} manifold, {} non-manifold edges ({} winding conflicts), {} non-manifold vertices",
            self.boundary_edges,
            self.manifold_edges,
            self.non_manifold_edges,
            self.winding_conflicts.len(),
            self.non_manifold_vertices
        )
    }
}

/// Map every undirected edge of the live triangles to its slots.
pub(crate) fn edge_census(mesh: &Mesh) -> EdgeCensus {
    let mut census = EdgeCensus::new();
    for (t, tri) in mesh.triangles() {
        for e in 0..3 {
            let (a, b) = tri.edge(e);
            census.entry(edge_key(a, b)).or_default().push((t, e as u8));
        }
    }
    census
}

/// Whether two slots traverse their shared edge in opposite directions.
pub(crate) fn opposite_winding(mesh: &Mesh, s: EdgeSlot, r: EdgeSlot) -> bool {
    let (a0, a1) = mesh.triangle(s.0).edge(s.1 as usize);
    let (b0, b1) = mesh.triangle(r.0).edge(r.1 as usize);
    a0 == b1 && a1 == b0
}

impl Mesh {
    /// Build triangle adjacency and vertex links from scratch.
    ///
    /// Idempotent. Must be called after the last [`Mesh::add`] and before
    /// decimation. Winding conflicts on two-triangle edges are logged and
    /// reported; such edges are tagged non-manifold so the decimator leaves
    /// them alone.
    pub fn build_adjacency(&mut self) -> AdjacencyReport {
        let census = edge_census(self);
        let mut report = AdjacencyReport::default();

        self.fans.clear();
        for tri in self.triangles.iter_mut().filter(|t| t.alive) {
            tri.adjacency = [Adjacency::Unset; 3];
        }

        for (&(a, b), slots) in &census {
            match self.link_edge(slots) {
                EdgeKind::Boundary => report.boundary_edges += 1,
                EdgeKind::Manifold => report.manifold_edges += 1,
                EdgeKind::NonManifold => {
                    report.non_manifold_edges += 1;
                    if slots.len() == 2 {
                        warn!(
                            "edge {:?}-{:?} is shared by two triangles with the same winding",
                            a, b
                        );
                        report.winding_conflicts.push((a, b));
                    }
                }
            }
        }

        let mut incident: Vec<Vec<TriangleId>> = vec![Vec::new(); self.vertices.len()];
        for (t, tri) in self.triangles() {
            for v in tri.vertices {
                incident[v.index()].push(t);
            }
        }
        for (i, star) in incident.iter().enumerate() {
            let v = VertexId::new(i);
            if !self.vertices[i].alive {
                continue;
            }
            self.relink_vertex(v, star);
            if !self.vertices[i].manifold {
                report.non_manifold_vertices += 1;
            }
        }

        self.adjacency_built = true;
        debug!("built adjacency: {}", report);
        report
    }

    /// Write the adjacency of one undirected edge from the slots sharing it.
    ///
    /// Any fan previously referenced by these slots is retired first.
    pub(crate) fn link_edge(&mut self, slots: &[EdgeSlot]) -> EdgeKind {
        for &(t, e) in slots {
            if let Adjacency::NonManifold(fan) = self.triangles[t.index()].adjacency[e as usize] {
                self.fans[fan.index()].alive = false;
            }
        }

        match slots {
            [] => EdgeKind::Boundary,
            [(t, e)] => {
                self.triangles[t.index()].adjacency[*e as usize] = Adjacency::Boundary;
                EdgeKind::Boundary
            }
            [s, r] if opposite_winding(self, *s, *r) => {
                self.triangles[s.0.index()].adjacency[s.1 as usize] = Adjacency::Manifold {
                    triangle: r.0,
                    edge: r.1,
                };
                self.triangles[r.0.index()].adjacency[r.1 as usize] = Adjacency::Manifold {
                    triangle: s.0,
                    edge: s.1,
                };
                EdgeKind::Manifold
            }
            _ => {
                let fan = FanId::new(self.fans.len());
                let mut members: SmallVec<[EdgeSlot; 4]> = slots.iter().copied().collect();
                members.sort_unstable();
                self.fans.push(Fan {
                    members,
                    winding_conflict: slots.len() == 2,
                    alive: true,
                });
                for &(t, e) in slots {
                    self.triangles[t.index()].adjacency[e as usize] = Adjacency::NonManifold(fan);
                }
                EdgeKind::NonManifold
            }
        }
    }

    /// Recompute the links and classification of `v` from its incident
    /// triangles.
    ///
    /// The star is split into edge-connected fans with one link each. A
    /// current link that is still incident stays the first representative.
    pub(crate) fn relink_vertex(&mut self, v: VertexId, star: &[TriangleId]) {
        let mut remaining: Vec<TriangleId> = star
            .iter()
            .copied()
            .filter(|t| {
                let tri = &self.triangles[t.index()];
                tri.alive && tri.contains(v)
            })
            .collect();

        let hint = self.vertices[v.index()]
            .link
            .first()
            .copied()
            .filter(|t| remaining.contains(t));

        let mut links: SmallVec<[TriangleId; 1]> = SmallVec::new();
        let mut on_fan = false;
        let mut seen = Vec::with_capacity(remaining.len());
        let mut seed = hint.or_else(|| remaining.first().copied());
        while let Some(s) = seed {
            links.push(s);
            seen.clear();
            self.collect_fan(v, s, &mut seen);
            remaining.retain(|t| !seen.contains(t));
            seed = remaining.first().copied();
        }

        for &t in star {
            let tri = &self.triangles[t.index()];
            if !tri.alive {
                continue;
            }
            if let Some(k) = tri.index_of(v) {
                let nm = |adj: Adjacency| matches!(adj, Adjacency::NonManifold(_));
                if nm(tri.adjacency[k]) || nm(tri.adjacency[(k + 2) % 3]) {
                    on_fan = true;
                }
            }
        }

        let vertex = &mut self.vertices[v.index()];
        vertex.manifold = links.len() <= 1 && !on_fan;
        vertex.link = links;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two triangles sharing an edge, plus a third hinged on the same edge.
    fn book(pages: usize) -> (Mesh, Vec<VertexId>) {
        let mut mesh = Mesh::new();
        let spine0 = mesh.create_vertex(0.0, 0.0, 0.0);
        let spine1 = mesh.create_vertex(0.0, 1.0, 0.0);
        let mut v = vec![spine0, spine1];
        for i in 0..pages {
            let angle = i as f64 * std::f64::consts::TAU / pages as f64;
            let w = mesh.create_vertex(angle.cos(), 0.5, angle.sin());
            let t = if i % 2 == 0 {
                mesh.create_triangle(spine0, spine1, w)
            } else {
                mesh.create_triangle(spine1, spine0, w)
            };
            mesh.add(t).unwrap();
            v.push(w);
        }
        (mesh, v)
    }

    #[test]
    fn test_manifold_pair() {
        let (mut mesh, v) = book(2);
        let report = mesh.build_adjacency();
        assert_eq!(report.manifold_edges, 1);
        assert_eq!(report.boundary_edges, 4);
        assert!(report.is_manifold());
        assert_eq!(
            mesh.triangle(TriangleId::new(0)).adjacency(0),
            Adjacency::Manifold {
                triangle: TriangleId::new(1),
                edge: 0
            }
        );
        assert!(mesh.vertex(v[0]).is_manifold());
    }

    #[test]
    fn test_three_pages_make_a_fan() {
        let (mut mesh, v) = book(3);
        let report = mesh.build_adjacency();
        assert_eq!(report.non_manifold_edges, 1);
        assert_eq!(report.non_manifold_vertices, 2);
        assert!(report.winding_conflicts.is_empty());

        let Adjacency::NonManifold(fan) = mesh.triangle(TriangleId::new(2)).adjacency(0) else {
            panic!("spine should be non-manifold");
        };
        assert_eq!(mesh.fan(fan).members().len(), 3);
        assert!(!mesh.vertex(v[0]).is_manifold());
        assert!(mesh.vertex(v[2]).is_manifold());
        assert_eq!(mesh.vertex_triangles(v[0]).len(), 3);
    }

    #[test]
    fn test_same_winding_is_reported() {
        let mut mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0, 0.0);
        let b = mesh.create_vertex(1.0, 0.0, 0.0);
        let c = mesh.create_vertex(0.0, 1.0, 0.0);
        let d = mesh.create_vertex(1.0, -1.0, 0.0);
        let t0 = mesh.create_triangle(a, b, c);
        let t1 = mesh.create_triangle(a, b, d);
        mesh.add(t0).unwrap();
        mesh.add(t1).unwrap();

        let report = mesh.build_adjacency();
        assert_eq!(report.winding_conflicts, vec![(a, b)]);
        assert_eq!(mesh.edge_kind(a, b), Some(EdgeKind::NonManifold));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_bowtie_vertex_has_two_fans() {
        let mut mesh = Mesh::new();
        let hub = mesh.create_vertex(0.0, 0.0, 0.0);
        let a = mesh.create_vertex(1.0, 0.0, 0.0);
        let b = mesh.create_vertex(1.0, 1.0, 0.0);
        let c = mesh.create_vertex(-1.0, 0.0, 0.0);
        let d = mesh.create_vertex(-1.0, -1.0, 0.0);
        let t0 = mesh.create_triangle(hub, a, b);
        let t1 = mesh.create_triangle(hub, c, d);
        mesh.add(t0).unwrap();
        mesh.add(t1).unwrap();

        let report = mesh.build_adjacency();
        assert_eq!(mesh.vertex(hub).fans().len(), 2);
        assert!(!mesh.vertex(hub).is_manifold());
        assert_eq!(report.non_manifold_vertices, 1);
        assert_eq!(mesh.vertex_triangles(hub).len(), 2);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (mut mesh, _) = book(4);
        let first = mesh.build_adjacency();
        let adjacency: Vec<_> = mesh.triangles().map(|(_, t)| t.adjacency).collect();
        let second = mesh.build_adjacency();
        let again: Vec<_> = mesh.triangles().map(|(_, t)| t.adjacency).collect();
        assert_eq!(first, second);
        assert_eq!(adjacency, again);
    }
}
