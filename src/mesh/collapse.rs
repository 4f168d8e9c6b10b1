//! In-place edge collapse.

use std::collections::BTreeMap;

use nalgebra::Point3;
use smallvec::SmallVec;

use super::container::Mesh;
use super::element::{Adjacency, EdgeSlot};
use super::index::{TriangleId, VertexId};
use crate::error::{MeshError, Result};

impl Mesh {
    /// Merge `gone` into `keep` and move `keep` to `target`.
    ///
    /// Triangles on the edge are retired, the remaining triangles around
    /// `gone` are rewritten to reference `keep`, and the two side edges of
    /// every retired triangle are relinked as one. Group ids are never
    /// touched. Returns the retired triangles.
    ///
    /// This performs no legality check; callers run
    /// [`check_collapse`](crate::algo::decimate::check_collapse) first.
    pub fn collapse_edge(
        &mut self,
        keep: VertexId,
        gone: VertexId,
        target: Point3<f64>,
    ) -> Result<SmallVec<[TriangleId; 4]>> {
        if !self.adjacency_built {
            return Err(MeshError::AdjacencyNotBuilt);
        }
        for v in [keep, gone] {
            if !self.vertices.get(v.index()).is_some_and(|x| x.alive) {
                return Err(MeshError::InvalidVertex(v));
            }
        }

        let star_keep = self.vertex_triangles(keep);
        let star_gone = self.vertex_triangles(gone);
        let doomed: SmallVec<[TriangleId; 4]> = star_gone
            .iter()
            .copied()
            .filter(|&t| self.triangles[t.index()].contains(keep))
            .collect();
        if doomed.is_empty() {
            return Err(MeshError::InvalidVertex(gone));
        }

        // Side edges (keep, o) and (gone, o) of each doomed triangle fuse.
        let mut merged: BTreeMap<VertexId, SmallVec<[EdgeSlot; 4]>> = BTreeMap::new();
        for &t in &doomed {
            let tri = &self.triangles[t.index()];
            let Some(o) = tri.opposite(keep, gone) else {
                continue;
            };
            let sides = merged.entry(o).or_default();
            for end in [keep, gone] {
                let Some(e) = tri.edge_index(end, o) else {
                    continue;
                };
                for slot in self.across(t, e) {
                    if !doomed.contains(&slot.0) && !sides.contains(&slot) {
                        sides.push(slot);
                    }
                }
            }
        }
        let opposite_stars: Vec<(VertexId, Vec<TriangleId>)> = merged
            .keys()
            .map(|&o| (o, self.vertex_triangles(o)))
            .collect();

        for &t in &doomed {
            for adjacency in self.triangles[t.index()].adjacency {
                if let Adjacency::NonManifold(fan) = adjacency {
                    self.fans[fan.index()].alive = false;
                }
            }
            self.retire_triangle(t);
        }

        for &t in &star_gone {
            let tri = &mut self.triangles[t.index()];
            if !tri.alive {
                continue;
            }
            for v in tri.vertices.iter_mut().filter(|v| **v == gone) {
                *v = keep;
            }
        }

        for slots in merged.values_mut() {
            slots.sort_unstable();
            self.link_edge(slots);
        }

        self.vertices[keep.index()].position = target;
        self.retire_vertex(gone);

        let mut star: Vec<TriangleId> = star_keep;
        star.extend(star_gone);
        star.sort_unstable();
        star.dedup();
        star.retain(|t| self.triangles[t.index()].alive);
        self.relink_vertex(keep, &star);
        for (o, star_o) in &opposite_stars {
            self.relink_vertex(*o, star_o);
        }

        Ok(doomed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{EdgeKind, GroupSnapshot};

    /// A fan of six triangles around a center vertex, on the XY plane.
    fn hexagon() -> (Mesh, VertexId, Vec<VertexId>) {
        let mut mesh = Mesh::new();
        let center = mesh.create_vertex(0.0, 0.0, 0.0);
        let ring: Vec<VertexId> = (0..6)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 6.0;
                mesh.create_vertex(a.cos(), a.sin(), 0.0)
            })
            .collect();
        for i in 0..6 {
            let group = mesh.next_group_id();
            let t = mesh
                .create_triangle(center, ring[i], ring[(i + 1) % 6])
                .with_group(group);
            mesh.add(t).unwrap();
        }
        mesh.build_adjacency();
        (mesh, center, ring)
    }

    #[test]
    fn test_interior_collapse() {
        let (mut mesh, center, ring) = hexagon();
        let snapshot = GroupSnapshot::capture(&mesh);
        let target = *mesh.position(ring[0]);

        let removed = mesh.collapse_edge(ring[0], center, target).unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(mesh.num_triangles(), 4);
        assert_eq!(mesh.num_vertices(), 6);
        assert!(!mesh.vertex(center).is_alive());
        let report = mesh.validate();
        assert!(report.is_valid(), "{}", report);
        assert!(snapshot.verify(&mesh).is_valid());
        assert_eq!(mesh.edge_kind(ring[0], ring[3]), Some(EdgeKind::Manifold));
        assert_eq!(mesh.edge_kind(ring[0], ring[1]), Some(EdgeKind::Boundary));
    }

    #[test]
    fn test_boundary_collapse() {
        let (mut mesh, _, ring) = hexagon();
        let target = *mesh.position(ring[0]);

        let removed = mesh.collapse_edge(ring[0], ring[1], target).unwrap();

        assert_eq!(removed.len(), 1);
        assert_eq!(mesh.num_triangles(), 5);
        assert!(mesh.is_valid());
        assert_eq!(mesh.edge_kind(ring[0], ring[2]), Some(EdgeKind::Boundary));
    }

    #[test]
    fn test_requires_adjacency() {
        let (mut mesh, center, ring) = hexagon();
        mesh.flip_triangle(TriangleId::new(0)).unwrap();
        let target = *mesh.position(center);
        assert!(matches!(
            mesh.collapse_edge(center, ring[0], target),
            Err(MeshError::AdjacencyNotBuilt)
        ));
    }

    #[test]
    fn test_rejects_non_edge() {
        let (mut mesh, _, ring) = hexagon();
        let target = *mesh.position(ring[0]);
        assert!(mesh.collapse_edge(ring[0], ring[3], target).is_err());
        assert_eq!(mesh.num_triangles(), 6);
    }
}
