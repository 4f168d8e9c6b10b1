//! Topological and geometric legality of a single collapse.
//!
//! [`check_collapse`] never mutates the mesh. A collapse that passes leaves
//! every invariant checked by [`Mesh::validate`] intact.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::Point3;
use smallvec::SmallVec;

use crate::mesh::{
    is_degenerate, triangle_cross, Adjacency, EdgeSlot, Mesh, TriangleId, VertexId,
};

use super::NonManifoldPolicy;

/// Why a candidate collapse was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The vertices do not share an edge, or one is retired.
    NotAnEdge,
    /// The edge or removed vertex is non-manifold and the policy freezes those.
    FrozenNonManifold,
    /// The non-manifold edge only exists through a winding conflict.
    IrregularNonManifold,
    /// The removed vertex joins several fans, or the survivor does and would
    /// move.
    PinnedVertex,
    /// The neighborhoods of the two vertices intersect beyond the edge, or the
    /// edge cuts across the frame.
    LinkCondition,
    /// Two triangles would end up on the same three vertices.
    DuplicateTriangle,
    /// Two fans would fuse, or a sheet would be torn off a fan.
    FanMerge,
    /// A vertex would lose its last triangle.
    IsolatesVertex,
    /// A surviving triangle would collapse to zero area.
    Degenerate,
    /// A surviving triangle would turn over.
    Flipped,
    /// Two merged side edges would wind the same way.
    WindingConflict,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rejection::NotAnEdge => "not an edge",
            Rejection::FrozenNonManifold => "non-manifold edge or vertex is frozen",
            Rejection::IrregularNonManifold => "irregular non-manifold edge",
            Rejection::PinnedVertex => "vertex joins several fans",
            Rejection::LinkCondition => "link condition",
            Rejection::DuplicateTriangle => "would duplicate a triangle",
            Rejection::FanMerge => "would merge or split a fan",
            Rejection::IsolatesVertex => "would isolate a vertex",
            Rejection::Degenerate => "would create a degenerate triangle",
            Rejection::Flipped => "would flip a triangle",
            Rejection::WindingConflict => "would create a winding conflict",
        };
        f.write_str(text)
    }
}

/// Decide whether `gone` may be merged into `keep`, with `keep` moved to
/// `target`.
///
/// Handles that are retired or out of range give [`Rejection::NotAnEdge`].
pub fn check_collapse(
    mesh: &Mesh,
    keep: VertexId,
    gone: VertexId,
    target: &Point3<f64>,
    policy: NonManifoldPolicy,
) -> Result<(), Rejection> {
    let alive = |v: VertexId| mesh.vertices.get(v.index()).is_some_and(|x| x.is_alive());
    if keep == gone || !alive(keep) || !alive(gone) {
        return Err(Rejection::NotAnEdge);
    }
    let edge = mesh.edge_slots(keep, gone);
    if edge.is_empty() {
        return Err(Rejection::NotAnEdge);
    }
    let on_edge: SmallVec<[TriangleId; 4]> = edge.iter().map(|&(t, _)| t).collect();
    let adjacency = mesh.triangle(edge[0].0).adjacency(edge[0].1 as usize);

    if let Adjacency::NonManifold(fan) = adjacency {
        match policy {
            NonManifoldPolicy::Freeze => return Err(Rejection::FrozenNonManifold),
            NonManifoldPolicy::Chain if mesh.fan(fan).is_winding_conflict() => {
                return Err(Rejection::IrregularNonManifold)
            }
            NonManifoldPolicy::Chain => {}
        }
    }
    if policy == NonManifoldPolicy::Freeze && !mesh.vertex(gone).is_manifold() {
        return Err(Rejection::FrozenNonManifold);
    }

    if mesh.vertex(gone).fans().len() > 1
        || (mesh.vertex(keep).fans().len() > 1 && target != mesh.position(keep))
    {
        return Err(Rejection::PinnedVertex);
    }

    check_link(mesh, keep, gone, &on_edge, adjacency.is_frame())?;

    let star_keep = mesh.vertex_triangles(keep);
    let star_gone = mesh.vertex_triangles(gone);
    check_duplicates(mesh, keep, gone, &on_edge, &star_keep, &star_gone)?;

    for &t in &on_edge {
        check_sides(mesh, t, keep, gone, &on_edge)?;
    }

    check_geometry(mesh, keep, gone, target, &on_edge, &star_keep, &star_gone)
}

fn opposite_vertices(
    mesh: &Mesh,
    keep: VertexId,
    gone: VertexId,
    on_edge: &[TriangleId],
) -> BTreeSet<VertexId> {
    on_edge
        .iter()
        .filter_map(|&t| mesh.triangle(t).opposite(keep, gone))
        .collect()
}

fn is_frame_edge(mesh: &Mesh, a: VertexId, b: VertexId) -> bool {
    mesh.edge_slots(a, b)
        .first()
        .is_some_and(|&(t, e)| mesh.triangle(t).adjacency(e as usize).is_frame())
}

/// Link condition, with boundary and non-manifold edges joined to a virtual
/// frame vertex.
fn check_link(
    mesh: &Mesh,
    keep: VertexId,
    gone: VertexId,
    on_edge: &[TriangleId],
    edge_is_frame: bool,
) -> Result<(), Rejection> {
    let opposite = opposite_vertices(mesh, keep, gone, on_edge);
    let near_keep: BTreeSet<VertexId> = mesh.vertex_neighbors(keep).into_iter().collect();
    let common: BTreeSet<VertexId> = mesh
        .vertex_neighbors(gone)
        .into_iter()
        .filter(|v| near_keep.contains(v))
        .collect();
    if common != opposite {
        return Err(Rejection::LinkCondition);
    }

    // Both ends on the frame: only a frame edge may join them
    if !edge_is_frame && mesh.is_frame_vertex(keep) && mesh.is_frame_vertex(gone) {
        return Err(Rejection::LinkCondition);
    }

    // A triangle with two frame edges would fold onto the frame
    for &x in &common {
        if is_frame_edge(mesh, keep, x) && is_frame_edge(mesh, gone, x) {
            return Err(Rejection::LinkCondition);
        }
    }
    Ok(())
}

fn sorted_corners(mesh: &Mesh, t: TriangleId, gone: VertexId, keep: VertexId) -> [VertexId; 3] {
    let mut corners = mesh
        .triangle(t)
        .vertices()
        .map(|v| if v == gone { keep } else { v });
    corners.sort_unstable();
    corners
}

fn check_duplicates(
    mesh: &Mesh,
    keep: VertexId,
    gone: VertexId,
    on_edge: &[TriangleId],
    star_keep: &[TriangleId],
    star_gone: &[TriangleId],
) -> Result<(), Rejection> {
    let existing: BTreeSet<[VertexId; 3]> = star_keep
        .iter()
        .filter(|t| !on_edge.contains(t))
        .map(|&t| sorted_corners(mesh, t, gone, keep))
        .collect();
    let clash = star_gone
        .iter()
        .filter(|t| !on_edge.contains(t))
        .any(|&t| existing.contains(&sorted_corners(mesh, t, gone, keep)));
    if clash {
        Err(Rejection::DuplicateTriangle)
    } else {
        Ok(())
    }
}

/// The two side edges of a removed triangle become one edge. Their other
/// slots must form a boundary, a consistently wound manifold pair, or an
/// existing fan extended by at most one sheet.
fn check_sides(
    mesh: &Mesh,
    t: TriangleId,
    keep: VertexId,
    gone: VertexId,
    on_edge: &[TriangleId],
) -> Result<(), Rejection> {
    let tri = mesh.triangle(t);
    let Some(o) = tri.opposite(keep, gone) else {
        return Ok(());
    };
    let others = |end: VertexId| -> SmallVec<[EdgeSlot; 4]> {
        tri.edge_index(end, o)
            .map(|e| {
                mesh.across(t, e)
                    .into_iter()
                    .filter(|(u, _)| !on_edge.contains(u))
                    .collect()
            })
            .unwrap_or_default()
    };
    let near = others(keep);
    let far = others(gone);
    let (p, q) = (near.len(), far.len());

    if (p >= 2 && q >= 2) || (p >= 2 && q == 0) || (q >= 2 && p == 0) {
        return Err(Rejection::FanMerge);
    }

    if p == 1 && q == 1 {
        let directed = |(u, e): EdgeSlot| {
            let (a, b) = mesh.triangle(u).edge(e as usize);
            let swap = |v: VertexId| if v == gone { keep } else { v };
            (swap(a), swap(b))
        };
        let (a0, a1) = directed(near[0]);
        let (b0, b1) = directed(far[0]);
        if !(a0 == b1 && a1 == b0) {
            return Err(Rejection::WindingConflict);
        }
    }

    let star_o = mesh.vertex_triangles(o);
    if star_o.iter().all(|u| on_edge.contains(u)) {
        return Err(Rejection::IsolatesVertex);
    }
    Ok(())
}

fn check_geometry(
    mesh: &Mesh,
    keep: VertexId,
    gone: VertexId,
    target: &Point3<f64>,
    on_edge: &[TriangleId],
    star_keep: &[TriangleId],
    star_gone: &[TriangleId],
) -> Result<(), Rejection> {
    let moved = |v: VertexId| {
        if v == keep || v == gone {
            *target
        } else {
            *mesh.position(v)
        }
    };
    for &t in star_keep.iter().chain(star_gone) {
        if on_edge.contains(&t) {
            continue;
        }
        let before = mesh.triangle_positions(t);
        let after = mesh.triangle(t).vertices().map(moved);
        if is_degenerate(&after) {
            return Err(Rejection::Degenerate);
        }
        if triangle_cross(&before).dot(&triangle_cross(&after)) <= 0.0 {
            return Err(Rejection::Flipped);
        }
    }
    Ok(())
}
