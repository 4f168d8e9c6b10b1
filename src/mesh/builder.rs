//! Mesh construction utilities.
//!
//! Conversion between [`Mesh`] and the face-vertex lists found in mesh file
//! formats and test fixtures.

use nalgebra::Point3;

use super::container::Mesh;
use super::index::{GroupId, VertexId};
use crate::error::{MeshError, Result};

/// Build a mesh from vertices and triangle faces.
///
/// Every triangle lands in group 0. Adjacency is built before returning.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Example
/// ```
/// use meshcollapse::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_triangles(), 1);
/// assert!(mesh.has_adjacency());
/// ```
pub fn build_from_triangles(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Mesh> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    // Validate vertex indices
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { triangle: fi });
        }
    }

    let mut mesh = Mesh::with_capacity(vertices.len(), faces.len());
    let vertex_ids: Vec<VertexId> = vertices.iter().map(|&pos| mesh.add_vertex(pos)).collect();

    for face in faces {
        let t = mesh.create_triangle(
            vertex_ids[face[0]],
            vertex_ids[face[1]],
            vertex_ids[face[2]],
        );
        mesh.add(t)?;
    }

    mesh.build_adjacency();
    Ok(mesh)
}

/// Convert a mesh back to a face-vertex representation.
///
/// Retired vertices are dropped and the survivors renumbered in handle order.
/// Returns `(vertices, faces, groups)` with one group id per face.
pub fn to_face_vertex(mesh: &Mesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>, Vec<GroupId>) {
    let mut remap = vec![usize::MAX; mesh.vertices.len()];
    let mut vertices = Vec::with_capacity(mesh.num_vertices());
    for v in mesh.vertex_ids() {
        remap[v.index()] = vertices.len();
        vertices.push(*mesh.position(v));
    }

    let (faces, groups) = mesh
        .triangles()
        .map(|(_, tri)| {
            let [v0, v1, v2] = tri.vertices();
            (
                [remap[v0.index()], remap[v1.index()], remap[v2.index()]],
                tri.group(),
            )
        })
        .unzip();

    (vertices, faces, groups)
}
