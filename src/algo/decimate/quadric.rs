//! Quadric error metrics and collapse placement.

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::mesh::{Adjacency, Mesh, VertexId};

use super::Placement;

/// A quadric error matrix (4x4 symmetric matrix).
///
/// Represents the sum of squared distances to a set of planes.
/// Stored as 10 unique elements since the matrix is symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    /// Upper triangular elements: [a, b, c, d, e, f, g, h, i, j]
    /// Matrix form:
    /// | a b c d |
    /// | b e f g |
    /// | c f h i |
    /// | d g i j |
    data: [f64; 10],
}

impl Default for Quadric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Quadric {
    /// The zero quadric.
    pub fn zero() -> Self {
        Self { data: [0.0; 10] }
    }

    /// Quadric of the plane through `point` with unit normal `n`.
    pub fn from_plane(n: &Vector3<f64>, point: &Point3<f64>) -> Self {
        let (a, b, c) = (n.x, n.y, n.z);
        let d = -n.dot(&point.coords);
        Self {
            data: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    /// Squared distance sum at `p`, i.e. `v^T Q v` with `v = [x, y, z, 1]`.
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        let q = &self.data;
        q[0] * x * x
            + 2.0 * q[1] * x * y
            + 2.0 * q[2] * x * z
            + 2.0 * q[3] * x
            + q[4] * y * y
            + 2.0 * q[5] * y * z
            + 2.0 * q[6] * y
            + q[7] * z * z
            + 2.0 * q[8] * z
            + q[9]
    }

    fn to_matrix(self) -> Matrix4<f64> {
        let q = &self.data;
        Matrix4::new(
            q[0], q[1], q[2], q[3], //
            q[1], q[4], q[5], q[6], //
            q[2], q[5], q[7], q[8], //
            q[3], q[6], q[8], q[9],
        )
    }

    /// The point minimizing the error, or `None` if the system is singular.
    pub fn minimizer(&self) -> Option<Point3<f64>> {
        let mut m = self.to_matrix();
        m[(3, 0)] = 0.0;
        m[(3, 1)] = 0.0;
        m[(3, 2)] = 0.0;
        m[(3, 3)] = 1.0;

        let inv = m.try_inverse()?;
        let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
        Some(Point3::new(v.x, v.y, v.z))
    }
}

impl std::ops::AddAssign<&Quadric> for Quadric {
    fn add_assign(&mut self, other: &Quadric) {
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }
}

impl std::ops::Add for Quadric {
    type Output = Quadric;

    fn add(mut self, other: Quadric) -> Quadric {
        self += &other;
        self
    }
}

/// Initial quadric of every vertex, indexed by vertex handle.
///
/// Each vertex sums the planes of its incident triangles. Every boundary or
/// non-manifold edge slot adds, to both endpoints, the plane containing the
/// edge and perpendicular to its triangle, which pins the frame in place.
pub fn vertex_quadrics(mesh: &Mesh) -> Vec<Quadric> {
    let mut quadrics = vec![Quadric::zero(); mesh.vertices.len()];

    for (t, tri) in mesh.triangles() {
        let cross = crate::mesh::triangle_cross(&mesh.triangle_positions(t));
        let len = cross.norm();
        if len < 1e-10 {
            continue;
        }
        let n = cross / len;
        let [a, b, c] = tri.vertices();
        let q = Quadric::from_plane(&n, mesh.position(a));
        for v in [a, b, c] {
            quadrics[v.index()] += &q;
        }

        for e in 0..3 {
            if !matches!(
                tri.adjacency(e),
                Adjacency::Boundary | Adjacency::NonManifold(_)
            ) {
                continue;
            }
            let (p, q) = tri.edge(e);
            let dir = mesh.position(q) - mesh.position(p);
            let side = dir.cross(&n);
            let side_len = side.norm();
            if side_len < 1e-10 {
                continue;
            }
            let constraint = Quadric::from_plane(&(side / side_len), mesh.position(p));
            quadrics[p.index()] += &constraint;
            quadrics[q.index()] += &constraint;
        }
    }

    quadrics
}

/// Target position and cost of merging `gone` into `keep`.
pub fn evaluate_collapse(
    mesh: &Mesh,
    quadrics: &[Quadric],
    keep: VertexId,
    gone: VertexId,
    placement: Placement,
) -> (Point3<f64>, f64) {
    let q = quadrics[keep.index()] + quadrics[gone.index()];
    let p0 = *mesh.position(keep);
    let p1 = *mesh.position(gone);
    let mid = Point3::from((p0.coords + p1.coords) * 0.5);

    let target = match placement {
        Placement::Vertex => p0,
        Placement::Middle => mid,
        Placement::Optimal => match q.minimizer() {
            // Keep the optimum only if it stays near the edge
            Some(p) if (p - mid).norm() < (p1 - p0).norm() * 2.0 => p,
            Some(_) => mid,
            None => {
                let e0 = q.evaluate(&p0);
                let e1 = q.evaluate(&p1);
                let em = q.evaluate(&mid);
                if e0 <= e1 && e0 <= em {
                    p0
                } else if e1 <= em {
                    p1
                } else {
                    mid
                }
            }
        },
    };

    (target, q.evaluate(&target))
}
