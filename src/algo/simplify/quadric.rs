//! Garland-Heckbert plane quadrics.
//!
//! Every vertex accumulates the squared-distance quadrics of the planes of its
//! incident faces. Border edges additionally contribute the plane that
//! contains the edge and is perpendicular to its face, weighted by a large
//! multiplier, which keeps open boundaries from shrinking.

use std::ops::{Add, AddAssign, Mul};

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::mesh::{HalfEdgeMesh, MeshIndex, VertexId};

/// Below this length a face or edge vector is treated as degenerate.
const DEGENERATE_LENGTH: f64 = 1e-12;

/// A quadric error matrix (4x4 symmetric matrix).
///
/// Represents the sum of squared distances to a set of planes.
/// Stored as 10 unique elements since the matrix is symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quadric {
    /// Upper triangular elements: [a, b, c, d, e, f, g, h, i, j]
    /// Matrix form:
    /// | a b c d |
    /// | b e f g |
    /// | c f h i |
    /// | d g i j |
    data: [f64; 10],
}

impl Quadric {
    /// Create a zero quadric.
    pub fn zero() -> Self {
        Self { data: [0.0; 10] }
    }

    /// Create a quadric from a plane equation ax + by + cz + d = 0.
    /// The plane should be normalized (a² + b² + c² = 1).
    pub fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
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

    /// Create a quadric for the plane through `p` with unit normal `n`.
    pub fn from_point_normal(p: &Point3<f64>, n: &Vector3<f64>) -> Self {
        Self::from_plane(n.x, n.y, n.z, -n.dot(&p.coords))
    }

    /// Evaluate the quadric error for a point.
    /// Returns v^T * Q * v where v = [x, y, z, 1].
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let x = p.x;
        let y = p.y;
        let z = p.z;

        self.data[0] * x * x
            + 2.0 * self.data[1] * x * y
            + 2.0 * self.data[2] * x * z
            + 2.0 * self.data[3] * x
            + self.data[4] * y * y
            + 2.0 * self.data[5] * y * z
            + 2.0 * self.data[6] * y
            + self.data[7] * z * z
            + 2.0 * self.data[8] * z
            + self.data[9]
    }

    /// Convert to a 4x4 matrix.
    #[rustfmt::skip]
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::new(
            self.data[0], self.data[1], self.data[2], self.data[3],
            self.data[1], self.data[4], self.data[5], self.data[6],
            self.data[2], self.data[5], self.data[7], self.data[8],
            self.data[3], self.data[6], self.data[8], self.data[9],
        )
    }

    /// The bilinear form `aᵀ Q b` on homogeneous vectors.
    pub fn bilinear(&self, a: &Vector4<f64>, b: &Vector4<f64>) -> f64 {
        a.dot(&(self.to_matrix() * b))
    }

    /// Find the point minimizing the quadric error.
    ///
    /// Solves `Q' v = [0, 0, 0, 1]ᵀ` where `Q'` is `Q` with its last row
    /// replaced by `[0, 0, 0, 1]`. Returns `None` if `Q'` is singular.
    pub fn optimal_point(&self) -> Option<Point3<f64>> {
        let mut m = self.to_matrix();
        m[(3, 0)] = 0.0;
        m[(3, 1)] = 0.0;
        m[(3, 2)] = 0.0;
        m[(3, 3)] = 1.0;

        if m.determinant().abs() < DEGENERATE_LENGTH {
            return None;
        }

        let inv = m.try_inverse()?;
        let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let p = Point3::new(v.x, v.y, v.z);
        if p.iter().all(|c| c.is_finite()) {
            Some(p)
        } else {
            None
        }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, other: Quadric) {
        for i in 0..10 {
            self.data[i] += other.data[i];
        }
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(self, other: Quadric) -> Quadric {
        let mut result = self;
        result += other;
        result
    }
}

impl Mul<f64> for Quadric {
    type Output = Quadric;

    fn mul(self, s: f64) -> Quadric {
        let mut result = self;
        for x in result.data.iter_mut() {
            *x *= s;
        }
        result
    }
}

/// Per-vertex quadrics of a mesh.
#[derive(Debug, Clone)]
pub struct QuadricAccumulator {
    quadrics: Vec<Quadric>,
}

impl QuadricAccumulator {
    /// Accumulate face and border quadrics for every live vertex.
    ///
    /// Face planes use the unit face normal (not area weighted). Each border
    /// edge adds the plane through the edge perpendicular to its face, scaled
    /// by `border_weight`, to both endpoints.
    pub fn from_mesh<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, border_weight: f64) -> Self {
        let mut quadrics = vec![Quadric::zero(); mesh.vertex_capacity()];

        for f in mesh.face_ids() {
            let [v0, v1, v2] = mesh.face_triangle(f);
            let Some(n) = unit_normal(mesh, [v0, v1, v2]) else {
                continue;
            };
            let q = Quadric::from_point_normal(mesh.position(v0), &n);
            quadrics[v0.index()] += q;
            quadrics[v1.index()] += q;
            quadrics[v2.index()] += q;
        }

        for h in mesh.halfedge_ids() {
            if mesh.is_border(h) || !mesh.is_border(mesh.twin(h)) {
                continue;
            }
            let a = mesh.source(h);
            let b = mesh.target(h);
            let Some(face_normal) = unit_normal(mesh, mesh.face_triangle(mesh.face_of(h))) else {
                continue;
            };
            let edge = mesh.position(b) - mesh.position(a);
            let len = edge.norm();
            if len < DEGENERATE_LENGTH {
                continue;
            }
            let n = (edge / len).cross(&face_normal);
            let q = Quadric::from_point_normal(mesh.position(a), &n) * border_weight;
            quadrics[a.index()] += q;
            quadrics[b.index()] += q;
        }

        Self { quadrics }
    }

    /// The quadric of a vertex.
    pub fn get<I: MeshIndex>(&self, v: VertexId<I>) -> &Quadric {
        &self.quadrics[v.index()]
    }

    /// The combined quadric of an edge.
    pub fn edge_quadric<I: MeshIndex>(&self, v0: VertexId<I>, v1: VertexId<I>) -> Quadric {
        self.quadrics[v0.index()] + self.quadrics[v1.index()]
    }

    /// Fold the quadric of `removed` into `survivor`.
    pub fn merge<I: MeshIndex>(&mut self, survivor: VertexId<I>, removed: VertexId<I>) {
        let q = self.quadrics[removed.index()];
        self.quadrics[survivor.index()] += q;
    }
}

fn unit_normal<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, [a, b, c]: [VertexId<I>; 3]) -> Option<Vector3<f64>> {
    let p0 = mesh.position(a);
    let n = (mesh.position(b) - p0).cross(&(mesh.position(c) - p0));
    let len = n.norm();
    if len < DEGENERATE_LENGTH {
        None
    } else {
        Some(n / len)
    }
}
