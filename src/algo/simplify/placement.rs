//! Placement of the merged vertex.
//!
//! A placement policy maps the combined quadric of an edge to a position for
//! the surviving vertex and to the cost of the collapse. The raw position is
//! then checked against a bound on how far the normals of the surrounding
//! faces may turn, and overridden by the constraint rule when sharp edges
//! are protected.

use nalgebra::{Point3, Vector3, Vector4};

use super::quadric::Quadric;
use super::sharp::ConstrainedEdges;
use crate::mesh::{FaceId, HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId};

const ZERO_TOLERANCE: f64 = 1e-12;

/// How the merged vertex position is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementKind {
    /// The quadric minimizer, falling back to a search along the edge when
    /// the quadric is singular.
    #[default]
    Solved,
    /// One of the two endpoints, bit for bit.
    EndpointRestricted,
}

/// Computes placements and costs for edge collapses.
#[derive(Debug, Clone, Copy)]
pub struct PlacementPolicy {
    kind: PlacementKind,
    min_normal_cos: f64,
}

impl PlacementPolicy {
    /// Create a policy. Placements that turn a surrounding face normal by
    /// more than `max_normal_angle_degrees` are rejected.
    pub fn new(kind: PlacementKind, max_normal_angle_degrees: f64) -> Self {
        Self {
            kind,
            min_normal_cos: max_normal_angle_degrees.to_radians().cos(),
        }
    }

    /// The placement strategy.
    pub fn kind(&self) -> PlacementKind {
        self.kind
    }

    /// The unconstrained optimal position for collapsing `p0` and `p1`.
    pub fn optimal_point(&self, q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> Point3<f64> {
        match self.kind {
            PlacementKind::Solved => q.optimal_point().unwrap_or_else(|| segment_minimizer(q, p0, p1)),
            PlacementKind::EndpointRestricted => endpoint_minimizer(q, p0, p1),
        }
    }

    /// The collapse cost, `max(0, xᵀQx)` at the optimal position.
    ///
    /// Returns `None` if the value is not finite.
    pub fn cost(&self, q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> Option<f64> {
        let x = self.optimal_point(q, p0, p1);
        let cost = q.evaluate(&x);
        if cost.is_finite() {
            Some(cost.max(0.0))
        } else {
            None
        }
    }

    /// The optimal position for collapsing `h`, if it keeps every surviving
    /// face around both endpoints within the normal bound.
    pub fn bounded_placement<I: MeshIndex>(
        &self,
        mesh: &HalfEdgeMesh<I>,
        h: HalfEdgeId<I>,
        q: &Quadric,
    ) -> Option<Point3<f64>> {
        let v0 = mesh.source(h);
        let v1 = mesh.target(h);
        let x = self.optimal_point(q, mesh.position(v0), mesh.position(v1));
        if !x.iter().all(|c| c.is_finite()) {
            return None;
        }
        if self.normal_change_ok(mesh, h, &x) {
            Some(x)
        } else {
            None
        }
    }

    /// Constrained placement: an endpoint touching a constrained edge pins the
    /// placement to its own position, the removed endpoint first. Otherwise
    /// falls back to [`bounded_placement`](Self::bounded_placement).
    pub fn constrained_placement<I: MeshIndex>(
        &self,
        mesh: &HalfEdgeMesh<I>,
        h: HalfEdgeId<I>,
        q: &Quadric,
        constraints: &ConstrainedEdges,
    ) -> Option<Point3<f64>> {
        for v in [mesh.source(h), mesh.target(h)] {
            if constraints.touches_vertex(mesh, v) {
                return Some(*mesh.position(v));
            }
        }
        self.bounded_placement(mesh, h, q)
    }

    /// Checks every face around either endpoint of `h`, except the two that
    /// vanish with the edge, against the normal bound after moving both
    /// endpoints to `x`.
    fn normal_change_ok<I: MeshIndex>(&self, mesh: &HalfEdgeMesh<I>, h: HalfEdgeId<I>, x: &Point3<f64>) -> bool {
        let v0 = mesh.source(h);
        let v1 = mesh.target(h);
        let fl = mesh.face_of(h);
        let fr = mesh.face_of(mesh.twin(h));

        let mut seen: Vec<FaceId<I>> = Vec::new();
        for f in mesh.vertex_faces(v0).chain(mesh.vertex_faces(v1)) {
            if f == fl || f == fr || seen.contains(&f) {
                continue;
            }
            seen.push(f);

            let corners = mesh.face_triangle(f);
            let before = normal_of(corners.map(|v| *mesh.position(v)));
            let after = normal_of(corners.map(|v| moved(mesh, v, v0, v1, x)));

            let before_len = before.norm();
            if before_len < ZERO_TOLERANCE {
                continue;
            }
            let after_len = after.norm();
            if after_len < ZERO_TOLERANCE {
                return false;
            }
            if before.dot(&after) / (before_len * after_len) < self.min_normal_cos {
                return false;
            }
        }
        true
    }
}

fn moved<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    v: VertexId<I>,
    v0: VertexId<I>,
    v1: VertexId<I>,
    x: &Point3<f64>,
) -> Point3<f64> {
    if v == v0 || v == v1 {
        *x
    } else {
        *mesh.position(v)
    }
}

fn normal_of([a, b, c]: [Point3<f64>; 3]) -> Vector3<f64> {
    (b - a).cross(&(c - a))
}

/// Minimizes the quadric along the segment `p0 + t (p1 - p0)`, `t ∈ [0, 1]`.
fn segment_minimizer(q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> Point3<f64> {
    let d: Vector4<f64> = (p1 - p0).to_homogeneous();
    let o = p0.to_homogeneous();
    let a = q.bilinear(&d, &d);
    let b = 2.0 * q.bilinear(&o, &d);

    if a.abs() < ZERO_TOLERANCE {
        return if b < 0.0 {
            *p1
        } else if b.abs() < ZERO_TOLERANCE {
            nalgebra::center(p0, p1)
        } else {
            *p0
        };
    }

    let t = -b / (2.0 * a);
    if !(0.0..=1.0).contains(&t) || a < 0.0 {
        lower_cost_endpoint(q, p0, p1)
    } else {
        p0 + (p1 - p0) * t
    }
}

/// Picks whichever endpoint the quadric prefers.
fn endpoint_minimizer(q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> Point3<f64> {
    let d: Vector4<f64> = (p1 - p0).to_homogeneous();
    let o = p0.to_homogeneous();
    let a = q.bilinear(&d, &d);

    if a.abs() < ZERO_TOLERANCE {
        let b = 2.0 * q.bilinear(&o, &d);
        return if b < 0.0 { *p1 } else { *p0 };
    }
    lower_cost_endpoint(q, p0, p1)
}

fn lower_cost_endpoint(q: &Quadric, p0: &Point3<f64>, p1: &Point3<f64>) -> Point3<f64> {
    if q.evaluate(p0) > q.evaluate(p1) {
        *p1
    } else {
        *p0
    }
}
