//! Sharp edge detection.
//!
//! Edges whose dihedral angle falls below a threshold, and all border edges,
//! are marked constrained. Constrained edges are never collapsed and pin the
//! placement of any collapse touching them.

use nalgebra::Point3;

use crate::mesh::{EdgeId, HalfEdgeMesh, MeshIndex, VertexId};

/// Signed dihedral angle in degrees, in (-180, 180], of the edge `pq` in the
/// tetrahedron `pqrs`.
///
/// Two coplanar triangles folded flat give ±180. A degenerate configuration
/// (either triangle has zero area) is reported as flat.
pub fn dihedral_angle(p: &Point3<f64>, q: &Point3<f64>, r: &Point3<f64>, s: &Point3<f64>) -> f64 {
    let ab = q - p;
    let ac = r - p;
    let ad = s - p;

    let abad = ab.cross(&ad);
    let x = ab.cross(&ac).dot(&abad);
    let y = ab.norm() * ac.dot(&abad);

    if x == 0.0 && y == 0.0 {
        return 180.0;
    }
    y.atan2(x).to_degrees()
}

/// The set of constrained edges of a mesh.
#[derive(Debug, Clone, Default)]
pub struct ConstrainedEdges {
    flags: Vec<bool>,
    count: usize,
}

impl ConstrainedEdges {
    /// No edge constrained.
    pub fn none<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Self {
        Self {
            flags: vec![false; mesh.edge_capacity()],
            count: 0,
        }
    }

    /// Mark an edge as constrained.
    pub fn mark<I: MeshIndex>(&mut self, e: EdgeId<I>) {
        if e.index() >= self.flags.len() {
            self.flags.resize(e.index() + 1, false);
        }
        if !self.flags[e.index()] {
            self.flags[e.index()] = true;
            self.count += 1;
        }
    }

    /// Returns `true` if the edge is constrained.
    pub fn is_constrained<I: MeshIndex>(&self, e: EdgeId<I>) -> bool {
        self.flags.get(e.index()).copied().unwrap_or(false)
    }

    /// Returns `true` if any edge incident to `v` is constrained.
    pub fn touches_vertex<I: MeshIndex>(&self, mesh: &HalfEdgeMesh<I>, v: VertexId<I>) -> bool {
        self.count > 0 && mesh.vertex_halfedges(v).any(|h| self.is_constrained(h.edge()))
    }

    /// Number of constrained edges.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no edge is constrained.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Marks sharp and border edges.
#[derive(Debug, Clone, Copy)]
pub struct SharpEdgeDetector {
    threshold_degrees: f64,
}

impl SharpEdgeDetector {
    /// Create a detector. A threshold `<= 0` disables detection.
    pub fn new(threshold_degrees: f64) -> Self {
        Self { threshold_degrees }
    }

    /// Returns `true` if the detector marks anything at all.
    pub fn is_enabled(&self) -> bool {
        self.threshold_degrees > 0.0
    }

    /// Returns `true` if the edge is a border edge or its two faces meet at a
    /// dihedral angle sharper than the threshold.
    pub fn is_sharp<I: MeshIndex>(&self, mesh: &HalfEdgeMesh<I>, e: EdgeId<I>) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let h = e.halfedge();
        let o = mesh.twin(h);
        if mesh.is_border(h) || mesh.is_border(o) {
            return true;
        }
        let angle = dihedral_angle(
            mesh.position(mesh.source(h)),
            mesh.position(mesh.target(h)),
            mesh.position(mesh.target(mesh.next(h))),
            mesh.position(mesh.target(mesh.next(o))),
        );
        angle.abs() < self.threshold_degrees
    }

    /// Collect every sharp edge of the mesh.
    pub fn detect<I: MeshIndex>(&self, mesh: &HalfEdgeMesh<I>) -> ConstrainedEdges {
        let mut constrained = ConstrainedEdges::none(mesh);
        if !self.is_enabled() {
            return constrained;
        }
        for e in mesh.edge_ids() {
            if self.is_sharp(mesh, e) {
                constrained.mark(e);
            }
        }
        log::debug!("marked {} sharp edges (threshold {}°)", constrained.len(), self.threshold_degrees);
        constrained
    }
}
