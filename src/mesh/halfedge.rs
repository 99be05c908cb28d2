//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for triangle meshes, with O(1) local adjacency and in-place topological
//! editing.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions,
//!   allocated as a pair (`2e`, `2e + 1`)
//! - Each half-edge knows its **target** vertex, its **twin**, the **next** and
//!   **prev** half-edges around its face, and its **face**
//! - Each vertex stores one **outgoing** half-edge
//! - Each face stores one half-edge of its loop
//!
//! # Boundary Handling
//!
//! Border half-edges have an invalid face id and are linked into loops through
//! `next`/`prev`, just like face half-edges. A vertex on the border always
//! stores an outgoing border half-edge, so [`HalfEdgeMesh::is_border_vertex`]
//! is O(1).
//!
//! # Removal
//!
//! Removing an element only tombstones it. Ids of live elements never change,
//! which keeps ids recorded mid-pass meaningful until the mesh is dropped.

use nalgebra::{Point3, Vector3};

use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// One outgoing half-edge from this vertex.
    /// For border vertices, this is guaranteed to be a border half-edge.
    /// Invalid for isolated vertices.
    pub halfedge: HalfEdgeId<I>,

    pub(crate) removed: bool,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a new isolated vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            halfedge: HalfEdgeId::invalid(),
            removed: false,
        }
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge points to.
    pub vertex: VertexId<I>,

    /// The opposite half-edge (pointing in the reverse direction).
    pub twin: HalfEdgeId<I>,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face.
    pub prev: HalfEdgeId<I>,

    /// The face this half-edge belongs to.
    /// Invalid for border half-edges.
    pub face: FaceId<I>,

    pub(crate) removed: bool,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create a new unlinked half-edge.
    pub fn new() -> Self {
        Self {
            vertex: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
            removed: false,
        }
    }

    /// Check if this half-edge is on the border.
    #[inline]
    pub fn is_border(&self) -> bool {
        !self.face.is_valid()
    }
}

impl<I: MeshIndex> Default for HalfEdge<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,

    pub(crate) removed: bool,
}

impl<I: MeshIndex> Face<I> {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self {
            halfedge,
            removed: false,
        }
    }
}

/// A half-edge mesh data structure for triangle meshes.
///
/// Element storage is arena-based; counts returned by [`num_vertices`],
/// [`num_faces`] and [`num_edges`] only include live elements.
///
/// [`num_vertices`]: HalfEdgeMesh::num_vertices
/// [`num_faces`]: HalfEdgeMesh::num_faces
/// [`num_edges`]: HalfEdgeMesh::num_edges
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,

    pub(crate) live_vertices: usize,
    pub(crate) live_edges: usize,
    pub(crate) live_faces: usize,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            halfedges: Vec::new(),
            faces: Vec::new(),
            live_vertices: 0,
            live_edges: 0,
            live_faces: 0,
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed mesh: E = 3F/2, so HE = 3F. Leave room for border half-edges.
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
            live_vertices: 0,
            live_edges: 0,
            live_faces: 0,
        }
    }

    // ==================== Counts ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.live_vertices
    }

    /// Number of live edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.live_edges
    }

    /// Number of live half-edges (border half-edges included).
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.live_edges * 2
    }

    /// Number of live faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.live_faces
    }

    /// Number of vertex slots, removed vertices included.
    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edge slots, removed edges included.
    #[inline]
    pub fn edge_capacity(&self) -> usize {
        self.halfedges.len() / 2
    }

    /// Returns `true` if the mesh has no live faces.
    pub fn is_empty(&self) -> bool {
        self.live_faces == 0
    }

    // ==================== Accessors ====================

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex<I> {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID.
    #[inline]
    pub fn halfedge_mut(&mut self, id: HalfEdgeId<I>) -> &mut HalfEdge<I> {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Get a mutable face by ID.
    #[inline]
    pub fn face_mut(&mut self, id: FaceId<I>) -> &mut Face<I> {
        &mut self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        self.vertex_mut(v).position = pos;
    }

    /// Returns `true` if `v` names a live vertex of this mesh.
    pub fn contains_vertex(&self, v: VertexId<I>) -> bool {
        v.is_valid() && v.index() < self.vertices.len() && !self.vertices[v.index()].removed
    }

    /// Returns `true` if the vertex has been removed.
    #[inline]
    pub fn is_vertex_removed(&self, v: VertexId<I>) -> bool {
        self.vertex(v).removed
    }

    /// Returns `true` if the edge has been removed.
    #[inline]
    pub fn is_edge_removed(&self, e: EdgeId<I>) -> bool {
        self.halfedge(e.halfedge()).removed
    }

    /// Returns `true` if the face has been removed.
    #[inline]
    pub fn is_face_removed(&self, f: FaceId<I>) -> bool {
        self.face(f).removed
    }

    // ==================== Topology Queries ====================

    /// Get the twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the vertex a half-edge points to.
    #[inline]
    pub fn target(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).vertex
    }

    /// Get the vertex a half-edge starts from.
    #[inline]
    pub fn source(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.target(self.twin(he))
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Check if a half-edge is on the border.
    #[inline]
    pub fn is_border(&self, he: HalfEdgeId<I>) -> bool {
        self.halfedge(he).is_border()
    }

    /// Check if an edge (represented by one of its half-edges) is on the border.
    #[inline]
    pub fn is_border_edge(&self, he: HalfEdgeId<I>) -> bool {
        self.is_border(he) || self.is_border(self.twin(he))
    }

    /// Check if a vertex is on the border. Isolated vertices count as border.
    #[inline]
    pub fn is_border_vertex(&self, v: VertexId<I>) -> bool {
        let h = self.vertex(v).halfedge;
        !h.is_valid() || self.is_border(h)
    }

    /// Check if a vertex has no incident edges.
    #[inline]
    pub fn is_isolated(&self, v: VertexId<I>) -> bool {
        !self.vertex(v).halfedge.is_valid()
    }

    /// The next half-edge with the same target, turning clockwise:
    /// `twin(next(he))`.
    #[inline]
    pub fn next_around_target(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.twin(self.next(he))
    }

    /// Find the half-edge going from `from` to `to`.
    pub fn find_halfedge(&self, from: VertexId<I>, to: VertexId<I>) -> Option<HalfEdgeId<I>> {
        self.vertex_halfedges(from).find(|&he| self.target(he) == to)
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex IDs in increasing order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.removed)
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live edge IDs in increasing order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        (0..self.halfedges.len() / 2)
            .filter(|&e| !self.halfedges[2 * e].removed)
            .map(EdgeId::new)
    }

    /// Iterate over live half-edge IDs in increasing order.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        self.halfedges
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.removed)
            .map(|(i, _)| HalfEdgeId::new(i))
    }

    /// Iterate over live face IDs in increasing order.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.removed)
            .map(|(i, _)| FaceId::new(i))
    }

    /// Iterate over outgoing half-edges of a vertex, turning clockwise.
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| self.target(he))
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v).filter_map(|he| {
            let f = self.face_of(he);
            if f.is_valid() {
                Some(f)
            } else {
                None
            }
        })
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FaceHalfEdgeIter<'_, I> {
        FaceHalfEdgeIter::new(self, self.face(f).halfedge)
    }

    /// Get the three vertices of a triangular face, in loop order.
    pub fn face_triangle(&self, f: FaceId<I>) -> [VertexId<I>; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        [self.source(he0), self.target(he0), self.target(he1)]
    }

    /// Get the positions of the three vertices of a triangular face.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    /// Number of half-edges in a face loop. Three for a valid triangle.
    pub fn face_side_count(&self, f: FaceId<I>) -> usize {
        self.face_halfedges(f).count()
    }

    // ==================== Geometry ====================

    /// Compute the unit normal of a face.
    pub fn face_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0)).normalize()
    }

    /// Compute the valence (degree) of a vertex.
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_halfedges(v).count()
    }

    // ==================== Construction ====================

    /// Add a new isolated vertex and return its ID.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        self.live_vertices += 1;
        id
    }

    /// Allocate a new edge from `from` to `to`. Returns the half-edge pointing
    /// to `to`; its twin points to `from`. Neither side is linked into a loop.
    pub(crate) fn new_edge(&mut self, from: VertexId<I>, to: VertexId<I>) -> HalfEdgeId<I> {
        let h0 = HalfEdgeId::new(self.halfedges.len());
        let h1 = HalfEdgeId::new(self.halfedges.len() + 1);

        let mut a = HalfEdge::new();
        a.vertex = to;
        a.twin = h1;
        let mut b = HalfEdge::new();
        b.vertex = from;
        b.twin = h0;

        self.halfedges.push(a);
        self.halfedges.push(b);
        self.live_edges += 1;
        h0
    }

    /// Allocate a new face whose loop contains `he`. Half-edge face pointers
    /// are left to the caller.
    pub(crate) fn new_face(&mut self, he: HalfEdgeId<I>) -> FaceId<I> {
        let id = FaceId::new(self.faces.len());
        self.faces.push(Face::new(he));
        self.live_faces += 1;
        id
    }

    /// Link `a -> b` in a loop.
    #[inline]
    pub(crate) fn set_next(&mut self, a: HalfEdgeId<I>, b: HalfEdgeId<I>) {
        self.halfedge_mut(a).next = b;
        self.halfedge_mut(b).prev = a;
    }

    pub(crate) fn remove_vertex(&mut self, v: VertexId<I>) {
        let vx = self.vertex_mut(v);
        if !vx.removed {
            vx.removed = true;
            vx.halfedge = HalfEdgeId::invalid();
            self.live_vertices -= 1;
        }
    }

    pub(crate) fn remove_edge(&mut self, e: EdgeId<I>) {
        let h = e.halfedge();
        if !self.halfedge(h).removed {
            let t = self.twin(h);
            self.halfedge_mut(h).removed = true;
            self.halfedge_mut(t).removed = true;
            self.live_edges -= 1;
        }
    }

    pub(crate) fn remove_face(&mut self, f: FaceId<I>) {
        let face = self.face_mut(f);
        if !face.removed {
            face.removed = true;
            self.live_faces -= 1;
        }
    }

    /// Point the vertex at an outgoing border half-edge if it has one.
    pub(crate) fn adjust_outgoing_halfedge(&mut self, v: VertexId<I>) {
        let border = self.vertex_halfedges(v).find(|&h| self.is_border(h));
        if let Some(h) = border {
            self.vertex_mut(v).halfedge = h;
        }
    }

    // ==================== Validation ====================

    /// Check if the live connectivity is consistent.
    ///
    /// Verifies twin symmetry, `next`/`prev` symmetry, that `next` continues
    /// from the target of each half-edge, face membership of every loop, and
    /// that vertices point to outgoing half-edges (border ones on the border).
    pub fn is_valid(&self) -> bool {
        for h in self.halfedge_ids() {
            let he = self.halfedge(h);
            if !he.twin.is_valid() || !he.next.is_valid() || !he.prev.is_valid() {
                return false;
            }
            if self.halfedge(he.twin).twin != h || he.twin.edge() != h.edge() {
                return false;
            }
            if self.halfedge(he.next).removed || self.halfedge(he.next).prev != h {
                return false;
            }
            if self.halfedge(he.prev).next != h {
                return false;
            }
            if self.source(he.next) != he.vertex {
                return false;
            }
            if self.face_of(he.next) != he.face {
                return false;
            }
            if he.face.is_valid() && self.is_face_removed(he.face) {
                return false;
            }
            if !he.vertex.is_valid() || self.is_vertex_removed(he.vertex) {
                return false;
            }
        }

        for v in self.vertex_ids() {
            let h = self.vertex(v).halfedge;
            if !h.is_valid() {
                continue;
            }
            if self.halfedge(h).removed || self.source(h) != v {
                return false;
            }
            let has_border = self.vertex_halfedges(v).any(|o| self.is_border(o));
            if has_border && !self.is_border(h) {
                return false;
            }
        }

        for f in self.face_ids() {
            let h = self.face(f).halfedge;
            if !h.is_valid() || self.halfedge(h).removed || self.face_of(h) != f {
                return false;
            }
        }

        true
    }
}

/// Iterator over outgoing half-edges around a vertex, turning clockwise.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        // he: v -> w, twin: w -> v, next(twin) leaves v again.
        self.current = self.mesh.next(self.mesh.twin(self.current));

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over half-edges of a loop, following `next`.
pub struct FaceHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> FaceHalfEdgeIter<'a, I> {
    pub(crate) fn new(mesh: &'a HalfEdgeMesh<I>, start: HalfEdgeId<I>) -> Self {
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.mesh.next(self.current);

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::<u32>::new(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
        assert!(!v.halfedge.is_valid());
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = HalfEdgeMesh::<u32>::new();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_halfedges(), 0);
        assert_eq!(mesh.num_faces(), 0);
        assert!(mesh.is_empty());
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_new_edge_pairs_twins() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));

        let h = mesh.new_edge(a, b);
        assert_eq!(mesh.target(h), b);
        assert_eq!(mesh.source(h), a);
        assert_eq!(mesh.twin(h).edge(), h.edge());
        assert_eq!(mesh.num_edges(), 1);
        assert!(mesh.is_border_edge(h));
    }

    #[test]
    fn test_remove_is_tombstone() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.remove_vertex(a);

        assert_eq!(mesh.num_vertices(), 1);
        assert_eq!(mesh.vertex_capacity(), 2);
        assert!(!mesh.contains_vertex(a));
        assert!(mesh.contains_vertex(b));
        assert_eq!(mesh.vertex_ids().collect::<Vec<_>>(), vec![b]);
    }
}
