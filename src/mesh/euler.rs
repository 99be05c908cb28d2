//! Euler operators on the half-edge mesh.
//!
//! These are the local edits the simplifier and the vertex-split reconstructor
//! are built from. Each operator keeps the mesh a valid oriented 2-manifold
//! when its preconditions hold; the preconditions are checked and a violating
//! call returns `None` without touching the mesh.
//!
//! # Conventions
//!
//! - `collapse(h)` removes `source(h)` and keeps `target(h)`.
//! - `split_vertex(h1, h2)` is the inverse of a collapse: it pulls the fan of
//!   incoming half-edges between `h1` (exclusive) and `h2` (inclusive) onto a
//!   fresh vertex joined to the original by a new edge.
//! - `split_face(h1, h2)` cuts a face with a new edge from `target(h1)` to
//!   `target(h2)`.

use std::collections::HashSet;

use super::halfedge::HalfEdgeMesh;
use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Returns `true` if `h` names a live half-edge of this mesh.
    pub fn contains_halfedge(&self, h: HalfEdgeId<I>) -> bool {
        h.is_valid() && h.index() < self.halfedges.len() && !self.halfedges[h.index()].removed
    }

    /// Split the common target `v` of `h1` and `h2` into two vertices.
    ///
    /// A new vertex is created at the position of `v`; the incoming half-edges
    /// strictly after `h1` up to and including `h2`, turning clockwise around
    /// `v`, are moved onto it. The two vertices are joined by a new edge whose
    /// half-edge `h_new` is inserted after `h2` in its loop and whose twin is
    /// inserted after `h1`. No faces are created.
    ///
    /// Returns `h_new`, with `source(h_new)` the new vertex and
    /// `target(h_new) == v`, or `None` if `h1 == h2` or the targets differ.
    pub fn split_vertex(&mut self, h1: HalfEdgeId<I>, h2: HalfEdgeId<I>) -> Option<HalfEdgeId<I>> {
        if h1 == h2 || !self.contains_halfedge(h1) || !self.contains_halfedge(h2) {
            return None;
        }
        let v = self.target(h1);
        if self.target(h2) != v {
            return None;
        }

        let vnew = self.add_vertex(*self.position(v));
        let hnew = self.new_edge(vnew, v);
        let hnew_opp = self.twin(hnew);

        let n2 = self.next(h2);
        let f2 = self.face_of(h2);
        self.halfedge_mut(hnew).face = f2;
        self.set_next(hnew, n2);
        self.set_next(h2, hnew);

        let n1 = self.next(h1);
        let f1 = self.face_of(h1);
        self.halfedge_mut(hnew_opp).face = f1;
        self.set_next(hnew_opp, n1);
        self.set_next(h1, hnew_opp);

        // Walks the moved fan: hnew_opp, twin(n1), ..., h2, back to hnew_opp.
        let mut h = hnew_opp;
        loop {
            self.halfedge_mut(h).vertex = vnew;
            h = self.next_around_target(h);
            if h == hnew_opp {
                break;
            }
        }

        self.vertex_mut(vnew).halfedge = hnew;
        self.vertex_mut(v).halfedge = hnew_opp;
        self.adjust_outgoing_halfedge(vnew);
        self.adjust_outgoing_halfedge(v);

        Some(hnew)
    }

    /// Split the face (or border loop) of `h1` and `h2` with a new edge from
    /// `target(h1)` to `target(h2)`.
    ///
    /// Returns the new half-edge `h3`, with `next(h1) == h3`. The face of `h1`
    /// keeps the loop through `h1` and `h3`; a new face is created for the
    /// loop through `h2` and `twin(h3)`.
    pub fn split_face(&mut self, h1: HalfEdgeId<I>, h2: HalfEdgeId<I>) -> Option<HalfEdgeId<I>> {
        if h1 == h2 || !self.contains_halfedge(h1) || !self.contains_halfedge(h2) {
            return None;
        }
        let f = self.face_of(h1);
        if !f.is_valid() || self.face_of(h2) != f {
            return None;
        }
        if self.next(h1) == h2 || self.next(h2) == h1 {
            return None;
        }

        let a = self.target(h1);
        let b = self.target(h2);
        let h3 = self.new_edge(a, b);
        let h4 = self.twin(h3);

        let n1 = self.next(h1);
        let n2 = self.next(h2);
        self.set_next(h1, h3);
        self.set_next(h3, n2);
        self.set_next(h2, h4);
        self.set_next(h4, n1);

        self.halfedge_mut(h3).face = f;
        self.face_mut(f).halfedge = h3;

        let fnew = self.new_face(h4);
        let mut h = h4;
        loop {
            self.halfedge_mut(h).face = fnew;
            h = self.next(h);
            if h == h4 {
                break;
            }
        }

        Some(h3)
    }

    /// Add a triangle `v0 v1 v2` (counter-clockwise) between existing vertices.
    ///
    /// Existing border half-edges are reused and missing edges are created.
    /// When the new face joins two separate border patches around a vertex,
    /// the border loops are relinked. Returns `None` for a complex vertex
    /// (a non-border vertex, or a gap that cannot be closed) or a complex edge
    /// (a half-edge that already has a face).
    pub fn add_face(&mut self, verts: [VertexId<I>; 3]) -> Option<FaceId<I>> {
        const N: usize = 3;
        let mut hes = [HalfEdgeId::<I>::invalid(); N];
        let mut is_new = [false; N];
        let mut needs_adjust = [false; N];
        let mut next_cache: Vec<(HalfEdgeId<I>, HalfEdgeId<I>)> = Vec::with_capacity(6 * N);

        for i in 0..N {
            let ii = (i + 1) % N;
            if !self.contains_vertex(verts[i]) || verts[i] == verts[ii] {
                return None;
            }
            if !self.is_border_vertex(verts[i]) {
                log::trace!("add_face: complex vertex {:?}", verts[i]);
                return None;
            }
            match self.find_halfedge(verts[i], verts[ii]) {
                Some(h) if !self.is_border(h) => {
                    log::trace!("add_face: complex edge {:?} -> {:?}", verts[i], verts[ii]);
                    return None;
                }
                Some(h) => hes[i] = h,
                None => is_new[i] = true,
            }
        }

        // Make the two existing border half-edges consecutive.
        for i in 0..N {
            let ii = (i + 1) % N;
            if is_new[i] || is_new[ii] {
                continue;
            }
            let inner_prev = hes[i];
            let inner_next = hes[ii];
            if self.next(inner_prev) == inner_next {
                continue;
            }

            let outer_prev = self.twin(inner_next);
            let mut boundary_prev = outer_prev;
            loop {
                boundary_prev = self.next_around_target(boundary_prev);
                if self.is_border(boundary_prev) && boundary_prev != inner_prev {
                    break;
                }
                if boundary_prev == outer_prev {
                    return None;
                }
            }
            let boundary_next = self.next(boundary_prev);
            if boundary_next == inner_next {
                log::trace!("add_face: patch relinking failed at {:?}", verts[ii]);
                return None;
            }

            let patch_start = self.next(inner_prev);
            let patch_end = self.prev(inner_next);
            next_cache.push((boundary_prev, patch_start));
            next_cache.push((patch_end, boundary_next));
            next_cache.push((inner_prev, inner_next));
        }

        for i in 0..N {
            if is_new[i] {
                hes[i] = self.new_edge(verts[i], verts[(i + 1) % N]);
            }
        }

        let fh = self.new_face(hes[N - 1]);

        for i in 0..N {
            let ii = (i + 1) % N;
            let vh = verts[ii];
            let inner_prev = hes[i];
            let inner_next = hes[ii];

            let id = (is_new[i] as u8) | ((is_new[ii] as u8) << 1);
            if id != 0 {
                let outer_prev = self.twin(inner_next);
                let outer_next = self.twin(inner_prev);

                match id {
                    // inner_prev is new, inner_next existed
                    1 => {
                        let boundary_prev = self.prev(inner_next);
                        next_cache.push((boundary_prev, outer_next));
                        self.vertex_mut(vh).halfedge = outer_next;
                    }
                    // inner_next is new, inner_prev existed
                    2 => {
                        let boundary_next = self.next(inner_prev);
                        next_cache.push((outer_prev, boundary_next));
                        self.vertex_mut(vh).halfedge = boundary_next;
                    }
                    // both new
                    _ => {
                        if self.is_isolated(vh) {
                            self.vertex_mut(vh).halfedge = outer_next;
                            next_cache.push((outer_prev, outer_next));
                        } else {
                            let boundary_next = self.vertex(vh).halfedge;
                            let boundary_prev = self.prev(boundary_next);
                            next_cache.push((boundary_prev, outer_next));
                            next_cache.push((outer_prev, boundary_next));
                        }
                    }
                }

                next_cache.push((inner_prev, inner_next));
            } else {
                needs_adjust[ii] = self.vertex(vh).halfedge == inner_next;
            }

            self.halfedge_mut(hes[i]).face = fh;
        }

        for (a, b) in next_cache {
            self.set_next(a, b);
        }

        for i in 0..N {
            if needs_adjust[i] {
                self.adjust_outgoing_halfedge(verts[i]);
            }
        }

        Some(fh)
    }

    /// Collapse the edge of `h` by merging `source(h)` into `target(h)`.
    ///
    /// The source vertex, the edge and the (up to two) faces incident to the
    /// edge are removed; each removed triangle's two remaining edges are merged
    /// into one. The surviving vertex keeps its position. Returns the survivor.
    ///
    /// Call [`is_collapse_ok`](Self::is_collapse_ok) first; collapsing an edge
    /// that fails the check corrupts the mesh.
    pub fn collapse(&mut self, h: HalfEdgeId<I>) -> VertexId<I> {
        let hn = self.next(h);
        let hp = self.prev(h);
        let o = self.twin(h);
        let on = self.next(o);
        let op = self.prev(o);
        let fh = self.face_of(h);
        let fo = self.face_of(o);
        let v0 = self.source(h);
        let v1 = self.target(h);

        let incoming: Vec<HalfEdgeId<I>> =
            self.vertex_halfedges(v0).map(|x| self.twin(x)).collect();
        for x in incoming {
            self.halfedge_mut(x).vertex = v1;
        }

        self.set_next(hp, hn);
        self.set_next(op, on);

        if fh.is_valid() {
            self.face_mut(fh).halfedge = hn;
        }
        if fo.is_valid() {
            self.face_mut(fo).halfedge = on;
        }

        if self.vertex(v1).halfedge == o {
            self.vertex_mut(v1).halfedge = hn;
        }
        self.adjust_outgoing_halfedge(v1);

        self.remove_edge(h.edge());
        self.remove_vertex(v0);

        if self.next(self.next(hn)) == hn {
            self.collapse_loop(hn);
        }
        if self.next(self.next(on)) == on {
            self.collapse_loop(on);
        }

        v1
    }

    /// Remove a two-sided loop `h0, next(h0)` left behind by a collapse,
    /// keeping the edge of `next(h0)`.
    fn collapse_loop(&mut self, h0: HalfEdgeId<I>) {
        let h1 = self.next(h0);
        let o0 = self.twin(h0);
        let o1 = self.twin(h1);
        let v0 = self.target(h0);
        let v1 = self.target(h1);
        let fh = self.face_of(h0);
        let fo = self.face_of(o0);

        let o0_next = self.next(o0);
        let o0_prev = self.prev(o0);
        self.set_next(h1, o0_next);
        self.set_next(o0_prev, h1);
        self.halfedge_mut(h1).face = fo;

        self.vertex_mut(v0).halfedge = h1;
        self.adjust_outgoing_halfedge(v0);
        self.vertex_mut(v1).halfedge = o1;
        self.adjust_outgoing_halfedge(v1);

        if fo.is_valid() && self.face(fo).halfedge == o0 {
            self.face_mut(fo).halfedge = h1;
        }

        if fh.is_valid() {
            self.remove_face(fh);
        }
        self.remove_edge(h0.edge());
    }

    /// Check whether collapsing `h` keeps the mesh a valid 2-manifold.
    ///
    /// Rejects:
    /// - an edge whose incident triangle has its other two edges on the border
    /// - edges whose two apexes coincide
    /// - interior edges joining two border vertices
    /// - edges failing the link condition (a common neighbour of both
    ///   endpoints other than the apexes)
    /// - an edge of a closed tetrahedron
    pub fn is_collapse_ok(&self, h: HalfEdgeId<I>) -> bool {
        if !self.contains_halfedge(h) {
            return false;
        }
        let o = self.twin(h);
        let v0 = self.source(h);
        let v1 = self.target(h);
        if v0 == v1 || self.is_vertex_removed(v0) || self.is_vertex_removed(v1) {
            return false;
        }

        let mut vl = None;
        if !self.is_border(h) {
            let h1 = self.next(h);
            let h2 = self.next(h1);
            vl = Some(self.target(h1));
            if self.is_border(self.twin(h1)) && self.is_border(self.twin(h2)) {
                return false;
            }
        }

        let mut vr = None;
        if !self.is_border(o) {
            let o1 = self.next(o);
            let o2 = self.next(o1);
            vr = Some(self.target(o1));
            if self.is_border(self.twin(o1)) && self.is_border(self.twin(o2)) {
                return false;
            }
        }

        if vl.is_some() && vl == vr {
            return false;
        }

        if self.is_border_vertex(v0)
            && self.is_border_vertex(v1)
            && !self.is_border(h)
            && !self.is_border(o)
        {
            return false;
        }

        let ring0: HashSet<VertexId<I>> = self.vertex_neighbors(v0).collect();
        for n in self.vertex_neighbors(v1) {
            if n != v0 && Some(n) != vl && Some(n) != vr && ring0.contains(&n) {
                return false;
            }
        }

        if let (Some(l), Some(r)) = (vl, vr) {
            if self.valence(v0) == 3 && self.valence(v1) == 3 && self.find_halfedge(l, r).is_some()
            {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::{build_from_triangles, HalfEdgeMesh, VertexId};
    use nalgebra::Point3;

    fn octahedron() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn tetrahedron() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    /// 3x3 vertex grid, 8 triangles, centre vertex 4.
    fn grid() -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                vertices.push(Point3::new(x as f64, y as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..2 {
            for x in 0..2 {
                let i = y * 3 + x;
                faces.push([i, i + 1, i + 4]);
                faces.push([i, i + 4, i + 3]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn test_collapse_octahedron_edge() {
        let mut mesh = octahedron();
        let h = mesh.find_halfedge(v(0), v(4)).unwrap();
        assert!(mesh.is_collapse_ok(h));

        let survivor = mesh.collapse(h);
        assert_eq!(survivor, v(4));
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.num_faces(), 6);
        assert_eq!(mesh.num_edges(), 9);
        assert!(mesh.is_vertex_removed(v(0)));
        for f in mesh.face_ids() {
            assert_eq!(mesh.face_side_count(f), 3);
        }
    }

    #[test]
    fn test_tetrahedron_collapse_rejected() {
        let mesh = tetrahedron();
        for h in mesh.halfedge_ids() {
            assert!(!mesh.is_collapse_ok(h));
        }
    }

    #[test]
    fn test_interior_edge_between_border_vertices_rejected() {
        let mesh = grid();
        // 0 -> 4 is interior, 0 is a border vertex and 4 is not.
        let h = mesh.find_halfedge(v(0), v(4)).unwrap();
        assert!(mesh.is_collapse_ok(h));
        // 1 -> 5 is interior but joins two border vertices.
        let h = mesh.find_halfedge(v(1), v(5)).unwrap();
        assert!(!mesh.is_border_edge(h));
        assert!(!mesh.is_collapse_ok(h));
    }

    #[test]
    fn test_collapse_border_edge() {
        let mut mesh = grid();
        let h = mesh.find_halfedge(v(0), v(1)).unwrap();
        assert!(mesh.is_border_edge(h));
        assert!(mesh.is_collapse_ok(h));

        mesh.collapse(h);
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_faces(), 7);
        assert!(mesh.is_border_vertex(v(1)));
    }

    #[test]
    fn test_split_vertex_then_faces_restores_collapse() {
        let mut mesh = octahedron();
        let before_faces = mesh.num_faces();
        let before_edges = mesh.num_edges();

        // Collapse 0 -> 4: left apex 3, right apex 2.
        let h = mesh.find_halfedge(v(0), v(4)).unwrap();
        mesh.collapse(h);

        let vs = v(4);
        let h1 = mesh.find_halfedge(v(2), vs).unwrap();
        let h2 = mesh.find_halfedge(v(3), vs).unwrap();
        let hnew = mesh.split_vertex(h1, h2).unwrap();
        let vt = mesh.source(hnew);
        assert_eq!(mesh.target(hnew), vs);

        let hl = mesh.find_halfedge(v(3), vt).unwrap();
        let hl_prev = mesh.prev(hl);
        mesh.split_face(hnew, hl_prev).unwrap();

        let hnew_opp = mesh.twin(hnew);
        let hr = mesh.find_halfedge(v(2), vs).unwrap();
        let hr_prev = mesh.prev(hr);
        mesh.split_face(hnew_opp, hr_prev).unwrap();

        assert!(mesh.is_valid());
        assert_eq!(mesh.num_faces(), before_faces);
        assert_eq!(mesh.num_edges(), before_edges);
        assert_eq!(mesh.valence(vt), 4);
        assert_eq!(mesh.valence(vs), 4);
        for f in mesh.face_ids() {
            assert_eq!(mesh.face_side_count(f), 3);
        }
    }

    #[test]
    fn test_split_face_rejects_adjacent_halfedges() {
        let mut mesh = grid();
        let h = mesh.find_halfedge(v(0), v(1)).unwrap();
        let n = mesh.next(h);
        assert!(mesh.split_face(h, n).is_none());
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_add_face_closes_border_gap() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();

        let f = mesh.add_face([v(0), v(2), v(3)]).unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(mesh.face_side_count(f), 3);
        let diagonal = mesh.find_halfedge(v(0), v(2)).unwrap();
        assert!(!mesh.is_border_edge(diagonal));
    }

    #[test]
    fn test_add_face_rejects_complex_edge() {
        let mut mesh = grid();
        // 0 -> 1 already carries a face.
        assert!(mesh.add_face([v(0), v(1), v(2)]).is_none());
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_add_face_new_vertex_on_border() {
        let mut mesh = grid();
        let p = mesh.add_vertex(Point3::new(1.0, -1.0, 0.0));
        mesh.add_face([v(1), v(0), p]).unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_faces(), 9);
        assert!(mesh.is_border_vertex(p));
        assert_eq!(mesh.valence(p), 2);
    }
}
