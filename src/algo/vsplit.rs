//! Vertex split, the inverse of an edge collapse.
//!
//! A collapse of the half-edge `v_t -> v_s` removes `v_t` and the faces
//! `(v_t, v_s, v_l)` and `(v_s, v_t, v_r)`, where either apex may be missing
//! on a border. [`split`] rebuilds that configuration from `v_s`, the apexes
//! and the position of `v_t`. The border cases where one of the faces is
//! missing are handled by walking to the border around `v_s`.
//!
//! # Example
//!
//! ```
//! use progmesh::algo::vsplit::vertex_split;
//! use progmesh::soup::PolygonSoup;
//! use nalgebra::Point3;
//!
//! let soup = PolygonSoup::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//!
//! // Undo the collapse of (1, 0) into 0, which had a face on one side only.
//! let refined = vertex_split(&soup, 0, Some(1), None, Point3::new(1.0, 0.0, 0.0)).unwrap();
//! assert_eq!(refined.num_vertices(), 4);
//! assert_eq!(refined.num_faces(), 2);
//! ```

use std::collections::HashMap;

use nalgebra::Point3;

use crate::algo::simplify::CollapseRecord;
use crate::mesh::{build_from_soup, to_soup, BuildMode, HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId};
use crate::repair::oriented;
use crate::soup::PolygonSoup;

/// The two vertices produced by a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitVertices<I: MeshIndex = u32> {
    /// The vertex at the requested position, standing in for the vertex the
    /// collapse removed.
    pub restored: VertexId<I>,
    /// The vertex standing in for the collapse survivor.
    pub kept: VertexId<I>,
}

/// Arguments of a vertex split in soup row space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexSplit {
    /// The vertex to split.
    pub v_s: usize,
    /// Left apex.
    pub v_l: Option<usize>,
    /// Right apex.
    pub v_r: Option<usize>,
    /// Position of the vertex brought back.
    pub position: Point3<f64>,
}

impl VertexSplit {
    /// Apply the split to a mesh whose vertex ids match the stored rows.
    pub fn apply<I: MeshIndex>(&self, mesh: &mut HalfEdgeMesh<I>) -> Option<SplitVertices<I>> {
        let id = |row: usize| (row < mesh.vertex_capacity()).then(|| VertexId::new(row));
        let v_s = id(self.v_s)?;
        let v_l = match self.v_l {
            Some(row) => Some(id(row)?),
            None => None,
        };
        let v_r = match self.v_r {
            Some(row) => Some(id(row)?),
            None => None,
        };
        split(mesh, v_s, v_l, v_r, self.position)
    }

    /// Apply the split to a soup.
    pub fn apply_to_soup(&self, soup: &PolygonSoup) -> Option<PolygonSoup> {
        vertex_split(soup, self.v_s, self.v_l, self.v_r, self.position)
    }
}

/// Split `v_s` and bring back a vertex at `position`, recreating the faces
/// towards `v_l` and `v_r`.
///
/// Returns `None` if two of the given vertices coincide, a vertex is not in
/// the mesh, neither apex is given, or the configuration around `v_s` does
/// not match a collapsed edge. A split that fails after it started editing
/// leaves the mesh partially modified; work on a copy if that matters.
pub fn split<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    v_s: VertexId<I>,
    v_l: Option<VertexId<I>>,
    v_r: Option<VertexId<I>>,
    position: Point3<f64>,
) -> Option<SplitVertices<I>> {
    if v_l == Some(v_s) || v_r == Some(v_s) || (v_l.is_some() && v_l == v_r) {
        return None;
    }
    if [Some(v_s), v_l, v_r].into_iter().flatten().any(|v| !mesh.contains_vertex(v)) {
        return None;
    }

    match (v_l, v_r) {
        (Some(v_l), Some(v_r)) => split_interior(mesh, v_s, v_l, v_r, position),
        (Some(v_l), None) => split_left(mesh, v_s, v_l, position),
        (None, Some(v_r)) => split_right(mesh, v_s, v_r, position),
        (None, None) => None,
    }
}

fn split_interior<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    v_s: VertexId<I>,
    v_l: VertexId<I>,
    v_r: VertexId<I>,
    position: Point3<f64>,
) -> Option<SplitVertices<I>> {
    let h1 = mesh.find_halfedge(v_r, v_s)?;
    let h2 = mesh.find_halfedge(v_l, v_s)?;
    let hnew = mesh.split_vertex(h1, h2)?;
    let hnew_opp = mesh.twin(hnew);
    let v_t = mesh.source(hnew);
    mesh.set_position(v_t, position);

    if mesh.is_border(hnew) {
        mesh.add_face([v_t, v_s, v_l])?;
    } else {
        let h = mesh.find_halfedge(v_l, v_t)?;
        let h = mesh.prev(h);
        mesh.split_face(hnew, h)?;
    }

    if mesh.is_border(hnew_opp) {
        mesh.add_face([v_s, v_t, v_r])?;
    } else {
        let h = mesh.find_halfedge(v_r, v_s)?;
        let h = mesh.prev(h);
        mesh.split_face(hnew_opp, h)?;
    }

    Some(SplitVertices {
        restored: v_t,
        kept: v_s,
    })
}

/// Only the face `(v_t, v_s, v_l)` is rebuilt.
fn split_left<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    v_s: VertexId<I>,
    v_l: VertexId<I>,
    position: Point3<f64>,
) -> Option<SplitVertices<I>> {
    let h2 = mesh.find_halfedge(v_l, v_s)?;
    let h1 = border_into(mesh, h2)?;

    if h1 == h2 {
        // v_s took over every neighbour of v_t; v_t returns as a new vertex
        // hanging off the border edge.
        let kept = move_and_duplicate(mesh, v_s, position);
        mesh.add_face([v_l, v_s, kept])?;
        return Some(SplitVertices { restored: v_s, kept });
    }

    let hnew = mesh.split_vertex(h1, h2)?;
    let v_t = mesh.source(hnew);
    mesh.set_position(v_t, position);
    let h = mesh.find_halfedge(v_l, v_t)?;
    let h = mesh.prev(h);
    mesh.split_face(hnew, h)?;

    Some(SplitVertices {
        restored: v_t,
        kept: v_s,
    })
}

/// Only the face `(v_s, v_t, v_r)` is rebuilt.
fn split_right<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    v_s: VertexId<I>,
    v_r: VertexId<I>,
    position: Point3<f64>,
) -> Option<SplitVertices<I>> {
    let h2 = mesh.find_halfedge(v_r, v_s)?;
    let out = mesh.twin(h2);

    if mesh.is_border(out) {
        let kept = move_and_duplicate(mesh, v_s, position);
        mesh.add_face([v_s, v_r, kept])?;
        return Some(SplitVertices { restored: v_s, kept });
    }

    let h1 = mesh.prev(out);
    let h2 = border_into(mesh, h2)?;
    let hnew = mesh.split_vertex(h1, h2)?;
    let hnew_opp = mesh.twin(hnew);
    let v_t = mesh.source(hnew);
    mesh.set_position(v_t, position);

    let a = mesh.find_halfedge(v_t, v_r)?;
    let b = mesh.prev(hnew_opp);
    mesh.split_face(a, b)?;

    Some(SplitVertices {
        restored: v_t,
        kept: v_s,
    })
}

/// Turns clockwise around `target(h)` from `h` to the first border
/// half-edge. `None` if the vertex is not on the border.
fn border_into<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, h: HalfEdgeId<I>) -> Option<HalfEdgeId<I>> {
    let mut x = h;
    while !mesh.is_border(x) {
        x = mesh.next_around_target(x);
        if x == h {
            return None;
        }
    }
    Some(x)
}

/// Moves `v` to `position` and adds a vertex where `v` used to be.
fn move_and_duplicate<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, v: VertexId<I>, position: Point3<f64>) -> VertexId<I> {
    let old = *mesh.position(v);
    mesh.set_position(v, position);
    mesh.add_vertex(old)
}

/// Split a vertex of a soup.
///
/// The soup is oriented and built strictly, without cleaning, so rows are
/// vertex ids. Existing rows keep their index; the new vertex is appended.
/// Returns `None` whenever [`split`] would, and for soups that are not
/// orientable 2-manifolds.
pub fn vertex_split(
    soup: &PolygonSoup,
    v_s: usize,
    v_l: Option<usize>,
    v_r: Option<usize>,
    position: Point3<f64>,
) -> Option<PolygonSoup> {
    let n = soup.num_vertices();
    if [Some(v_s), v_l, v_r].into_iter().flatten().any(|v| v >= n) {
        return None;
    }

    let mut mesh: HalfEdgeMesh = match oriented(soup).and_then(|s| build_from_soup(&s, BuildMode::Strict)) {
        Ok(mesh) => mesh,
        Err(err) => {
            log::debug!("vertex split: {}", err);
            return None;
        }
    };
    if !mesh.is_valid() {
        return None;
    }

    split(
        &mut mesh,
        VertexId::new(v_s),
        v_l.map(VertexId::new),
        v_r.map(VertexId::new),
        position,
    )?;
    to_soup(&mesh).ok()
}

/// Undo a sequence of collapses recorded on `mesh`, last collapse first.
///
/// The mesh must be the one the records were produced on. Every vertex gets
/// back its exact pre-collapse position. Returns `None` as soon as one split
/// fails.
pub fn replay_reverse<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, records: &[CollapseRecord]) -> Option<()> {
    let mut current: HashMap<usize, VertexId<I>> = HashMap::new();
    let lookup = |current: &HashMap<usize, VertexId<I>>, id: usize| {
        current.get(&id).copied().unwrap_or_else(|| VertexId::new(id))
    };

    for (step, record) in records.iter().enumerate().rev() {
        let v_s = lookup(&current, record.v_s);
        let v_l = record.v_l.map(|v| lookup(&current, v));
        let v_r = record.v_r.map(|v| lookup(&current, v));
        if !mesh.contains_vertex(v_s) {
            return None;
        }

        mesh.set_position(v_s, record.v_s_p);
        let Some(out) = split(mesh, v_s, v_l, v_r, record.v_t_p) else {
            log::debug!("replay: split of collapse {} failed", step);
            return None;
        };
        current.insert(record.v_t, out.restored);
        current.insert(record.v_s, out.kept);
    }
    Some(())
}
