//! Mesh construction utilities.
//!
//! This module builds half-edge meshes from indexed triangle soups and
//! exports them back. Two build modes are offered:
//!
//! - [`BuildMode::Strict`] rejects any soup that is not an oriented
//!   2-manifold (with or without border).
//! - [`BuildMode::BestEffort`] skips faces that would break manifoldness and
//!   duplicates vertices that join several separate fans.
//!
//! Soup rows map one-to-one onto vertex ids: row `i` becomes `VertexId(i)`.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;

use super::halfedge::HalfEdgeMesh;
use super::index::{HalfEdgeId, MeshIndex, VertexId};
use crate::error::{MeshError, Result};
use crate::soup::PolygonSoup;

/// How strictly a soup is validated while building a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Fail on non-manifold edges, non-manifold vertices and degenerate rows.
    #[default]
    Strict,
    /// Skip offending faces and split non-manifold vertices.
    BestEffort,
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// The build is strict; see [`build_from_soup`] for the best-effort mode.
///
/// # Example
/// ```
/// use progmesh::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    build(vertices, faces, BuildMode::Strict)
}

/// Build a half-edge mesh from a [`PolygonSoup`].
pub fn build_from_soup<I: MeshIndex>(soup: &PolygonSoup, mode: BuildMode) -> Result<HalfEdgeMesh<I>> {
    build(&soup.vertices, &soup.faces, mode)
}

fn build<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
    mode: BuildMode,
) -> Result<HalfEdgeMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    let vertex_ids: Vec<VertexId<I>> = vertices.iter().map(|&pos| mesh.add_vertex(pos)).collect();

    // Directed edge (a, b) -> face half-edge a -> b
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId<I>> = HashMap::with_capacity(faces.len() * 3);
    let mut skipped = 0usize;

    for (fi, face) in faces.iter().enumerate() {
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            match mode {
                BuildMode::Strict => return Err(MeshError::DegenerateFace { face: fi }),
                BuildMode::BestEffort => {
                    log::warn!("skipping degenerate face {}", fi);
                    skipped += 1;
                    continue;
                }
            }
        }

        let corners = [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])];
        if let Some(&(a, b)) = corners.iter().find(|e| edge_map.contains_key(e)) {
            match mode {
                BuildMode::Strict => return Err(MeshError::NonManifoldEdge { v0: a, v1: b }),
                BuildMode::BestEffort => {
                    log::warn!("skipping face {}: directed edge ({}, {}) is already used", fi, a, b);
                    skipped += 1;
                    continue;
                }
            }
        }

        let mut hes = [HalfEdgeId::<I>::invalid(); 3];
        for (k, &(a, b)) in corners.iter().enumerate() {
            hes[k] = match edge_map.get(&(b, a)) {
                Some(&opposite) => mesh.twin(opposite),
                None => mesh.new_edge(vertex_ids[a], vertex_ids[b]),
            };
            edge_map.insert((a, b), hes[k]);
        }

        let f = mesh.new_face(hes[0]);
        for k in 0..3 {
            mesh.set_next(hes[k], hes[(k + 1) % 3]);
            mesh.halfedge_mut(hes[k]).face = f;
            mesh.vertex_mut(vertex_ids[face[k]]).halfedge = hes[k];
        }
    }

    if mesh.num_faces() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    if skipped > 0 {
        log::debug!("built mesh with {} of {} faces", mesh.num_faces(), faces.len());
    }

    link_border_loops(&mut mesh);
    split_vertex_fans(&mut mesh, mode)?;

    for v in mesh.vertex_ids().collect::<Vec<_>>() {
        mesh.adjust_outgoing_halfedge(v);
    }

    Ok(mesh)
}

/// Link border half-edges into loops.
///
/// For a border half-edge `bx` ending at `a`, the next border half-edge is
/// found by turning counter-clockwise around `a` from `twin(bx)` until a
/// border half-edge leaves `a`. This stays inside one fan, so vertices with
/// several fans get one border loop per fan.
fn link_border_loops<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    let border: Vec<HalfEdgeId<I>> = mesh.halfedge_ids().filter(|&h| mesh.is_border(h)).collect();

    for bx in border {
        let mut h = mesh.twin(bx);
        loop {
            h = mesh.twin(mesh.prev(h));
            if mesh.is_border(h) {
                break;
            }
        }
        mesh.set_next(bx, h);
    }
}

/// Detect vertices whose outgoing half-edges form more than one fan.
///
/// Strict mode reports them; best-effort mode gives every extra fan its own
/// copy of the vertex.
fn split_vertex_fans<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, mode: BuildMode) -> Result<()> {
    let mut outgoing: Vec<Vec<HalfEdgeId<I>>> = vec![Vec::new(); mesh.vertex_capacity()];
    for h in mesh.halfedge_ids() {
        outgoing[mesh.source(h).index()].push(h);
    }

    for v in mesh.vertex_ids().collect::<Vec<_>>() {
        let all = &outgoing[v.index()];
        if all.is_empty() || mesh.valence(v) == all.len() {
            continue;
        }

        if mode == BuildMode::Strict {
            return Err(MeshError::NonManifold {
                details: format!("vertex {} joins more than one fan", v.index()),
            });
        }
        log::warn!("duplicating non-manifold vertex {}", v.index());

        let mut seen: HashSet<HalfEdgeId<I>> = mesh.vertex_halfedges(v).collect();
        let position = *mesh.position(v);
        for &start in all {
            if seen.contains(&start) {
                continue;
            }

            let vnew = mesh.add_vertex(position);
            let mut h = start;
            loop {
                seen.insert(h);
                let incoming = mesh.twin(h);
                mesh.halfedge_mut(incoming).vertex = vnew;
                h = mesh.next(incoming);
                if h == start {
                    break;
                }
            }
            mesh.vertex_mut(vnew).halfedge = start;
        }
    }

    Ok(())
}

/// Convert a half-edge mesh back to a face-vertex representation.
///
/// Live vertices are renumbered densely in increasing id order; faces are
/// emitted in increasing id order, each starting at the source of its stored
/// half-edge. Fails if a face loop is not a triangle.
pub fn to_face_vertex<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
) -> Result<(Vec<Point3<f64>>, Vec<[usize; 3]>)> {
    let mut row = vec![usize::MAX; mesh.vertex_capacity()];
    let mut vertices = Vec::with_capacity(mesh.num_vertices());
    for v in mesh.vertex_ids() {
        row[v.index()] = vertices.len();
        vertices.push(*mesh.position(v));
    }

    let mut faces = Vec::with_capacity(mesh.num_faces());
    for (fi, f) in mesh.face_ids().enumerate() {
        let sides = mesh.face_side_count(f);
        if sides != 3 {
            return Err(MeshError::NonTriangularFace { face: fi, sides });
        }
        let [a, b, c] = mesh.face_triangle(f);
        faces.push([row[a.index()], row[b.index()], row[c.index()]]);
    }

    Ok((vertices, faces))
}

/// Export a half-edge mesh as a [`PolygonSoup`]. See [`to_face_vertex`].
pub fn to_soup<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Result<PolygonSoup> {
    let (vertices, faces) = to_face_vertex(mesh)?;
    Ok(PolygonSoup::new(vertices, faces))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2]];
        (vertices, faces)
    }

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        // Two triangles sharing edge 0-1
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    fn bowtie() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        // Two triangles touching only at vertex 0
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(-1.0, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 3, 4]];
        (vertices, faces)
    }

    #[test]
    fn test_export_rejects_quad_face() {
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
        let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        // A vertex split without the matching face splits leaves two quads.
        let h1 = mesh.find_halfedge(VertexId::new(2), VertexId::new(4)).unwrap();
        let h2 = mesh.find_halfedge(VertexId::new(3), VertexId::new(4)).unwrap();
        mesh.split_vertex(h1, h2).unwrap();

        assert!(matches!(
            to_soup(&mesh),
            Err(MeshError::NonTriangularFace { sides: 4, .. })
        ));
    }

    #[test]
    fn test_single_triangle() {
        let (vertices, faces) = single_triangle();
        let mesh: HalfEdgeMesh<u32> = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        // 3 face half-edges + 3 border half-edges
        assert_eq!(mesh.num_halfedges(), 6);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(mesh.is_border_vertex(v));
            assert_eq!(mesh.valence(v), 2);
        }
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let mesh: HalfEdgeMesh<u32> = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_edges(), 5);
        assert!(mesh.is_valid());

        let shared = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert!(!mesh.is_border_edge(shared));
    }

    #[test]
    fn test_roundtrip_keeps_rows() {
        let (vertices, faces) = two_triangles();
        let mesh: HalfEdgeMesh<u32> = build_from_triangles(&vertices, &faces).unwrap();

        let (out_verts, out_faces) = to_face_vertex(&mesh).unwrap();
        assert_eq!(out_verts, vertices);
        assert_eq!(out_faces, faces);
    }

    #[test]
    fn test_invalid_vertex_index() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let faces = vec![[0, 1, 2]];

        let result: Result<HalfEdgeMesh<u32>> = build_from_triangles(&vertices, &faces);
        assert_eq!(result.unwrap_err(), MeshError::InvalidVertexIndex { face: 0, vertex: 1 });
    }

    #[test]
    fn test_degenerate_face() {
        let (vertices, _) = single_triangle();
        let faces = vec![[0, 0, 2]];

        let result: Result<HalfEdgeMesh<u32>> = build_from_triangles(&vertices, &faces);
        assert_eq!(result.unwrap_err(), MeshError::DegenerateFace { face: 0 });

        // Nothing left to build in best-effort mode either.
        let soup = PolygonSoup::new(vertices, faces);
        let result: Result<HalfEdgeMesh<u32>> = build_from_soup(&soup, BuildMode::BestEffort);
        assert_eq!(result.unwrap_err(), MeshError::EmptyMesh);
    }

    #[test]
    fn test_non_manifold_edge() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [0, 1, 3]];

        let result: Result<HalfEdgeMesh<u32>> = build_from_triangles(&vertices, &faces);
        assert_eq!(result.unwrap_err(), MeshError::NonManifoldEdge { v0: 0, v1: 1 });

        let soup = PolygonSoup::new(vertices, faces);
        let mesh: HalfEdgeMesh<u32> = build_from_soup(&soup, BuildMode::BestEffort).unwrap();
        assert_eq!(mesh.num_faces(), 1);
        assert!(mesh.is_isolated(VertexId::new(3)));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_bowtie_vertex() {
        let (vertices, faces) = bowtie();

        let result: Result<HalfEdgeMesh<u32>> = build_from_triangles(&vertices, &faces);
        assert!(matches!(result, Err(MeshError::NonManifold { .. })));

        let soup = PolygonSoup::new(vertices, faces);
        let mesh: HalfEdgeMesh<u32> = build_from_soup(&soup, BuildMode::BestEffort).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_faces(), 2);
        assert!(mesh.is_valid());
        assert_eq!(mesh.valence(VertexId::new(0)), 2);
        assert_eq!(mesh.valence(VertexId::new(5)), 2);
        assert_eq!(mesh.position(VertexId::new(5)), mesh.position(VertexId::new(0)));
    }

    #[test]
    fn test_export_renumbers_after_collapse() {
        let (vertices, faces) = two_triangles();
        let mut mesh: HalfEdgeMesh<u32> = build_from_triangles(&vertices, &faces).unwrap();

        // Border edge 1 -> 2, removes vertex 1.
        let h = mesh.find_halfedge(VertexId::new(1), VertexId::new(2)).unwrap();
        assert!(mesh.is_collapse_ok(h));
        mesh.collapse(h);

        let soup = to_soup(&mesh).unwrap();
        assert_eq!(soup.num_vertices(), 3);
        assert_eq!(soup.num_faces(), 1);
        assert_eq!(soup.vertices[1], vertices[2]);
        assert!(soup.faces[0].iter().all(|&i| i < 3));
    }

    #[test]
    fn test_empty_mesh() {
        let result: Result<HalfEdgeMesh<u32>> = build_from_triangles(&[], &[]);
        assert_eq!(result.unwrap_err(), MeshError::EmptyMesh);
    }
}
