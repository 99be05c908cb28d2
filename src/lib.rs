//! # Progmesh
//!
//! Progressive mesh construction for triangle surfaces.
//!
//! Progmesh simplifies a triangle mesh by greedy edge collapse, ordered by
//! Garland-Heckbert quadric error, and records every collapse so that it can
//! be undone exactly with a vertex split. Played backwards, the record turns
//! the coarse mesh back into the input one detail at a time.
//!
//! ## Features
//!
//! - **Half-edge data structure**: O(1) adjacency queries with type-safe indices
//! - **Euler operators**: edge collapse, vertex split, face split, face insertion
//! - **Soup repair**: point merging, degenerate face removal, orientation
//! - **Quadric simplification**: solved or endpoint-restricted placement,
//!   bounded normal change, frozen sharp edges
//!
//! ## Quick Start
//!
//! ```
//! use progmesh::prelude::*;
//! use nalgebra::Point3;
//!
//! let soup = PolygonSoup::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! );
//!
//! let stats = edge_collapse_with_record(&soup, &SimplifyOptions::new(3, 1));
//! assert_eq!(stats.collapse_sequence.len(), 1);
//!
//! // Record ids are rows of the cleaned input.
//! let record = &stats.collapse_sequence[0];
//! println!("collapsed {} into {}", record.v_t, record.v_s);
//! ```
//!
//! ## Building Meshes Programmatically
//!
//! ```
//! use progmesh::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1],  // bottom
//!     [0, 1, 3],  // front
//!     [1, 2, 3],  // right
//!     [2, 0, 3],  // left
//! ];
//!
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 4);
//! assert_eq!(mesh.num_faces(), 4);
//!
//! for neighbor in mesh.vertex_neighbors(VertexId::new(0)) {
//!     println!("Neighbor: {:?}", neighbor);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
pub mod repair;
pub mod soup;

/// Prelude module for convenient imports.
///
/// ```
/// use progmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::simplify::{
        edge_collapse_with_record, simplify_mesh, CollapseRecord, PlacementKind, SimplificationStats,
        SimplifyOptions,
    };
    pub use crate::algo::vsplit::{replay_reverse, vertex_split, SplitVertices, VertexSplit};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_soup, build_from_triangles, to_face_vertex, to_soup, BuildMode, EdgeId, Face, FaceId,
        HalfEdge, HalfEdgeId, HalfEdgeMesh, MeshIndex, Vertex, VertexId,
    };
    pub use crate::soup::PolygonSoup;
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        // Closed: every half-edge has a face.
        assert_eq!(mesh.num_halfedges(), 12);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(!mesh.is_border_vertex(v), "vertex {:?} should not be on the border", v);
        }
    }
}
