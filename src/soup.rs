//! Indexed triangle soups.
//!
//! A [`PolygonSoup`] is the boundary format of the crate: points plus
//! triangles given as rows of point indices. Nothing about connectivity is
//! assumed until the soup is turned into a [`HalfEdgeMesh`](crate::mesh::HalfEdgeMesh).

use nalgebra::Point3;

/// An indexed triangle soup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonSoup {
    /// Point positions.
    pub vertices: Vec<Point3<f64>>,
    /// Triangles as rows of indices into `vertices`.
    pub faces: Vec<[usize; 3]>,
}

impl PolygonSoup {
    /// Create a soup from points and triangle rows.
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Number of points.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if the soup has no triangles.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl From<(Vec<Point3<f64>>, Vec<[usize; 3]>)> for PolygonSoup {
    fn from((vertices, faces): (Vec<Point3<f64>>, Vec<[usize; 3]>)) -> Self {
        Self::new(vertices, faces)
    }
}
