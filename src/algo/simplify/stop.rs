//! Stop condition for edge collapse.

/// Halts simplification once both the vertex and the face count reach their
/// targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPredicate {
    target_vertices: usize,
    target_faces: usize,
}

impl StopPredicate {
    /// Create a predicate from the two targets.
    pub fn new(target_vertices: usize, target_faces: usize) -> Self {
        Self {
            target_vertices,
            target_faces,
        }
    }

    /// The vertex target.
    pub fn target_vertices(&self) -> usize {
        self.target_vertices
    }

    /// The face target.
    pub fn target_faces(&self) -> usize {
        self.target_faces
    }

    /// Returns `true` if both counts are at or below their targets.
    #[inline]
    pub fn should_stop(&self, num_vertices: usize, num_faces: usize) -> bool {
        num_vertices <= self.target_vertices && num_faces <= self.target_faces
    }
}
