//! Mesh processing algorithms.
//!
//! - **Simplification**: greedy quadric edge collapse with a recorded history
//! - **Vertex split**: the inverse operation, used to replay a history backwards

pub mod progress;
pub mod simplify;
pub mod vsplit;
