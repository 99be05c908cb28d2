//! Edge-collapse simplification with a recorded history.
//!
//! Edges are collapsed greedily in order of Garland-Heckbert quadric error.
//! Every collapse is recorded as a [`CollapseRecord`], which holds what a
//! vertex split needs to undo it (see [`crate::algo::vsplit`]).
//!
//! # Pipeline
//!
//! 1. The input soup is cleaned and oriented ([`crate::repair`]).
//! 2. A half-edge mesh is built from it; its exported soup becomes
//!    [`SimplificationStats::cleaned_mesh`], and record ids index its rows.
//! 3. Sharp edges are detected and frozen if a threshold is set.
//! 4. The collapse engine runs until both the vertex and the face target
//!    are met, or no edge can be collapsed.
//!
//! # Example
//!
//! ```
//! use progmesh::algo::simplify::{edge_collapse_with_record, SimplifyOptions};
//! use progmesh::soup::PolygonSoup;
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
//! assert!(stats.is_valid);
//! assert_eq!(stats.collapsed, 1);
//! ```
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.

mod engine;
mod history;
mod placement;
mod quadric;
mod sharp;
mod stop;

pub use engine::{CollapseEngine, CollapseEvent, CollapseListener, CollapseProfile};
pub use history::{CollapseRecord, HistoryRecorder, SimplificationStats};
pub use placement::{PlacementKind, PlacementPolicy};
pub use quadric::{Quadric, QuadricAccumulator};
pub use sharp::{dihedral_angle, ConstrainedEdges, SharpEdgeDetector};
pub use stop::StopPredicate;

use crate::algo::progress::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{build_from_soup, to_soup, BuildMode, HalfEdgeMesh, MeshIndex};
use crate::repair::{orient_soup, oriented, repair_soup};
use crate::soup::PolygonSoup;

/// Options for edge-collapse simplification.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifyOptions {
    /// Stop once the vertex count is at most this...
    pub target_vertices: usize,

    /// ...and the face count is at most this.
    pub target_faces: usize,

    /// How the merged vertex is placed.
    pub placement: PlacementKind,

    /// Dihedral angle (degrees) below which an edge is sharp and frozen,
    /// together with all border edges. Values `<= 0` disable detection.
    pub sharp_angle_threshold: f64,

    /// Reject input that cannot be oriented consistently instead of
    /// building what can be built.
    pub strict: bool,

    /// Store a snapshot of the mesh after every collapse.
    pub record_full_info: bool,

    /// Maximum angle (degrees) a surviving face normal may turn during a
    /// collapse before the placement is rejected.
    pub max_normal_angle_degrees: f64,

    /// Multiplier for the border-edge plane quadrics.
    pub border_weight: f64,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            target_vertices: 0,
            target_faces: 0,
            placement: PlacementKind::Solved,
            sharp_angle_threshold: -1.0,
            strict: false,
            record_full_info: false,
            max_normal_angle_degrees: 90.0,
            border_weight: 100.0,
        }
    }
}

impl SimplifyOptions {
    /// Create options that simplify down to the given vertex and face targets.
    pub fn new(target_vertices: usize, target_faces: usize) -> Self {
        Self {
            target_vertices,
            target_faces,
            ..Self::default()
        }
    }

    /// Set the placement strategy.
    pub fn with_placement(mut self, placement: PlacementKind) -> Self {
        self.placement = placement;
        self
    }

    /// Set the sharp edge threshold in degrees.
    pub fn with_sharp_angle_threshold(mut self, degrees: f64) -> Self {
        self.sharp_angle_threshold = degrees;
        self
    }

    /// Set strict input handling.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set whether each record gets a mesh snapshot.
    pub fn with_record_full_info(mut self, record: bool) -> Self {
        self.record_full_info = record;
        self
    }

    /// Set the bound on face normal rotation in degrees.
    pub fn with_max_normal_angle(mut self, degrees: f64) -> Self {
        self.max_normal_angle_degrees = degrees;
        self
    }

    /// Set the border quadric multiplier.
    pub fn with_border_weight(mut self, weight: f64) -> Self {
        self.border_weight = weight;
        self
    }

    /// Check that every numeric option is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.sharp_angle_threshold.is_finite() {
            return Err(MeshError::invalid_param(
                "sharp_angle_threshold",
                self.sharp_angle_threshold,
                "must be finite",
            ));
        }
        if !(self.max_normal_angle_degrees > 0.0 && self.max_normal_angle_degrees <= 180.0) {
            return Err(MeshError::invalid_param(
                "max_normal_angle_degrees",
                self.max_normal_angle_degrees,
                "must be in (0, 180]",
            ));
        }
        if !(self.border_weight.is_finite() && self.border_weight >= 0.0) {
            return Err(MeshError::invalid_param(
                "border_weight",
                self.border_weight,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Simplify a triangle soup and record every collapse.
///
/// Never fails: input that cannot be cleaned into a valid surface, or
/// invalid options, yield stats with `is_valid == false`.
pub fn edge_collapse_with_record(soup: &PolygonSoup, options: &SimplifyOptions) -> SimplificationStats {
    edge_collapse_with_record_with_progress(soup, options, &Progress::none())
}

/// [`edge_collapse_with_record`] with progress reporting.
pub fn edge_collapse_with_record_with_progress(
    soup: &PolygonSoup,
    options: &SimplifyOptions,
    progress: &Progress,
) -> SimplificationStats {
    if let Err(err) = options.validate() {
        log::warn!("simplification skipped: {}", err);
        return SimplificationStats::invalid(soup.clone());
    }

    let (mut cleaned, report) = repair_soup(soup);
    log::debug!("repaired input soup: {:?}", report);

    let cleaned = match oriented(&cleaned) {
        Ok(soup) => soup,
        Err(err) if options.strict => {
            log::warn!("input rejected in strict mode: {}", err);
            orient_soup(&mut cleaned);
            return SimplificationStats::invalid(cleaned);
        }
        Err(err) => {
            log::debug!("{}, building best effort", err);
            orient_soup(&mut cleaned);
            cleaned
        }
    };

    let mode = if options.strict {
        BuildMode::Strict
    } else {
        BuildMode::BestEffort
    };
    let mut mesh: HalfEdgeMesh = match build_from_soup(&cleaned, mode) {
        Ok(mesh) => mesh,
        Err(err) => {
            log::warn!("could not build mesh from input soup: {}", err);
            return SimplificationStats::invalid(cleaned);
        }
    };

    simplify_mesh_with_progress(&mut mesh, options, progress)
}

/// Simplify a half-edge mesh in place and record every collapse.
///
/// Record ids are ids of `mesh`, so the records can be replayed against the
/// same mesh with [`crate::algo::vsplit::replay_reverse`].
pub fn simplify_mesh<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, options: &SimplifyOptions) -> SimplificationStats {
    simplify_mesh_with_progress(mesh, options, &Progress::none())
}

/// [`simplify_mesh`] with progress reporting.
pub fn simplify_mesh_with_progress<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    options: &SimplifyOptions,
    progress: &Progress,
) -> SimplificationStats {
    if let Err(err) = options.validate() {
        log::warn!("simplification skipped: {}", err);
        return SimplificationStats::invalid(PolygonSoup::default());
    }

    let cleaned = match to_soup(mesh) {
        Ok(soup) => soup,
        Err(err) => {
            log::warn!("could not export input mesh: {}", err);
            return SimplificationStats::invalid(PolygonSoup::default());
        }
    };
    if mesh.is_empty() || !mesh.is_valid() {
        log::warn!("input mesh is empty or has broken connectivity");
        return SimplificationStats::invalid(cleaned);
    }

    let constraints = SharpEdgeDetector::new(options.sharp_angle_threshold).detect(mesh);
    let stats = SimplificationStats {
        cleaned_mesh: cleaned,
        is_valid: true,
        num_sharp_edges: constraints.len(),
        ..SimplificationStats::default()
    };

    let mut recorder = HistoryRecorder::new(stats, options.record_full_info);
    let engine = CollapseEngine::new(
        mesh,
        PlacementPolicy::new(options.placement, options.max_normal_angle_degrees),
        constraints,
        StopPredicate::new(options.target_vertices, options.target_faces),
        options.border_weight,
    );
    engine.run(&mut recorder, progress);

    let stats = recorder.into_stats();
    log::debug!(
        "simplified to {} vertices, {} faces ({} collapsed, {} rejected)",
        mesh.num_vertices(),
        mesh.num_faces(),
        stats.collapsed,
        stats.non_collapsable
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn quad() -> PolygonSoup {
        PolygonSoup::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_options_defaults() {
        let options = SimplifyOptions::default();
        assert_eq!(options.placement, PlacementKind::Solved);
        assert_eq!(options.sharp_angle_threshold, -1.0);
        assert!(!options.strict);
        assert!(!options.record_full_info);
        assert_eq!(options.max_normal_angle_degrees, 90.0);
        assert_eq!(options.border_weight, 100.0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_builders() {
        let options = SimplifyOptions::new(10, 20)
            .with_placement(PlacementKind::EndpointRestricted)
            .with_sharp_angle_threshold(60.0)
            .with_strict(true)
            .with_record_full_info(true)
            .with_max_normal_angle(45.0)
            .with_border_weight(10.0);
        assert_eq!(options.target_vertices, 10);
        assert_eq!(options.target_faces, 20);
        assert_eq!(options.placement, PlacementKind::EndpointRestricted);
        assert!(options.strict && options.record_full_info);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        assert!(SimplifyOptions::default().with_border_weight(f64::NAN).validate().is_err());
        assert!(SimplifyOptions::default().with_max_normal_angle(0.0).validate().is_err());
        assert!(SimplifyOptions::default().with_sharp_angle_threshold(f64::INFINITY).validate().is_err());

        let stats = edge_collapse_with_record(&quad(), &SimplifyOptions::default().with_border_weight(-1.0));
        assert!(!stats.is_valid);
    }

    #[test]
    fn test_quad_collapses_once() {
        let stats = edge_collapse_with_record(&quad(), &SimplifyOptions::new(3, 1));
        assert!(stats.is_valid);
        assert_eq!(stats.collapsed, 1);
        assert_eq!(stats.collapse_sequence.len(), 1);
        assert_eq!(stats.cleaned_mesh, quad());
    }

    #[test]
    fn test_full_info_snapshots() {
        let options = SimplifyOptions::new(3, 1).with_record_full_info(true);
        let stats = edge_collapse_with_record(&quad(), &options);
        let snapshot = stats.collapse_sequence[0].collapsed_mesh.as_ref().unwrap();
        assert_eq!(snapshot.num_vertices(), 3);
        assert_eq!(snapshot.num_faces(), 1);
    }

    #[test]
    fn test_invalid_soup() {
        let stats = edge_collapse_with_record(&PolygonSoup::default(), &SimplifyOptions::default());
        assert!(!stats.is_valid);
        assert_eq!(stats.collapsed, 0);
    }

    #[test]
    fn test_simplify_mesh_in_place() {
        let mut mesh: HalfEdgeMesh = build_from_soup(&quad(), BuildMode::Strict).unwrap();
        let stats = simplify_mesh(&mut mesh, &SimplifyOptions::new(3, 1));
        assert_eq!(stats.collapsed, 1);
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        assert!(mesh.is_valid());
    }
}
