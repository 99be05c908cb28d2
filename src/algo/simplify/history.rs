//! Collapse history and statistics.
//!
//! [`HistoryRecorder`] listens to the collapse engine, counts what happens to
//! every candidate edge and appends one [`CollapseRecord`] per collapse. The
//! records carry everything needed to undo the collapse with a vertex split.

use nalgebra::Point3;

use super::engine::{CollapseEvent, CollapseListener};
use crate::algo::vsplit::VertexSplit;
use crate::mesh::{to_soup, MeshIndex};
use crate::soup::PolygonSoup;

/// One edge collapse, in the vertex id space of the simplified mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseRecord {
    /// The surviving vertex.
    pub v_s: usize,
    /// The removed vertex.
    pub v_t: usize,
    /// Position of `v_s` before the collapse.
    pub v_s_p: Point3<f64>,
    /// Position of `v_t` before the collapse.
    pub v_t_p: Point3<f64>,
    /// Position of `v_s` after the collapse.
    pub v_placement: Point3<f64>,
    /// Apex of the face left of the half-edge `v_t -> v_s`.
    pub v_l: Option<usize>,
    /// Apex of the face right of the half-edge `v_t -> v_s`.
    pub v_r: Option<usize>,
    /// Position of `v_l`.
    pub v_l_p: Option<Point3<f64>>,
    /// Position of `v_r`.
    pub v_r_p: Option<Point3<f64>>,
    /// Reserved. Always `0.0`.
    pub cost: f64,
    /// The whole mesh right after this collapse, when full recording is on.
    pub collapsed_mesh: Option<PolygonSoup>,
}

impl CollapseRecord {
    /// The vertex split that undoes this collapse, positionally.
    ///
    /// The split always targets the vertex sitting at `v_placement`. When that
    /// is the removed vertex's old position, the roles of the two endpoints
    /// are exchanged: the survivor stands in for `v_t`, the apexes swap sides
    /// and the new vertex goes to `v_s_p`.
    pub fn to_vertex_split(&self) -> VertexSplit {
        if self.v_placement == self.v_t_p {
            VertexSplit {
                v_s: self.v_s,
                v_l: self.v_r,
                v_r: self.v_l,
                position: self.v_s_p,
            }
        } else {
            VertexSplit {
                v_s: self.v_s,
                v_l: self.v_l,
                v_r: self.v_r,
                position: self.v_t_p,
            }
        }
    }
}

/// Outcome of a simplification run.
#[derive(Debug, Clone, Default)]
pub struct SimplificationStats {
    /// The input after cleaning and orientation. Record ids index its rows.
    pub cleaned_mesh: PolygonSoup,
    /// Whether the cleaned input was a valid surface. Nothing else is filled
    /// in when it was not.
    pub is_valid: bool,
    /// Edges that entered the queue.
    pub collected: usize,
    /// Edges popped from the queue.
    pub processed: usize,
    /// Edges collapsed.
    pub collapsed: usize,
    /// Edges rejected by the topological check.
    pub non_collapsable: usize,
    /// Popped edges whose cost could not be computed.
    pub cost_uncomputable: usize,
    /// Collapses done without a placement (survivor left in place).
    pub placement_uncomputable: usize,
    /// Edges marked sharp.
    pub num_sharp_edges: usize,
    /// One record per collapse, in order.
    pub collapse_sequence: Vec<CollapseRecord>,
}

impl SimplificationStats {
    /// Stats for input that could not be simplified.
    pub fn invalid(cleaned_mesh: PolygonSoup) -> Self {
        Self {
            cleaned_mesh,
            is_valid: false,
            ..Self::default()
        }
    }
}

/// Builds [`SimplificationStats`] from engine events.
#[derive(Debug, Default)]
pub struct HistoryRecorder {
    stats: SimplificationStats,
    record_full_info: bool,
}

impl HistoryRecorder {
    /// Start recording into `stats`. With `record_full_info`, each record also
    /// gets a snapshot of the mesh after its collapse.
    pub fn new(stats: SimplificationStats, record_full_info: bool) -> Self {
        Self {
            stats,
            record_full_info,
        }
    }

    /// The statistics gathered so far.
    pub fn stats(&self) -> &SimplificationStats {
        &self.stats
    }

    /// Finish recording.
    pub fn into_stats(self) -> SimplificationStats {
        self.stats
    }
}

impl<I: MeshIndex> CollapseListener<I> for HistoryRecorder {
    fn on_event(&mut self, event: CollapseEvent<'_, I>) {
        match event {
            CollapseEvent::Collected { .. } => self.stats.collected += 1,
            CollapseEvent::Selected { cost, .. } => {
                self.stats.processed += 1;
                if cost.is_none() {
                    self.stats.cost_uncomputable += 1;
                }
            }
            CollapseEvent::NonCollapsable { .. } => self.stats.non_collapsable += 1,
            CollapseEvent::Collapsing { profile, placement } => {
                if placement.is_none() {
                    self.stats.placement_uncomputable += 1;
                }
                self.stats.collapse_sequence.push(CollapseRecord {
                    v_s: profile.survivor.index(),
                    v_t: profile.removed.index(),
                    v_s_p: profile.survivor_position,
                    v_t_p: profile.removed_position,
                    v_placement: placement.unwrap_or(profile.survivor_position),
                    v_l: profile.left.map(|(v, _)| v.index()),
                    v_r: profile.right.map(|(v, _)| v.index()),
                    v_l_p: profile.left.map(|(_, p)| p),
                    v_r_p: profile.right.map(|(_, p)| p),
                    cost: 0.0,
                    collapsed_mesh: None,
                });
            }
            CollapseEvent::Collapsed { mesh, .. } => {
                self.stats.collapsed += 1;
                if !self.record_full_info {
                    return;
                }
                match to_soup(mesh) {
                    Ok(soup) => {
                        if let Some(record) = self.stats.collapse_sequence.last_mut() {
                            record.collapsed_mesh = Some(soup);
                        }
                    }
                    Err(err) => log::warn!("could not snapshot mesh after collapse: {}", err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::simplify::engine::CollapseProfile;
    use crate::mesh::{build_from_triangles, EdgeId, HalfEdgeMesh, VertexId};

    fn quad() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    fn record(v_placement: Point3<f64>) -> CollapseRecord {
        CollapseRecord {
            v_s: 1,
            v_t: 0,
            v_s_p: Point3::new(1.0, 0.0, 0.0),
            v_t_p: Point3::new(0.0, 0.0, 0.0),
            v_placement,
            v_l: Some(3),
            v_r: Some(2),
            v_l_p: None,
            v_r_p: None,
            cost: 0.0,
            collapsed_mesh: None,
        }
    }

    #[test]
    fn test_counts_follow_events() {
        let mesh = quad();
        let mut recorder = HistoryRecorder::default();
        let e: EdgeId = EdgeId::new(0);

        recorder.on_event(CollapseEvent::Collected { edge: e, cost: Some(1.0) });
        recorder.on_event(CollapseEvent::Collected { edge: e, cost: None });
        recorder.on_event(CollapseEvent::Selected { edge: e, cost: None });
        recorder.on_event(CollapseEvent::Selected { edge: e, cost: Some(1.0) });

        let h = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        let profile = CollapseProfile::new(&mesh, h);
        recorder.on_event(CollapseEvent::NonCollapsable { profile: &profile });

        let stats = recorder.stats();
        assert_eq!(stats.collected, 2);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.cost_uncomputable, 1);
        assert_eq!(stats.non_collapsable, 1);
        assert!(stats.collapse_sequence.is_empty());
    }

    #[test]
    fn test_absent_placement_defaults_to_survivor() {
        let mesh = quad();
        let h = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        let profile = CollapseProfile::new(&mesh, h);
        let mut recorder = HistoryRecorder::new(SimplificationStats::default(), true);

        recorder.on_event(CollapseEvent::Collapsing { profile: &profile, placement: None });
        recorder.on_event(CollapseEvent::Collapsed {
            profile: &profile,
            survivor: profile.survivor,
            mesh: &mesh,
        });

        let stats = recorder.into_stats();
        assert_eq!(stats.collapsed, 1);
        assert_eq!(stats.placement_uncomputable, 1);
        let rec = &stats.collapse_sequence[0];
        assert_eq!((rec.v_s, rec.v_t), (1, 0));
        assert_eq!(rec.v_placement, rec.v_s_p);
        // 0 -> 1 lies in face [0, 1, 2]; its twin is on the border.
        assert_eq!(rec.v_l, Some(2));
        assert_eq!(rec.v_r, None);
        assert_eq!(rec.v_l_p, Some(Point3::new(1.0, 1.0, 0.0)));
        assert_eq!(rec.cost, 0.0);
        assert_eq!(rec.collapsed_mesh.as_ref().map(|s| s.num_faces()), Some(2));
    }

    #[test]
    fn test_to_vertex_split_keeps_roles() {
        let split = record(Point3::new(0.5, 0.0, 0.0)).to_vertex_split();
        assert_eq!(split.v_s, 1);
        assert_eq!((split.v_l, split.v_r), (Some(3), Some(2)));
        assert_eq!(split.position, Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_to_vertex_split_swaps_when_placed_on_removed() {
        let split = record(Point3::new(0.0, 0.0, 0.0)).to_vertex_split();
        assert_eq!(split.v_s, 1);
        assert_eq!((split.v_l, split.v_r), (Some(2), Some(3)));
        assert_eq!(split.position, Point3::new(1.0, 0.0, 0.0));
    }
}
