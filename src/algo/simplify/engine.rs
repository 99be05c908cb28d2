//! The edge-collapse loop.
//!
//! Edges sit in a lazy min-heap keyed by collapse cost. Re-evaluating an edge
//! pushes a fresh entry and bumps the edge's version, so older entries are
//! recognised as stale and dropped when popped. Every step of an edge's life
//! is reported to a [`CollapseListener`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::Point3;

use super::placement::PlacementPolicy;
use super::quadric::QuadricAccumulator;
use super::sharp::ConstrainedEdges;
use super::stop::StopPredicate;
use crate::algo::progress::Progress;
use crate::mesh::{EdgeId, HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId};

/// The geometry and topology of one collapse, captured before the mesh is
/// touched.
#[derive(Debug, Clone)]
pub struct CollapseProfile<I: MeshIndex = u32> {
    /// The collapsed half-edge, running from `removed` to `survivor`.
    pub halfedge: HalfEdgeId<I>,
    /// The vertex that disappears (`source(halfedge)`).
    pub removed: VertexId<I>,
    /// The vertex that stays (`target(halfedge)`).
    pub survivor: VertexId<I>,
    /// Position of `removed`.
    pub removed_position: Point3<f64>,
    /// Position of `survivor` before the collapse.
    pub survivor_position: Point3<f64>,
    /// Apex of the face on the left of `halfedge`, if that face exists.
    pub left: Option<(VertexId<I>, Point3<f64>)>,
    /// Apex of the face on the right of `halfedge`, if that face exists.
    pub right: Option<(VertexId<I>, Point3<f64>)>,
}

impl<I: MeshIndex> CollapseProfile<I> {
    /// Capture the profile of collapsing `h`.
    pub fn new(mesh: &HalfEdgeMesh<I>, h: HalfEdgeId<I>) -> Self {
        let o = mesh.twin(h);
        let removed = mesh.source(h);
        let survivor = mesh.target(h);
        let apex = |x: HalfEdgeId<I>| {
            if mesh.is_border(x) {
                None
            } else {
                let v = mesh.target(mesh.next(x));
                Some((v, *mesh.position(v)))
            }
        };
        Self {
            halfedge: h,
            removed,
            survivor,
            removed_position: *mesh.position(removed),
            survivor_position: *mesh.position(survivor),
            left: apex(h),
            right: apex(o),
        }
    }

    /// The collapsed edge.
    pub fn edge(&self) -> EdgeId<I> {
        self.halfedge.edge()
    }
}

/// A step in the life of a candidate edge.
#[derive(Debug)]
pub enum CollapseEvent<'a, I: MeshIndex = u32> {
    /// The edge entered the queue.
    Collected {
        /// The queued edge.
        edge: EdgeId<I>,
        /// Its cost, `None` if uncomputable.
        cost: Option<f64>,
    },
    /// The edge was popped as the current cheapest candidate.
    Selected {
        /// The popped edge.
        edge: EdgeId<I>,
        /// Its cost, `None` if uncomputable.
        cost: Option<f64>,
    },
    /// The edge is about to be collapsed.
    Collapsing {
        /// The collapse about to happen.
        profile: &'a CollapseProfile<I>,
        /// Where the survivor will be moved, `None` if it stays put.
        placement: Option<Point3<f64>>,
    },
    /// The edge failed the topological check and was skipped.
    NonCollapsable {
        /// The rejected collapse.
        profile: &'a CollapseProfile<I>,
    },
    /// The edge has been collapsed.
    Collapsed {
        /// The collapse that happened.
        profile: &'a CollapseProfile<I>,
        /// The surviving vertex.
        survivor: VertexId<I>,
        /// The mesh right after the collapse.
        mesh: &'a HalfEdgeMesh<I>,
    },
}

/// Receives [`CollapseEvent`]s from a [`CollapseEngine`].
pub trait CollapseListener<I: MeshIndex> {
    /// Handle one event.
    fn on_event(&mut self, event: CollapseEvent<'_, I>);
}

impl<I: MeshIndex> CollapseListener<I> for () {
    fn on_event(&mut self, _event: CollapseEvent<'_, I>) {}
}

/// A heap entry. Ordered so that `BinaryHeap` pops the cheapest edge first;
/// uncomputable costs come last and ties go to the lower half-edge index.
#[derive(Debug, Clone, Copy)]
struct QueueEntry<I: MeshIndex> {
    cost: Option<f64>,
    halfedge: HalfEdgeId<I>,
    version: u32,
}

impl<I: MeshIndex> PartialEq for QueueEntry<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: MeshIndex> Eq for QueueEntry<I> {}

impl<I: MeshIndex> PartialOrd for QueueEntry<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: MeshIndex> Ord for QueueEntry<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        let by_cost = match (self.cost, other.cost) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        by_cost.then_with(|| other.halfedge.index().cmp(&self.halfedge.index()))
    }
}

/// Greedy quadric-driven edge collapse over a mesh.
pub struct CollapseEngine<'m, I: MeshIndex = u32> {
    mesh: &'m mut HalfEdgeMesh<I>,
    quadrics: QuadricAccumulator,
    policy: PlacementPolicy,
    constraints: ConstrainedEdges,
    stop: StopPredicate,
    heap: BinaryHeap<QueueEntry<I>>,
    versions: Vec<u32>,
    queued: Vec<bool>,
}

impl<'m, I: MeshIndex> CollapseEngine<'m, I> {
    /// Prepare an engine: vertex quadrics are accumulated immediately.
    pub fn new(
        mesh: &'m mut HalfEdgeMesh<I>,
        policy: PlacementPolicy,
        constraints: ConstrainedEdges,
        stop: StopPredicate,
        border_weight: f64,
    ) -> Self {
        let quadrics = QuadricAccumulator::from_mesh(&*mesh, border_weight);
        let edges = mesh.edge_capacity();
        Self {
            mesh,
            quadrics,
            policy,
            constraints,
            stop,
            heap: BinaryHeap::new(),
            versions: vec![0; edges],
            queued: vec![false; edges],
        }
    }

    /// Collapse edges until the stop predicate holds or no candidate is left.
    ///
    /// Returns the number of collapses performed.
    pub fn run<L: CollapseListener<I>>(mut self, listener: &mut L, progress: &Progress) -> usize {
        let initial_vertices = self.mesh.num_vertices();
        let initial_faces = self.mesh.num_faces();
        let vertex_steps = initial_vertices.saturating_sub(self.stop.target_vertices());
        let face_steps = initial_faces.saturating_sub(self.stop.target_faces());
        let total = vertex_steps.max(face_steps);

        let edges: Vec<EdgeId<I>> = self.mesh.edge_ids().collect();
        log::debug!(
            "collapse engine: {} vertices, {} faces, {} edges",
            self.mesh.num_vertices(),
            initial_faces,
            edges.len()
        );
        for e in edges {
            if !self.constraints.is_constrained(e) {
                self.enqueue(e, listener);
            }
        }

        let mut collapsed = 0;
        while let Some(entry) = self.heap.pop() {
            let h = entry.halfedge;
            let e = h.edge();
            if self.mesh.is_edge_removed(e) || entry.version != self.versions[e.index()] {
                continue;
            }
            self.queued[e.index()] = false;

            listener.on_event(CollapseEvent::Selected {
                edge: e,
                cost: entry.cost,
            });
            if entry.cost.is_none() {
                continue;
            }

            if self.stop.should_stop(self.mesh.num_vertices(), self.mesh.num_faces()) {
                log::debug!("stop condition reached after {} collapses", collapsed);
                break;
            }

            let profile = CollapseProfile::new(&*self.mesh, h);
            if !self.mesh.is_collapse_ok(h) {
                listener.on_event(CollapseEvent::NonCollapsable { profile: &profile });
                continue;
            }

            let placement = self.placement(h);
            listener.on_event(CollapseEvent::Collapsing {
                profile: &profile,
                placement,
            });

            let inherited = self.inherited_constraints(h);
            let survivor = self.mesh.collapse(h);
            for kept in inherited {
                self.constrain(kept);
            }
            if let Some(p) = placement {
                self.mesh.set_position(survivor, p);
            }
            self.quadrics.merge(survivor, profile.removed);
            collapsed += 1;

            log::trace!(
                "collapsed {:?} -> {:?}, {} faces left",
                profile.removed,
                survivor,
                self.mesh.num_faces()
            );
            listener.on_event(CollapseEvent::Collapsed {
                profile: &profile,
                survivor,
                mesh: &*self.mesh,
            });

            self.update_neighborhood(survivor, listener);
            let vertices_done = (initial_vertices - self.mesh.num_vertices()).min(vertex_steps);
            let faces_done = (initial_faces - self.mesh.num_faces()).min(face_steps);
            progress.report(vertices_done.max(faces_done), total, "Collapsing edges");
        }

        log::debug!(
            "collapse engine done: {} collapses, {} vertices, {} faces",
            collapsed,
            self.mesh.num_vertices(),
            self.mesh.num_faces()
        );
        collapsed
    }

    fn cost(&self, h: HalfEdgeId<I>) -> Option<f64> {
        let v0 = self.mesh.source(h);
        let v1 = self.mesh.target(h);
        let q = self.quadrics.edge_quadric(v0, v1);
        self.policy.cost(&q, self.mesh.position(v0), self.mesh.position(v1))
    }

    fn placement(&self, h: HalfEdgeId<I>) -> Option<Point3<f64>> {
        let q = self.quadrics.edge_quadric(self.mesh.source(h), self.mesh.target(h));
        if self.constraints.is_empty() {
            self.policy.bounded_placement(&*self.mesh, h, &q)
        } else {
            self.policy.constrained_placement(&*self.mesh, h, &q, &self.constraints)
        }
    }

    /// Edges that take the place of a constrained edge when `h` is collapsed.
    ///
    /// Each removed triangle folds one edge onto another: `(v_s, v_l)` onto
    /// `(v_t, v_l)` on the left and `(v_t, v_r)` onto `(v_r, v_s)` on the right.
    fn inherited_constraints(&self, h: HalfEdgeId<I>) -> Vec<EdgeId<I>> {
        let mut kept = Vec::new();
        if self.constraints.is_empty() {
            return kept;
        }
        for side in [h, self.mesh.twin(h)] {
            if self.mesh.is_border(side) {
                continue;
            }
            if self.constraints.is_constrained(self.mesh.next(side).edge()) {
                kept.push(self.mesh.prev(side).edge());
            }
        }
        kept
    }

    /// Freeze an edge and drop any pending queue entry for it.
    fn constrain(&mut self, e: EdgeId<I>) {
        self.constraints.mark(e);
        let slot = e.index();
        self.versions[slot] = self.versions[slot].wrapping_add(1);
        self.queued[slot] = false;
    }

    fn enqueue<L: CollapseListener<I>>(&mut self, e: EdgeId<I>, listener: &mut L) {
        let h = e.halfedge();
        let cost = self.cost(h);
        let slot = e.index();
        self.versions[slot] = self.versions[slot].wrapping_add(1);
        self.heap.push(QueueEntry {
            cost,
            halfedge: h,
            version: self.versions[slot],
        });
        if !self.queued[slot] {
            self.queued[slot] = true;
            listener.on_event(CollapseEvent::Collected { edge: e, cost });
        }
    }

    /// Re-evaluate every edge around `v` and around each neighbour of `v`.
    fn update_neighborhood<L: CollapseListener<I>>(&mut self, v: VertexId<I>, listener: &mut L) {
        let mut edges: Vec<EdgeId<I>> = Vec::new();
        for n in self.mesh.vertex_neighbors(v) {
            edges.extend(self.mesh.vertex_halfedges(n).map(|h| h.edge()));
        }
        edges.sort_by_key(|e| e.index());
        edges.dedup();

        for e in edges {
            if !self.constraints.is_constrained(e) {
                self.enqueue(e, listener);
            }
        }
    }
}
