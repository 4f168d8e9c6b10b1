//! Lazy-deletion priority queue of collapse candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::Point3;

use crate::mesh::{Label, Mesh, VertexId};

/// A directed collapse: `gone` merges into `keep`, which moves to `target`.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Surviving vertex.
    pub keep: VertexId,
    /// Removed vertex.
    pub gone: VertexId,
    /// Position of the survivor after the collapse.
    pub target: Point3<f64>,
    /// Quadric error at `target`.
    pub cost: f64,
    keep_label: Label,
    gone_label: Label,
    keep_version: u32,
    gone_version: u32,
}

impl Candidate {
    fn key(&self) -> (f64, Label, Label) {
        (self.cost, self.keep_label, self.gone_label)
    }
}

// Min-heap on (cost, keep label, gone label)
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.key(), other.key());
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| b.2.cmp(&a.2))
    }
}

/// Candidates ordered cheapest first.
///
/// Every vertex carries a version. A candidate remembers the versions of its
/// endpoints when pushed and is dropped on pop if either endpoint has been
/// retired or bumped since.
#[derive(Debug, Default)]
pub struct CollapseQueue {
    heap: BinaryHeap<Candidate>,
    versions: Vec<u32>,
    stale: usize,
}

impl CollapseQueue {
    /// An empty queue for a mesh with `num_vertices` vertex slots.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            versions: vec![0; num_vertices],
            stale: 0,
        }
    }

    /// Queue a candidate stamped with the current versions of its endpoints.
    pub fn push(
        &mut self,
        mesh: &Mesh,
        keep: VertexId,
        gone: VertexId,
        target: Point3<f64>,
        cost: f64,
    ) {
        self.heap.push(Candidate {
            keep,
            gone,
            target,
            cost,
            keep_label: mesh.vertex(keep).label(),
            gone_label: mesh.vertex(gone).label(),
            keep_version: self.versions[keep.index()],
            gone_version: self.versions[gone.index()],
        });
    }

    /// Invalidate every queued candidate touching `v`.
    pub fn bump(&mut self, v: VertexId) {
        let version = &mut self.versions[v.index()];
        *version = version.wrapping_add(1);
    }

    /// Pop the cheapest live candidate, discarding stale ones.
    pub fn pop(&mut self, mesh: &Mesh) -> Option<Candidate> {
        while let Some(candidate) = self.heap.pop() {
            let live = mesh.vertex(candidate.keep).is_alive()
                && mesh.vertex(candidate.gone).is_alive()
                && self.versions[candidate.keep.index()] == candidate.keep_version
                && self.versions[candidate.gone.index()] == candidate.gone_version;
            if live {
                return Some(candidate);
            }
            self.stale += 1;
        }
        None
    }

    /// Drop every queued entry, keeping versions.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of queued entries, including stale ones.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of stale entries discarded so far.
    pub fn stale(&self) -> usize {
        self.stale
    }
}
