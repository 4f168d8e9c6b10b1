//! The decimation control loop.

use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use crate::algo::progress::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{edge_key, Mesh, VertexId};

use super::legality::check_collapse;
use super::quadric::{evaluate_collapse, vertex_quadrics, Quadric};
use super::queue::{Candidate, CollapseQueue};
use super::DecimateOptions;

/// Where the driver is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimateState {
    /// Constructed, nothing run yet.
    Idle,
    /// Looking for the next legal candidate.
    Evaluating,
    /// Applying a collapse.
    Collapsing,
    /// No further collapse will be applied by this pass.
    Converged,
}

/// Why the last pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every candidate was applied, rejected or stale.
    QueueExhausted,
    /// The cheapest remaining candidate costs more than `size²`.
    ToleranceExceeded,
    /// The mesh reached `maxtriangles`.
    TargetReached,
}

/// Summary of a decimation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecimateStats {
    /// Passes run, each seeding the queue with every edge.
    pub passes: usize,
    /// Collapses applied.
    pub collapses: usize,
    /// Candidates refused by the legality check.
    pub rejected: usize,
    /// Queue entries dropped because an endpoint changed.
    pub stale: usize,
    /// Triangle count when the decimator was created.
    pub triangles_before: usize,
    /// Current triangle count.
    pub triangles_after: usize,
    /// How the last pass ended.
    pub termination: Option<Termination>,
    /// Whether [`Decimator::compute`] stopped because a pass failed to lower
    /// the triangle count, rather than by reaching `maxtriangles`.
    pub stagnated: bool,
}

/// Number of inner triangles of `mesh`.
///
/// The boundary and non-manifold frame lives in the adjacency table rather
/// than in virtual triangles, so every live triangle is inner.
pub fn count_inner_triangles(mesh: &Mesh) -> usize {
    mesh.num_triangles()
}

/// In-place edge-collapse decimator.
///
/// Holds the mesh exclusively for its lifetime. Costs are quadric errors,
/// candidates are processed cheapest first and each collapse is checked with
/// [`check_collapse`](super::check_collapse) before it is applied.
pub struct Decimator<'a> {
    mesh: &'a mut Mesh,
    options: DecimateOptions,
    quadrics: Vec<Quadric>,
    queue: CollapseQueue,
    state: DecimateState,
    stats: DecimateStats,
}

impl<'a> Decimator<'a> {
    /// Create a decimator configured from string options.
    ///
    /// See [`DecimateOptions::from_pairs`] for the recognized keys.
    pub fn new<I, K, V>(mesh: &'a mut Mesh, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::with_options(mesh, DecimateOptions::from_pairs(options)?)
    }

    /// Create a decimator with typed options.
    ///
    /// Fails if adjacency is not built or the mesh is not valid.
    pub fn with_options(mesh: &'a mut Mesh, options: DecimateOptions) -> Result<Self> {
        if !mesh.has_adjacency() {
            return Err(MeshError::AdjacencyNotBuilt);
        }
        let report = mesh.validate();
        if !report.is_valid() {
            return Err(MeshError::InvalidMesh { report });
        }

        let quadrics = vertex_quadrics(mesh);
        let queue = CollapseQueue::new(mesh.vertices.len());
        let triangles = mesh.num_triangles();
        Ok(Self {
            mesh,
            options,
            quadrics,
            queue,
            state: DecimateState::Idle,
            stats: DecimateStats {
                triangles_before: triangles,
                triangles_after: triangles,
                ..DecimateStats::default()
            },
        })
    }

    /// Number of inner triangles of `mesh`; see [`count_inner_triangles`].
    pub fn count_inner_triangles(mesh: &Mesh) -> usize {
        count_inner_triangles(mesh)
    }

    /// Current state.
    pub fn state(&self) -> DecimateState {
        self.state
    }

    /// Statistics so far.
    pub fn stats(&self) -> &DecimateStats {
        &self.stats
    }

    /// The options in use.
    pub fn options(&self) -> &DecimateOptions {
        &self.options
    }

    /// The mesh being decimated.
    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    /// Run passes until one fails to lower the triangle count or the target
    /// is reached.
    pub fn compute(&mut self) -> Result<DecimateStats> {
        self.compute_with_progress(&Progress::none())
    }

    /// Like [`Decimator::compute`], reporting after every pass.
    pub fn compute_with_progress(&mut self, progress: &Progress) -> Result<DecimateStats> {
        let start = self.stats.triangles_before;
        let floor = self.options.max_triangles.unwrap_or(0).min(start);
        loop {
            let before = count_inner_triangles(self.mesh);
            let termination = self.run_pass()?;
            let after = count_inner_triangles(self.mesh);
            progress.report(
                start - after.max(floor),
                start - floor,
                &format!("pass {}: {} triangles", self.stats.passes, after),
            );

            if termination == Termination::TargetReached {
                break;
            }
            if after >= before {
                self.stats.stagnated = true;
                break;
            }
        }

        info!(
            "decimated {} -> {} triangles in {} passes ({} collapses, {} rejected)",
            self.stats.triangles_before,
            self.stats.triangles_after,
            self.stats.passes,
            self.stats.collapses,
            self.stats.rejected
        );
        Ok(self.stats.clone())
    }

    /// Run a single pass over every edge.
    pub fn compute_pass(&mut self) -> Result<DecimateStats> {
        self.run_pass()?;
        Ok(self.stats.clone())
    }

    fn run_pass(&mut self) -> Result<Termination> {
        self.stats.passes += 1;
        self.seed();
        self.state = DecimateState::Evaluating;
        let tolerance = self.options.tolerance();

        let termination = loop {
            if let Some(max) = self.options.max_triangles {
                if self.mesh.num_triangles() <= max {
                    break Termination::TargetReached;
                }
            }
            let Some(candidate) = self.queue.pop(self.mesh) else {
                break Termination::QueueExhausted;
            };
            if candidate.cost > tolerance {
                break Termination::ToleranceExceeded;
            }

            if let Err(rejection) = check_collapse(
                self.mesh,
                candidate.keep,
                candidate.gone,
                &candidate.target,
                self.options.non_manifold,
            ) {
                trace!(
                    "rejected {:?} -> {:?}: {}",
                    candidate.gone,
                    candidate.keep,
                    rejection
                );
                self.stats.rejected += 1;
                continue;
            }

            self.state = DecimateState::Collapsing;
            self.apply(&candidate)?;
            self.state = DecimateState::Evaluating;
        };

        self.state = DecimateState::Converged;
        self.stats.stale = self.queue.stale();
        self.stats.triangles_after = self.mesh.num_triangles();
        self.stats.termination = Some(termination);
        debug!(
            "pass {} ended ({:?}) with {} triangles",
            self.stats.passes, termination, self.stats.triangles_after
        );
        Ok(termination)
    }

    /// Queue both directions of every live edge.
    fn seed(&mut self) {
        self.queue.clear();
        let edges: BTreeSet<(VertexId, VertexId)> = self
            .mesh
            .triangles()
            .flat_map(|(_, tri)| (0..3).map(move |e| tri.edge(e)))
            .map(|(a, b)| edge_key(a, b))
            .collect();
        for (a, b) in edges {
            self.push_edge(a, b);
        }
    }

    fn push_edge(&mut self, a: VertexId, b: VertexId) {
        for (keep, gone) in [(a, b), (b, a)] {
            let (target, cost) =
                evaluate_collapse(self.mesh, &self.quadrics, keep, gone, self.options.placement);
            if cost.is_finite() {
                self.queue.push(self.mesh, keep, gone, target, cost);
            }
        }
    }

    fn apply(&mut self, candidate: &Candidate) -> Result<()> {
        let (keep, gone) = (candidate.keep, candidate.gone);
        let removed = self.mesh.collapse_edge(keep, gone, candidate.target)?;
        trace!(
            "collapsed {:?} into {:?} (cost {:e}, {} triangles removed)",
            gone,
            keep,
            candidate.cost,
            removed.len()
        );

        let merged = self.quadrics[gone.index()];
        self.quadrics[keep.index()] += &merged;
        self.queue.bump(keep);
        self.queue.bump(gone);
        self.stats.collapses += 1;

        if self.options.check_invariants {
            let report = self.mesh.validate();
            if !report.is_valid() {
                return Err(MeshError::InvalidMesh { report });
            }
        }

        for n in self.mesh.vertex_neighbors(keep) {
            self.push_edge(keep, n);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Decimator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decimator")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::decimate::NonManifoldPolicy;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn grid(m: usize, n: usize) -> Mesh {
        let mut vertices = Vec::new();
        for j in 0..n {
            for i in 0..m {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n - 1 {
            for i in 0..m - 1 {
                faces.push([m * j + i, m * j + i + 1, m * (j + 1) + i]);
                faces.push([m * j + i + 1, m * (j + 1) + i + 1, m * (j + 1) + i]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_requires_adjacency() {
        let mut mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0, 0.0);
        let b = mesh.create_vertex(1.0, 0.0, 0.0);
        let c = mesh.create_vertex(0.0, 1.0, 0.0);
        let t = mesh.create_triangle(a, b, c);
        mesh.add(t).unwrap();

        let err = Decimator::new(&mut mesh, [("size", "0.1")]).unwrap_err();
        assert!(matches!(err, MeshError::AdjacencyNotBuilt));
    }

    #[test]
    fn test_rejects_invalid_mesh() {
        let mut mesh = grid(3, 3);
        mesh.set_label(VertexId::new(1), 0).unwrap();
        let err = Decimator::with_options(&mut mesh, DecimateOptions::default()).unwrap_err();
        assert!(matches!(err, MeshError::InvalidMesh { .. }));
    }

    #[test]
    fn test_state_machine() {
        let mut mesh = grid(3, 3);
        let mut decimator = Decimator::new(&mut mesh, [("size", "0.1")]).unwrap();
        assert_eq!(decimator.state(), DecimateState::Idle);
        decimator.compute_pass().unwrap();
        assert_eq!(decimator.state(), DecimateState::Converged);
        assert_eq!(decimator.stats().passes, 1);
    }

    #[test]
    fn test_grid_converges_with_checked_invariants() {
        let mut mesh = grid(4, 3);
        let options = DecimateOptions::with_size(0.1).with_check_invariants(true);
        let stats = Decimator::with_options(&mut mesh, options)
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(stats.triangles_before, 12);
        assert_eq!(stats.triangles_after, 2);
        assert_eq!(stats.collapses, 8);
        assert!(stats.stagnated);
        assert_eq!(Decimator::count_inner_triangles(&mesh), 2);
    }

    #[test]
    fn test_max_triangles_stops_early() {
        let mut mesh = grid(5, 5);
        let stats = Decimator::new(&mut mesh, [("size", "0.1"), ("maxtriangles", "20")])
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(stats.termination, Some(Termination::TargetReached));
        assert!(!stats.stagnated);
        assert!(mesh.num_triangles() <= 20);
        assert!(mesh.num_triangles() >= 18);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_zero_tolerance_on_curved_patch_keeps_shape() {
        let mut mesh = grid(4, 4);
        for v in mesh.vertex_ids().collect::<Vec<_>>() {
            let p = *mesh.position(v);
            let z = 0.5 * (p.x * p.x + p.y * p.y);
            mesh.set_position(v, Point3::new(p.x, p.y, z)).unwrap();
        }
        let before = mesh.num_triangles();
        let stats = Decimator::new(&mut mesh, [("size", "1e-6")])
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(stats.collapses, 0);
        assert_eq!(mesh.num_triangles(), before);
    }

    #[test]
    fn test_progress_is_reported_per_pass() {
        let mut mesh = grid(5, 5);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let progress = Progress::new(move |current, total, _| {
            assert!(current <= total);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let stats = Decimator::new(&mut mesh, [("size", "0.1")])
            .unwrap()
            .compute_with_progress(&progress)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), stats.passes);
    }

    #[test]
    fn test_freeze_keeps_hinge() {
        // Three sheets hinged on the y axis, each a 3x3 grid
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let spine: Vec<usize> = (0..3)
            .map(|j| {
                vertices.push(Point3::new(0.0, j as f64, 0.0));
                vertices.len() - 1
            })
            .collect();
        for sheet in 0..3 {
            let angle = sheet as f64 * std::f64::consts::TAU / 3.0;
            let mut ids = Vec::new();
            for j in 0..3 {
                for i in 0..3 {
                    if i == 0 {
                        ids.push(spine[j]);
                    } else {
                        let r = i as f64;
                        vertices.push(Point3::new(r * angle.cos(), j as f64, r * angle.sin()));
                        ids.push(vertices.len() - 1);
                    }
                }
            }
            for j in 0..2 {
                for i in 0..2 {
                    faces.push([ids[3 * j + i], ids[3 * j + i + 1], ids[3 * (j + 1) + i]]);
                    faces.push([ids[3 * j + i + 1], ids[3 * (j + 1) + i + 1], ids[3 * (j + 1) + i]]);
                }
            }
        }
        let mut mesh = build_from_triangles(&vertices, &faces).unwrap();

        let options = DecimateOptions::with_size(0.1)
            .with_non_manifold(NonManifoldPolicy::Freeze)
            .with_check_invariants(true);
        Decimator::with_options(&mut mesh, options)
            .unwrap()
            .compute()
            .unwrap();

        for &s in &spine {
            assert!(mesh.vertex(VertexId::new(s)).is_alive());
        }
        assert!(mesh.num_triangles() < 24);
        assert!(mesh.is_valid());
    }
}
