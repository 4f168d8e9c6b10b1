//! Mesh validity checking.
//!
//! [`check`] sweeps every structural invariant of a [`Mesh`] without mutating
//! it and collects each failure as a [`Violation`]. Callers that only need a
//! yes/no answer use [`Mesh::is_valid`]; tests that need to know *which*
//! invariant broke inspect the [`ValidityReport`].
//!
//! Categories are checked in order: liveness, degeneracy, adjacency, vertex
//! links, groups. Triangles failing liveness are skipped by later checks.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::adjacency::{edge_census, opposite_winding};
use super::container::{is_degenerate, Mesh};
use super::element::{Adjacency, EdgeSlot};
use super::index::{FanId, GroupId, Label, TriangleId, VertexId};

/// The invariant family a [`Violation`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    /// Dead or repeated references, duplicate labels, missing adjacency.
    Liveness,
    /// Zero or near-zero area.
    Degenerate,
    /// Asymmetric or stale neighbor records, winding conflicts.
    Adjacency,
    /// Vertex links and classification.
    Link,
    /// Group identifiers.
    Group,
}

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Adjacency was never built or is out of date.
    AdjacencyNotBuilt,
    /// A triangle references a retired or unknown vertex.
    DeadVertexReference {
        /// The triangle.
        triangle: TriangleId,
        /// The bad reference.
        vertex: VertexId,
    },
    /// A triangle references the same vertex twice.
    RepeatedVertex {
        /// The triangle.
        triangle: TriangleId,
    },
    /// Two live vertices share a label.
    DuplicateLabel {
        /// The shared label.
        label: Label,
        /// First vertex carrying it.
        first: VertexId,
        /// Second vertex carrying it.
        second: VertexId,
    },
    /// A triangle has (near) zero area.
    DegenerateTriangle {
        /// The triangle.
        triangle: TriangleId,
        /// Its area.
        area: f64,
    },
    /// An edge record disagrees with the triangles actually sharing the edge.
    AsymmetricAdjacency {
        /// The triangle holding the record.
        triangle: TriangleId,
        /// The edge index inside it.
        edge: u8,
    },
    /// A non-manifold record points at a retired fan or one that does not
    /// list exactly the triangles on the edge.
    StaleFan {
        /// The triangle holding the record.
        triangle: TriangleId,
        /// The edge index inside it.
        edge: u8,
        /// The fan it points at.
        fan: FanId,
    },
    /// Two triangles are linked as manifold neighbors but wind the edge the
    /// same way.
    WindingConflict {
        /// First endpoint.
        a: VertexId,
        /// Second endpoint.
        b: VertexId,
    },
    /// A vertex link names a retired triangle or one not containing it.
    DanglingLink {
        /// The vertex.
        vertex: VertexId,
        /// The link triangle.
        triangle: TriangleId,
    },
    /// The links of a vertex do not cover its fans one-to-one.
    FanCoverage {
        /// The vertex.
        vertex: VertexId,
        /// Number of fans found.
        fans: usize,
        /// Number of links stored.
        links: usize,
    },
    /// The manifold flag of a vertex disagrees with its neighborhood.
    Misclassified {
        /// The vertex.
        vertex: VertexId,
    },
    /// A triangle carries a group that was never registered.
    UnknownGroup {
        /// The triangle.
        triangle: TriangleId,
        /// Its group.
        group: GroupId,
    },
    /// A surviving triangle changed group since a snapshot was taken.
    GroupChanged {
        /// The triangle.
        triangle: TriangleId,
        /// Group at snapshot time.
        before: GroupId,
        /// Current group.
        after: GroupId,
    },
}

impl Violation {
    /// The invariant family this violation belongs to.
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::AdjacencyNotBuilt
            | Violation::DeadVertexReference { .. }
            | Violation::RepeatedVertex { .. }
            | Violation::DuplicateLabel { .. } => ViolationKind::Liveness,
            Violation::DegenerateTriangle { .. } => ViolationKind::Degenerate,
            Violation::AsymmetricAdjacency { .. }
            | Violation::StaleFan { .. }
            | Violation::WindingConflict { .. } => ViolationKind::Adjacency,
            Violation::DanglingLink { .. }
            | Violation::FanCoverage { .. }
            | Violation::Misclassified { .. } => ViolationKind::Link,
            Violation::UnknownGroup { .. } | Violation::GroupChanged { .. } => ViolationKind::Group,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::AdjacencyNotBuilt => write!(f, "adjacency not built"),
            Violation::DeadVertexReference { triangle, vertex } => {
                write!(f, "{:?} references dead vertex {:?}", triangle, vertex)
            }
            Violation::RepeatedVertex { triangle } => {
                write!(f, "{:?} repeats a vertex", triangle)
            }
            Violation::DuplicateLabel {
                label,
                first,
                second,
            } => write!(f, "label {} used by {:?} and {:?}", label, first, second),
            Violation::DegenerateTriangle { triangle, area } => {
                write!(f, "{:?} is degenerate (area {:e})", triangle, area)
            }
            Violation::AsymmetricAdjacency { triangle, edge } => {
                write!(f, "{:?} edge {} has an asymmetric neighbor record", triangle, edge)
            }
            Violation::StaleFan {
                triangle,
                edge,
                fan,
            } => write!(f, "{:?} edge {} points at stale fan {:?}", triangle, edge, fan),
            Violation::WindingConflict { a, b } => {
                write!(f, "manifold edge {:?}-{:?} has inconsistent winding", a, b)
            }
            Violation::DanglingLink { vertex, triangle } => {
                write!(f, "{:?} links to non-incident {:?}", vertex, triangle)
            }
            Violation::FanCoverage {
                vertex,
                fans,
                links,
            } => write!(f, "{:?} has {} fans but {} links", vertex, fans, links),
            Violation::Misclassified { vertex } => {
                write!(f, "{:?} has a wrong manifold classification", vertex)
            }
            Violation::UnknownGroup { triangle, group } => {
                write!(f, "{:?} has unregistered group {}", triangle, group)
            }
            Violation::GroupChanged {
                triangle,
                before,
                after,
            } => write!(f, "{:?} moved from group {} to {}", triangle, before, after),
        }
    }
}

/// Every violation found in one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidityReport {
    violations: Vec<Violation>,
}

impl ValidityReport {
    /// Whether no invariant is broken.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations, in check order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether any violation of the given family was found.
    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind() == kind)
    }

    /// Number of violations found.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether the report is empty.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

impl fmt::Display for ValidityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "valid");
        }
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {}", v)?;
        }
        Ok(())
    }
}

/// Group membership of every live triangle at one point in time.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    groups: Vec<(TriangleId, GroupId)>,
}

impl GroupSnapshot {
    /// Record the group of every live triangle.
    pub fn capture(mesh: &Mesh) -> Self {
        Self {
            groups: mesh.triangles().map(|(t, tri)| (t, tri.group())).collect(),
        }
    }

    /// Report every surviving triangle whose group changed since capture.
    pub fn verify(&self, mesh: &Mesh) -> ValidityReport {
        let mut report = ValidityReport::default();
        for &(t, before) in &self.groups {
            let tri = mesh.triangle(t);
            if tri.is_alive() && tri.group() != before {
                report.push(Violation::GroupChanged {
                    triangle: t,
                    before,
                    after: tri.group(),
                });
            }
        }
        report
    }
}

/// Check every invariant of `mesh`.
pub fn check(mesh: &Mesh) -> ValidityReport {
    let mut report = ValidityReport::default();
    let sound = check_liveness(mesh, &mut report);
    check_degenerate(mesh, &sound, &mut report);
    if mesh.has_adjacency() {
        check_adjacency(mesh, &sound, &mut report);
        check_links(mesh, &sound, &mut report);
    }
    check_groups(mesh, &mut report);
    report
}

/// Returns the triangles whose references are sound.
fn check_liveness(mesh: &Mesh, report: &mut ValidityReport) -> HashSet<TriangleId> {
    if !mesh.has_adjacency() {
        report.push(Violation::AdjacencyNotBuilt);
    }

    let mut sound = HashSet::new();
    for (t, tri) in mesh.triangles() {
        let mut ok = true;
        for v in tri.vertices() {
            let alive = v.is_valid()
                && mesh
                    .vertices
                    .get(v.index())
                    .is_some_and(|vertex| vertex.is_alive());
            if !alive {
                report.push(Violation::DeadVertexReference {
                    triangle: t,
                    vertex: v,
                });
                ok = false;
            }
        }
        let [a, b, c] = tri.vertices();
        if a == b || b == c || a == c {
            report.push(Violation::RepeatedVertex { triangle: t });
            ok = false;
        }
        if ok {
            sound.insert(t);
        }
    }

    let mut labels: HashMap<Label, VertexId> = HashMap::new();
    for v in mesh.vertex_ids() {
        let label = mesh.vertex(v).label();
        if let Some(&first) = labels.get(&label) {
            report.push(Violation::DuplicateLabel {
                label,
                first,
                second: v,
            });
        } else {
            labels.insert(label, v);
        }
    }
    sound
}

fn check_degenerate(mesh: &Mesh, sound: &HashSet<TriangleId>, report: &mut ValidityReport) {
    for t in mesh.triangle_ids().filter(|t| sound.contains(t)) {
        if is_degenerate(&mesh.triangle_positions(t)) {
            report.push(Violation::DegenerateTriangle {
                triangle: t,
                area: mesh.triangle_area(t),
            });
        }
    }
}

/// Compare every edge record against a fresh census of the triangles.
fn check_adjacency(mesh: &Mesh, sound: &HashSet<TriangleId>, report: &mut ValidityReport) {
    for ((a, b), slots) in edge_census(mesh) {
        if slots.iter().any(|(t, _)| !sound.contains(t)) {
            continue;
        }
        let adjacency = |s: &EdgeSlot| mesh.triangle(s.0).adjacency(s.1 as usize);
        match slots.as_slice() {
            [s] => {
                if adjacency(s) != Adjacency::Boundary {
                    report.push(Violation::AsymmetricAdjacency {
                        triangle: s.0,
                        edge: s.1,
                    });
                }
            }
            [s, r] if opposite_winding(mesh, *s, *r) => {
                let expect_s = Adjacency::Manifold {
                    triangle: r.0,
                    edge: r.1,
                };
                let expect_r = Adjacency::Manifold {
                    triangle: s.0,
                    edge: s.1,
                };
                for (slot, expected) in [(s, expect_s), (r, expect_r)] {
                    if adjacency(slot) != expected {
                        report.push(Violation::AsymmetricAdjacency {
                            triangle: slot.0,
                            edge: slot.1,
                        });
                    }
                }
            }
            _ => {
                let same_winding_pair = slots.len() == 2;
                for s in &slots {
                    match adjacency(s) {
                        Adjacency::NonManifold(fan) => {
                            let record = mesh.fans.get(fan.index());
                            let matches = record.is_some_and(|f| {
                                f.is_alive()
                                    && f.is_winding_conflict() == same_winding_pair
                                    && f.members().len() == slots.len()
                                    && slots.iter().all(|m| f.members().contains(m))
                            });
                            if !matches {
                                report.push(Violation::StaleFan {
                                    triangle: s.0,
                                    edge: s.1,
                                    fan,
                                });
                            }
                        }
                        Adjacency::Manifold { .. } if same_winding_pair => {
                            report.push(Violation::WindingConflict { a, b });
                        }
                        _ => report.push(Violation::AsymmetricAdjacency {
                            triangle: s.0,
                            edge: s.1,
                        }),
                    }
                }
            }
        }
    }
}

fn check_links(mesh: &Mesh, sound: &HashSet<TriangleId>, report: &mut ValidityReport) {
    let mut incident: HashMap<VertexId, Vec<TriangleId>> = HashMap::new();
    for (t, tri) in mesh.triangles() {
        if sound.contains(&t) {
            for v in tri.vertices() {
                incident.entry(v).or_default().push(t);
            }
        }
    }

    for v in mesh.vertex_ids() {
        let vertex = mesh.vertex(v);
        let mut dangling = false;
        for &t in vertex.fans() {
            let tri = mesh.triangles.get(t.index());
            if !tri.is_some_and(|tri| tri.is_alive() && tri.contains(v)) {
                report.push(Violation::DanglingLink {
                    vertex: v,
                    triangle: t,
                });
                dangling = true;
            }
        }
        if dangling {
            continue;
        }

        let star = incident.get(&v).map(Vec::as_slice).unwrap_or(&[]);
        let mut remaining: Vec<TriangleId> = star.to_vec();
        let mut fans = 0;
        let mut covered = true;
        let mut seen = Vec::new();
        while let Some(&seed) = remaining.first() {
            fans += 1;
            seen.clear();
            mesh.collect_fan(v, seed, &mut seen);
            let links_in_fan = vertex.fans().iter().filter(|t| seen.contains(t)).count();
            if links_in_fan != 1 {
                covered = false;
            }
            remaining.retain(|t| !seen.contains(t));
        }
        if !covered || fans != vertex.fans().len() {
            report.push(Violation::FanCoverage {
                vertex: v,
                fans,
                links: vertex.fans().len(),
            });
            continue;
        }

        let on_fan = star.iter().any(|&t| {
            let tri = mesh.triangle(t);
            tri.index_of(v).is_some_and(|k| {
                matches!(tri.adjacency(k), Adjacency::NonManifold(_))
                    || matches!(tri.adjacency((k + 2) % 3), Adjacency::NonManifold(_))
            })
        });
        if vertex.is_manifold() != (fans <= 1 && !on_fan) {
            report.push(Violation::Misclassified { vertex: v });
        }
    }
}

fn check_groups(mesh: &Mesh, report: &mut ValidityReport) {
    for (t, tri) in mesh.triangles() {
        if !mesh.groups().contains(&tri.group()) {
            report.push(Violation::UnknownGroup {
                triangle: t,
                group: tri.group(),
            });
        }
    }
}

impl Mesh {
    /// Run the full invariant sweep and return every violation.
    pub fn validate(&self) -> ValidityReport {
        check(self)
    }

    /// Whether every invariant holds.
    ///
    /// Never panics and never mutates; details are available through
    /// [`Mesh::validate`].
    pub fn is_valid(&self) -> bool {
        check(self).is_valid()
    }
}
