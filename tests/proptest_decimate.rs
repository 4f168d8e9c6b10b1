//! Property-based tests for decimation.
//!
//! Random sheets, bumpy grids and option sets are decimated with invariant
//! checking enabled; the mesh must stay valid and keep its groups.
//!
//! Run with: cargo test --test proptest_decimate

use meshcollapse::mesh::GroupSnapshot;
use meshcollapse::prelude::*;
use nalgebra::Point3;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Grid dimensions in vertices.
fn arb_dims() -> impl Strategy<Value = (usize, usize)> {
    (2usize..7, 2usize..7)
}

fn arb_placement() -> impl Strategy<Value = Placement> {
    prop_oneof![
        Just(Placement::Vertex),
        Just(Placement::Middle),
        Just(Placement::Optimal),
    ]
}

fn arb_policy() -> impl Strategy<Value = NonManifoldPolicy> {
    prop_oneof![Just(NonManifoldPolicy::Chain), Just(NonManifoldPolicy::Freeze)]
}

/// `sheets` grids of m x n vertices sharing the column x = 0, evenly spread
/// around the Y axis. Each triangle gets its own group.
fn sheets_on_spine(m: usize, n: usize, sheets: usize, heights: &[f64]) -> Mesh {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    let spine: Vec<usize> = (0..n)
        .map(|j| {
            vertices.push(Point3::new(0.0, j as f64, 0.0));
            vertices.len() - 1
        })
        .collect();

    for s in 0..sheets {
        let angle = s as f64 * std::f64::consts::TAU / sheets as f64;
        let (ct, st) = (angle.cos(), angle.sin());
        let mut index = vec![0; m * n];
        for j in 0..n {
            index[m * j] = spine[j];
            for i in 1..m {
                let bump = heights
                    .get((m * j + i) % heights.len().max(1))
                    .copied()
                    .unwrap_or(0.0);
                let (x, z) = (i as f64, bump);
                vertices.push(Point3::new(ct * x + st * z, j as f64, -st * x + ct * z));
                index[m * j + i] = vertices.len() - 1;
            }
        }
        for j in 0..n - 1 {
            for i in 0..m - 1 {
                faces.push([index[m * j + i], index[m * j + i + 1], index[m * (j + 1) + i]]);
                faces.push([
                    index[m * j + i + 1],
                    index[m * (j + 1) + i + 1],
                    index[m * (j + 1) + i],
                ]);
            }
        }
    }

    let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
    let ids: Vec<TriangleId> = mesh.triangle_ids().collect();
    for t in ids {
        let group = mesh.next_group_id();
        mesh.set_group_id(t, group).unwrap();
    }
    mesh
}

fn decimate(mesh: &mut Mesh, options: DecimateOptions) -> DecimateStats {
    Decimator::with_options(mesh, options.with_check_invariants(true))
        .unwrap()
        .compute()
        .unwrap()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Flat sheets on a spine always end valid, with fewer or equal triangles.
    #[test]
    fn proptest_flat_sheets_stay_valid(
        (m, n) in arb_dims(),
        sheets in 1usize..5,
        placement in arb_placement(),
        policy in arb_policy(),
    ) {
        let mut mesh = sheets_on_spine(m, n, sheets, &[]);
        prop_assume!(mesh.is_valid());
        let before = mesh.num_triangles();
        let snapshot = GroupSnapshot::capture(&mesh);

        let options = DecimateOptions::with_size(0.1)
            .with_placement(placement)
            .with_non_manifold(policy);
        let stats = decimate(&mut mesh, options);

        prop_assert!(mesh.is_valid(), "{}", mesh.validate());
        prop_assert!(snapshot.verify(&mesh).is_valid());
        prop_assert!(stats.triangles_after <= before);
        prop_assert_eq!(stats.triangles_after, mesh.num_triangles());
        prop_assert!(mesh.num_triangles() >= 2 * sheets);
    }

    /// Bumpy sheets exercise the flip and tolerance checks.
    #[test]
    fn proptest_bumpy_sheets_stay_valid(
        (m, n) in arb_dims(),
        sheets in 1usize..4,
        heights in prop::collection::vec(-0.3..0.3f64, 1..12),
        size in 0.01..2.0f64,
        placement in arb_placement(),
    ) {
        let mut mesh = sheets_on_spine(m, n, sheets, &heights);
        prop_assume!(mesh.is_valid());
        let snapshot = GroupSnapshot::capture(&mesh);

        let options = DecimateOptions::with_size(size).with_placement(placement);
        decimate(&mut mesh, options);

        prop_assert!(mesh.is_valid(), "{}", mesh.validate());
        prop_assert!(snapshot.verify(&mesh).is_valid());
        for t in mesh.triangle_ids() {
            prop_assert!(mesh.triangle_area(t) > 0.0);
        }
    }

    /// A triangle budget is honored whenever the cost bound allows it.
    #[test]
    fn proptest_target_is_respected(
        (m, n) in (3usize..7, 3usize..7),
        target in 2usize..30,
    ) {
        let mut mesh = sheets_on_spine(m, n, 1, &[]);
        let before = mesh.num_triangles();
        let stats = decimate(
            &mut mesh,
            DecimateOptions::with_size(0.1).with_max_triangles(target),
        );

        prop_assert!(mesh.is_valid());
        if before <= target {
            prop_assert_eq!(stats.collapses, 0);
        } else {
            // One collapse removes at most two triangles of a flat sheet
            prop_assert!(mesh.num_triangles() + 1 >= target.max(2));
        }
    }

    /// Decimating an already decimated mesh again removes nothing more.
    #[test]
    fn proptest_fixed_point_is_stable((m, n) in arb_dims(), sheets in 1usize..5) {
        let mut mesh = sheets_on_spine(m, n, sheets, &[]);
        decimate(&mut mesh, DecimateOptions::with_size(0.1));
        let settled = mesh.num_triangles();

        let stats = decimate(&mut mesh, DecimateOptions::with_size(0.1));
        prop_assert_eq!(stats.collapses, 0);
        prop_assert_eq!(mesh.num_triangles(), settled);
    }
}
