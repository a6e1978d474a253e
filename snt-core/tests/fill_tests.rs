//! Dijkstra fill scenarios: a single-seed sphere and P7's merge monotonicity
//! across overlapping fills.

use std::sync::Arc;

use snt_core::{BitDepth, Calibration, DenseVolume, ExitReason, FillConfig, FillEngine, MaxScalingCost, Voxel};

fn uniform_volume(n: i64, value: f64) -> Arc<DenseVolume> {
    Arc::new(DenseVolume::new(n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::Eight, value))
}

#[test]
fn dijkstra_fill_reaches_a_physical_distance_sphere() {
    let volume = uniform_volume(50, 100.0);
    let cost = Arc::new(MaxScalingCost::new(volume.clone(), 100.0));
    let seed = Voxel::new(25, 25, 25);
    let threshold = 3.0 * (1.0 / 100.0);
    let config = FillConfig::new(vec![seed], threshold);
    let engine = FillEngine::new(volume, cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    for dz in -4..=4 {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let physical = ((dx * dx + dy * dy + dz * dz) as f64).sqrt();
                let voxel = Voxel::new(25 + dx, 25 + dy, 25 + dz);
                let reached = outcome.distance(voxel).is_some();
                if physical < 2.0 {
                    assert!(reached, "voxel at distance {physical} should be in-fill ({voxel:?})");
                } else if physical > 4.0 {
                    assert!(!reached, "voxel at distance {physical} should not be in-fill ({voxel:?})");
                }
            }
        }
    }
}

#[test]
fn merge_fills_keeps_the_minimum_distance_per_voxel() {
    let volume = uniform_volume(10, 100.0);
    let cost = Arc::new(MaxScalingCost::new(volume.clone(), 100.0));

    let a = FillEngine::new(volume.clone(), cost.clone(), FillConfig::new(vec![Voxel::new(0, 0, 0)], 20.0))
        .unwrap()
        .run();
    let b = FillEngine::new(volume, cost, FillConfig::new(vec![Voxel::new(9, 9, 9)], 20.0)).unwrap().run();

    let merged = snt_core::fill::merge_fills(&[a, b]);

    let midpoint = Voxel::new(5, 5, 5);
    let from_a = merged.get(&midpoint).copied();
    assert!(from_a.is_some());

    // Every merged distance must be the smaller of whichever fill(s) reached that voxel.
    for (&voxel, &g) in &merged {
        let d_a = ((voxel.x).pow(2) + (voxel.y).pow(2) + (voxel.z).pow(2)) as f64;
        let d_b = ((voxel.x - 9).pow(2) + (voxel.y - 9).pow(2) + (voxel.z - 9).pow(2)) as f64;
        let expected_upper_bound = d_a.sqrt().min(d_b.sqrt()) + 1e-6;
        assert!(g <= expected_upper_bound, "voxel {voxel:?} merged g={g} exceeds nearest-seed distance");
    }
}
