//! End-to-end search scenarios, each mirroring one of the concrete test
//! volumes described for the engine: a straight uniform-cost line, an
//! L-shaped bright tube, a barrier with a single detour, and a bidirectional
//! meeting check against the unidirectional baseline.

use std::sync::Arc;

use snt_core::{BitDepth, Calibration, DenseVolume, ExitReason, ReciprocalCost, SearchConfig, SearchEngine, Volume, Voxel};

fn uniform_volume(w: i64, h: i64, d: i64, value: f64) -> Arc<DenseVolume> {
    Arc::new(DenseVolume::new(w, h, d, Calibration::isotropic(1.0, "um"), BitDepth::Eight, value))
}

#[test]
fn straight_line_uniform_cost() {
    let volume = uniform_volume(100, 10, 10, 128.0);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let config = SearchConfig::bidirectional_astar(Voxel::new(0, 5, 5), Voxel::new(99, 5, 5));
    let engine = SearchEngine::new(volume, cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    let path = outcome.path.expect("successful search must carry a path");
    assert_eq!(path.len(), 100);

    let total_length: f64 = path
        .points()
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
        })
        .sum();
    assert!((total_length - 99.0).abs() < 1e-6, "total_length={total_length}");
}

#[test]
fn l_shaped_bright_tube_avoids_dark_region() {
    let w = 64;
    let mut data = vec![0.0; (w * w) as usize];
    for x in 0..32 {
        data[(x + 32 * w) as usize] = 255.0;
    }
    for y in 32..64 {
        data[(31 + y * w) as usize] = 255.0;
    }
    let volume = Arc::new(DenseVolume::from_data(w, w, 1, Calibration::isotropic(1.0, "um"), BitDepth::Eight, data));
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let config = SearchConfig::unidirectional_astar(Voxel::new(0, 32, 0), Voxel::new(31, 63, 0));
    let engine = SearchEngine::new(volume.clone(), cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    let path = outcome.path.unwrap();
    assert!(path.len() <= 64);
    for voxel in path.to_voxels(volume.calibration()) {
        assert!(
            volume.value(voxel.x, voxel.y, voxel.z) > 0.0,
            "path entered the zero-intensity region at {voxel:?}"
        );
    }
}

#[test]
fn barrier_forces_a_single_voxel_detour() {
    let w = 20;
    let mut data = vec![200.0; (w * w) as usize];
    for y in 0..19 {
        data[(10 + y * w) as usize] = 0.0;
    }
    let volume = Arc::new(DenseVolume::from_data(w, w, 1, Calibration::isotropic(1.0, "um"), BitDepth::Eight, data));
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let config = SearchConfig::bidirectional_astar(Voxel::new(0, 10, 0), Voxel::new(19, 10, 0));
    let engine = SearchEngine::new(volume.clone(), cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    let path = outcome.path.unwrap();
    let voxels = path.to_voxels(volume.calibration());
    assert!(voxels.contains(&Voxel::new(10, 19, 0)), "path did not detour through the open gap at y=19");
}

#[test]
fn bidirectional_meeting_matches_unidirectional_cost() {
    let volume = uniform_volume(200, 1, 1, 100.0);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let start = Voxel::new(0, 0, 0);
    let goal = Voxel::new(199, 0, 0);

    let uni = SearchEngine::new(volume.clone(), cost.clone(), SearchConfig::unidirectional_astar(start, goal))
        .unwrap()
        .run();
    let bi = SearchEngine::new(volume, cost, SearchConfig::bidirectional_astar(start, goal)).unwrap().run();

    assert_eq!(uni.exit_reason, ExitReason::Success);
    assert_eq!(bi.exit_reason, ExitReason::Success);

    let path_length = |outcome: &snt_core::SearchOutcome| -> f64 {
        outcome
            .path
            .as_ref()
            .unwrap()
            .points()
            .windows(2)
            .map(|w| {
                let (a, b) = (w[0], w[1]);
                ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
            })
            .sum()
    };
    assert!((path_length(&uni) - path_length(&bi)).abs() < 1e-6);

    let ratio = (bi.closed_start as f64 - bi.closed_goal as f64).abs() / bi.closed_start.max(bi.closed_goal) as f64;
    assert!(ratio <= 0.2, "closed-side imbalance too large: start={} goal={}", bi.closed_start, bi.closed_goal);
}
