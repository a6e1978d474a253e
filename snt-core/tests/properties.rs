//! Boundary behaviours and quantified properties that don't need their own
//! scenario file: 2D input, the start==goal degenerate case, cooperative
//! cancellation, and the Dijkstra fill's threshold boundedness (P6).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use snt_core::{BitDepth, Calibration, DenseVolume, ExitReason, FillConfig, FillEngine, ReciprocalCost, SearchConfig, SearchEngine, Voxel};

fn uniform_volume_2d(n: i64, value: f64) -> Arc<DenseVolume> {
    Arc::new(DenseVolume::new(n, n, 1, Calibration::isotropic(1.0, "um"), BitDepth::Eight, value))
}

#[test]
fn two_dimensional_input_searches_without_z_division_by_zero() {
    let volume = uniform_volume_2d(16, 128.0);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let config = SearchConfig::bidirectional_astar(Voxel::new(0, 0, 0), Voxel::new(15, 15, 0));
    let engine = SearchEngine::new(volume, cost, config).unwrap();
    let outcome = engine.run();
    assert_eq!(outcome.exit_reason, ExitReason::Success);
    assert!(outcome.path.unwrap().points().iter().all(|p| p.z == 0.0));
}

#[test]
fn endpoint_equals_start_is_immediate_one_node_success() {
    let volume = uniform_volume_2d(8, 128.0);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let start = Voxel::new(3, 3, 0);
    let config = SearchConfig::unidirectional_astar(start, start);
    let engine = SearchEngine::new(volume, cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    let path = outcome.path.unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(outcome.closed_start, 0);
}

#[test]
fn cancellation_is_observed_well_within_the_report_interval() {
    let volume = uniform_volume_2d(400, 128.0);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    let mut config = SearchConfig::bidirectional_astar(Voxel::new(0, 0, 0), Voxel::new(399, 399, 0));
    config.report_interval = Duration::from_millis(20);
    let engine = SearchEngine::new(volume, cost, config).unwrap();
    let token = engine.cancellation_token();

    let handle = thread::spawn(move || engine.run());
    thread::sleep(Duration::from_millis(5));
    token.cancel();
    let outcome = handle.join().unwrap();

    assert_eq!(outcome.exit_reason, ExitReason::Cancelled);
    assert!(outcome.path.is_none());
}

#[test]
fn dijkstra_fill_never_inserts_a_node_past_the_draw_threshold() {
    let volume = uniform_volume_2d(40, 100.0);
    let cost = Arc::new(snt_core::MaxScalingCost::new(volume.clone(), 100.0));
    let threshold = 5.0 * (1.0 / 100.0);
    let config = FillConfig::new(vec![Voxel::new(20, 20, 0)], threshold);
    let engine = FillEngine::new(volume, cost, config).unwrap();
    let outcome = engine.run();

    assert_eq!(outcome.exit_reason, ExitReason::Success);
    for (_, g) in outcome.reached() {
        assert!(g <= threshold + 1e-9, "node g={} exceeded threshold={}", g, threshold);
    }
}
