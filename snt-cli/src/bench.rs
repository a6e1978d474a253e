//! `snt-bench`: a small timing harness over synthetic volumes, printed as
//! plain text rather than wired into a benchmarking harness; enough to
//! sanity-check thread-count scaling of the Hessian engine and search cost
//! on a developer machine without pulling in an extra dependency.

use std::sync::Arc;
use std::time::Instant;

use snt_core::{BitDepth, Calibration, DenseVolume, HessianConfig, HessianEngine, ReciprocalCost, ResponseKind, SearchConfig, SearchEngine, Voxel};

fn synthetic_volume(n: i64) -> Arc<DenseVolume> {
    let mut data = vec![0.0; (n * n * n) as usize];
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let dx = (x - n / 2) as f64;
                let dy = (y - n / 2) as f64;
                let r2 = dx * dx + dy * dy;
                data[(x + y * n + z * n * n) as usize] = 10.0 + 200.0 * (-r2 / 8.0).exp();
            }
        }
    }
    Arc::new(DenseVolume::from_data(n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::ThirtyTwoFloat, data))
}

fn bench_hessian(n: i64) {
    let volume = synthetic_volume(n);
    for &threads in &[1usize, 2, 4, num_cpus::get()] {
        let config = HessianConfig {
            scales: vec![1.0, 1.5, 2.0],
            num_threads: threads,
            ..HessianConfig::default()
        };
        let engine = HessianEngine::new(volume.clone(), config).expect("valid hessian config");
        let start = Instant::now();
        let outcome = engine.run(ResponseKind::Frangi).expect("hessian run");
        println!(
            "hessian n={n} threads={threads} elapsed={:?} exit={:?}",
            start.elapsed(),
            outcome.exit_reason
        );
    }
}

fn bench_search(n: i64) {
    let volume = synthetic_volume(n);
    let cost = Arc::new(ReciprocalCost::new(volume.clone()));
    for &bidirectional in &[false, true] {
        let config = SearchConfig {
            bidirectional,
            ..SearchConfig::unidirectional_astar(Voxel::new(0, 0, 0), Voxel::new(n - 1, n - 1, n - 1))
        };
        let engine = SearchEngine::new(volume.clone(), cost.clone(), config).expect("valid search config");
        let start = Instant::now();
        let outcome = engine.run();
        println!(
            "search n={n} bidirectional={bidirectional} elapsed={:?} exit={:?} closed={}",
            start.elapsed(),
            outcome.exit_reason,
            outcome.closed_start + outcome.closed_goal
        );
    }
}

fn main() {
    for &n in &[16, 32] {
        bench_hessian(n);
        bench_search(n);
    }
}
