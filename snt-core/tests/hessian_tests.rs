//! Frangi vesselness on a synthetic tube, and determinism across thread
//! counts (P8).

use std::sync::Arc;

use snt_core::{BitDepth, Calibration, DenseVolume, HessianConfig, HessianEngine, ResponseKind, Volume};

fn gaussian_cylinder(n: i64) -> Arc<DenseVolume> {
    let mut data = vec![0.0; (n * n * n) as usize];
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let dx = (x - n / 2) as f64;
                let dy = (y - n / 2) as f64;
                let r2 = dx * dx + dy * dy;
                data[(x + y * n + z * n * n) as usize] = 20.0 + 400.0 * (-r2 / (2.0 * 2.0 * 2.0)).exp();
            }
        }
    }
    Arc::new(DenseVolume::from_data(n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::ThirtyTwoFloat, data))
}

#[test]
fn frangi_response_is_high_on_axis_low_in_background() {
    let n = 32;
    let volume = gaussian_cylinder(n);
    let config = HessianConfig {
        scales: vec![1.5, 2.0, 2.5],
        num_threads: 2,
        ..HessianConfig::default()
    };
    let engine = HessianEngine::new(volume.clone(), config).unwrap();
    let outcome = engine.run(ResponseKind::Frangi).unwrap();
    let (_, vmax) = outcome.volume.min_max();

    let on_axis = outcome.volume.value(n / 2, n / 2, n / 2);
    assert!(on_axis >= 0.8 * vmax, "on_axis={on_axis} vmax={vmax}");

    let background = outcome.volume.value(2, 2, n / 2);
    assert!(background <= 0.05 * vmax, "background={background} vmax={vmax}");
}

#[test]
fn hessian_output_is_deterministic_across_thread_counts() {
    let n = 20;
    let volume = gaussian_cylinder(n);

    let run_with = |threads: usize| {
        let config = HessianConfig {
            scales: vec![1.0, 1.8],
            num_threads: threads,
            block_size: Some([10, 10, 10]),
            ..HessianConfig::default()
        };
        HessianEngine::new(volume.clone(), config).unwrap().run(ResponseKind::Frangi).unwrap().volume
    };

    let single = run_with(1);
    let multi = run_with(4);
    assert_eq!(single.data(), multi.data());
}
