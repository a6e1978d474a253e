//! The Hessian Filter Engine: tubeness / Frangi vesselness over one or more
//! Gaussian scales, tiled into memory-bounded blocks and parallelised across
//! voxels within a block with `rayon`.
//!
//! Follows the `rayon`-parallel contraction pass in `step7.rs` for the shape
//! of building a fixed-size thread pool and running `par_iter` over a
//! disjoint range, writing into an owned output buffer. Uses safe
//! `par_iter().collect()` into an intermediate `Vec` rather than raw-pointer
//! `unsafe` writes, since each block's output region is already disjoint
//! without needing to alias a shared buffer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use rayon::prelude::*;

use super::block::{self, Block, BlockSize};
use super::eigen::{eigen_sym2, eigen_sym3};
use super::gaussian;
use crate::error::{ExitReason, Result, SntError};
use crate::progress::CancellationToken;
use crate::volume::{BitDepth, DenseVolume, Volume};

const DEFAULT_MEMORY_BUDGET_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Tubeness,
    Frangi,
}

/// Plain, serde-serialisable configuration: callers can load this from
/// TOML/JSON or build it in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HessianConfig {
    pub scales: Vec<f64>,
    pub alpha: f64,
    pub beta: f64,
    pub num_threads: usize,
    pub block_size: Option<[i64; 3]>,
    pub memory_budget_bytes: Option<usize>,
    /// Exposes the older, unscaled Hessian behaviour (no `sigma_mean^2`
    /// normalisation) for exact visual parity with legacy output; defaults
    /// to `false` (the scaled, tiled-engine semantics).
    pub legacy_unscaled: bool,
}

impl Default for HessianConfig {
    fn default() -> Self {
        HessianConfig {
            scales: vec![1.0],
            alpha: 0.5,
            beta: 0.5,
            num_threads: num_cpus::get(),
            block_size: None,
            memory_budget_bytes: None,
            legacy_unscaled: false,
        }
    }
}

impl HessianConfig {
    fn validate(&self) -> Result<()> {
        if self.scales.is_empty() {
            return Err(SntError::InvalidArgument("hessian config requires at least one scale".into()));
        }
        if self.scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(SntError::InvalidArgument("hessian scales must be finite and positive".into()));
        }
        Ok(())
    }
}

pub struct HessianOutcome {
    pub volume: DenseVolume,
    pub exit_reason: ExitReason,
}

pub struct HessianEngine {
    volume: Arc<dyn Volume>,
    config: HessianConfig,
    cancellation: CancellationToken,
}

struct VoxelEigen {
    e0: f64,
    e1: f64,
    e2: f64,
    frob_sq: f64,
}

impl HessianEngine {
    pub fn new(volume: Arc<dyn Volume>, config: HessianConfig) -> Result<Self> {
        config.validate()?;
        Ok(HessianEngine {
            volume,
            config,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn run(&self, kind: ResponseKind) -> Result<HessianOutcome> {
        let width = self.volume.width();
        let height = self.volume.height();
        let depth = self.volume.depth();
        let is_2d = self.volume.is_2d();
        let calibration = self.volume.calibration().clone();

        let budget = self.config.memory_budget_bytes.unwrap_or(DEFAULT_MEMORY_BUDGET_BYTES);
        let block_size = match self.config.block_size {
            Some([x, y, z]) => BlockSize { x, y, z },
            None => block::plan_block_size(width, height, depth, budget)?,
        };
        let blocks = block::tile(width, height, depth, block_size);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads.max(1))
            .build()
            .map_err(|e| SntError::InvalidArgument(format!("failed to build hessian thread pool: {e}")))?;

        let mut output = vec![f64::NEG_INFINITY; (width * height * depth) as usize];
        let mut c_running_max_frob_sq: f64 = 0.0;
        let mut exit_reason = ExitReason::Success;

        'scales: for &scale in &self.config.scales {
            let sigma_axis = (
                scale / calibration.sx,
                scale / calibration.sy,
                if is_2d { 0.0 } else { scale / calibration.sz },
            );
            let sigma_mean = if is_2d {
                (sigma_axis.0 + sigma_axis.1) / 2.0
            } else {
                (sigma_axis.0 + sigma_axis.1 + sigma_axis.2) / 3.0
            };
            let sigma_sq = if self.config.legacy_unscaled { 1.0 } else { sigma_mean * sigma_mean };
            // +1 over the Gaussian kernel's own support: the gradient stage
            // reads the smoothed volume at +-1, and the Hessian stage then
            // reads the gradient volume at +-1, so the smoothed buffer needs
            // two full voxels of margin beyond the innermost block voxel.
            let pad = (3.0_f64 * sigma_axis.0.max(sigma_axis.1).max(sigma_axis.2)).ceil().max(2.0) as i64;

            for block in &blocks {
                if self.cancellation.is_cancelled() {
                    exit_reason = ExitReason::Cancelled;
                    break 'scales;
                }

                let (voxel_eigen, bw, bh, bd) =
                    self.block_eigen(&pool, block, is_2d, sigma_axis, sigma_sq, pad);

                let block_max_frob = voxel_eigen.iter().map(|v| v.frob_sq).fold(0.0_f64, f64::max);
                c_running_max_frob_sq = c_running_max_frob_sq.max(block_max_frob);
                let c = (0.5 * c_running_max_frob_sq.sqrt()).max(1e-12);

                let responses: Vec<f64> = pool.install(|| {
                    voxel_eigen
                        .par_iter()
                        .map(|v| response_value(kind, v, is_2d, self.config.alpha, self.config.beta, c, scale))
                        .collect()
                });

                for (i, &resp) in responses.iter().enumerate() {
                    let lx = (i as i64) % bw;
                    let ly = ((i as i64) / bw) % bh;
                    let lz = (i as i64) / (bw * bh);
                    let gx = block.x0 + lx;
                    let gy = block.y0 + ly;
                    let gz = if is_2d { 0 } else { block.z0 + lz };
                    let out_idx = (gx + gy * width + gz * width * height) as usize;
                    if resp.is_finite() && resp > output[out_idx] {
                        output[out_idx] = resp;
                    }
                }

                info!(
                    x0 = block.x0, y0 = block.y0, z0 = block.z0,
                    scale, "hessian block complete"
                );
            }
        }

        for v in &mut output {
            if !v.is_finite() {
                *v = 0.0;
            }
        }

        info!(blocks = blocks.len(), scales = self.config.scales.len(), ?exit_reason, "hessian run finished");

        Ok(HessianOutcome {
            volume: DenseVolume::from_data(width, height, depth, calibration, BitDepth::ThirtyTwoFloat, output),
            exit_reason,
        })
    }

    fn block_eigen(
        &self,
        pool: &rayon::ThreadPool,
        block: &Block,
        is_2d: bool,
        sigma_axis: (f64, f64, f64),
        sigma_sq: f64,
        pad: i64,
    ) -> (Vec<VoxelEigen>, i64, i64, i64) {
        let bw = block.width();
        let bh = block.height();
        let bd = if is_2d { 1 } else { block.depth() };

        let pad_w = bw + 2 * pad;
        let pad_h = bh + 2 * pad;
        let pad_d = if is_2d { 1 } else { bd + 2 * pad };

        let mut padded = vec![0.0; (pad_w * pad_h * pad_d) as usize];
        for lz in 0..pad_d {
            for ly in 0..pad_h {
                for lx in 0..pad_w {
                    let vx = block.x0 + lx - pad;
                    let vy = block.y0 + ly - pad;
                    let vz = if is_2d { 0 } else { block.z0 + lz - pad };
                    let v = sample_mirrored(self.volume.as_ref(), vx, vy, vz);
                    padded[(lx + ly * pad_w + lz * pad_w * pad_h) as usize] = v;
                }
            }
        }

        let smoothed = gaussian::convolve_separable_3d(&padded, (pad_w, pad_h, pad_d), sigma_axis);
        let (gx, gy, gz) = gradient_volume(&smoothed, (pad_w, pad_h, pad_d), is_2d);

        let n = (bw * bh * bd) as usize;
        let eigen = pool.install(|| {
            (0..n)
                .into_par_iter()
                .map(|idx| {
                    let lx = (idx as i64) % bw;
                    let ly = ((idx as i64) / bw) % bh;
                    let lz = (idx as i64) / (bw * bh);
                    let px = lx + pad;
                    let py = ly + pad;
                    let pz = if is_2d { 0 } else { lz + pad };
                    voxel_eigen(&gx, &gy, &gz, (pad_w, pad_h, pad_d), (px, py, pz), is_2d, sigma_sq)
                })
                .collect::<Vec<_>>()
        });

        (eigen, bw, bh, bd)
    }
}

/// First-derivative (gradient) volume, one component per axis, via central
/// differences over `smoothed`. Computed on the interior only (excluding the
/// outer single-voxel shell): the Hessian stage never reads a gradient
/// voxel closer than one voxel from `smoothed`'s own true edge, since `pad`
/// always carries at least two voxels of margin beyond the block interior.
fn gradient_volume(smoothed: &[f64], dims: (i64, i64, i64), is_2d: bool) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let (w, h, d) = dims;
    let len = (w * h * d) as usize;
    let mut gx = vec![0.0; len];
    let mut gy = vec![0.0; len];
    let mut gz = vec![0.0; len];

    let z_range = if is_2d { 0..1 } else { 1..d - 1 };
    for z in z_range {
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let idx = (x + y * w + z * w * h) as usize;
                gx[idx] = (at(smoothed, dims, x + 1, y, z) - at(smoothed, dims, x - 1, y, z)) / 2.0;
                gy[idx] = (at(smoothed, dims, x, y + 1, z) - at(smoothed, dims, x, y - 1, z)) / 2.0;
                if !is_2d {
                    gz[idx] = (at(smoothed, dims, x, y, z + 1) - at(smoothed, dims, x, y, z - 1)) / 2.0;
                }
            }
        }
    }
    (gx, gy, gz)
}

/// Mirrors at the true volume boundary (never at a block boundary, so
/// adjacent blocks agree on overlapping reads).
fn sample_mirrored(volume: &dyn Volume, x: i64, y: i64, z: i64) -> f64 {
    let mirror = |i: i64, extent: i64| -> i64 {
        if extent <= 1 {
            return 0;
        }
        let period = 2 * (extent - 1);
        let mut v = i % period;
        if v < 0 {
            v += period;
        }
        if v >= extent {
            v = period - v;
        }
        v
    };
    let xi = mirror(x, volume.width());
    let yi = mirror(y, volume.height());
    let zi = if volume.is_2d() { 0 } else { mirror(z, volume.depth()) };
    volume.value(xi, yi, zi)
}

#[inline]
fn at(buf: &[f64], dims: (i64, i64, i64), x: i64, y: i64, z: i64) -> f64 {
    let (w, h, _d) = dims;
    buf[(x + y * w + z * w * h) as usize]
}

/// Derives the Hessian at `p` by differencing the gradient volume a second
/// time (diagonal terms: own-axis derivative of the matching gradient
/// component; off-diagonal terms: cross-axis derivative of either
/// contributing component, since both give the same discrete value).
fn voxel_eigen(
    gx: &[f64],
    gy: &[f64],
    gz: &[f64],
    dims: (i64, i64, i64),
    p: (i64, i64, i64),
    is_2d: bool,
    sigma_sq: f64,
) -> VoxelEigen {
    let (x, y, z) = p;
    let hxx = (at(gx, dims, x + 1, y, z) - at(gx, dims, x - 1, y, z)) / 2.0;
    let hyy = (at(gy, dims, x, y + 1, z) - at(gy, dims, x, y - 1, z)) / 2.0;
    let hxy = (at(gx, dims, x, y + 1, z) - at(gx, dims, x, y - 1, z)) / 2.0;

    if is_2d {
        let (a, b, c) = (hxx * sigma_sq, hxy * sigma_sq, hyy * sigma_sq);
        let (e0, e1) = eigen_sym2(a, b, c);
        let frob_sq = a * a + c * c + 2.0 * b * b;
        VoxelEigen { e0, e1, e2: 0.0, frob_sq }
    } else {
        let hzz = (at(gz, dims, x, y, z + 1) - at(gz, dims, x, y, z - 1)) / 2.0;
        let hxz = (at(gx, dims, x, y, z + 1) - at(gx, dims, x, y, z - 1)) / 2.0;
        let hyz = (at(gy, dims, x, y, z + 1) - at(gy, dims, x, y, z - 1)) / 2.0;

        let (a, b, c) = (hxx * sigma_sq, hyy * sigma_sq, hzz * sigma_sq);
        let (d, e, f) = (hxy * sigma_sq, hxz * sigma_sq, hyz * sigma_sq);
        let (e0, e1, e2) = eigen_sym3(a, b, c, d, e, f);
        let frob_sq = a * a + b * b + c * c + 2.0 * (d * d + e * e + f * f);
        VoxelEigen { e0, e1, e2, frob_sq }
    }
}

fn response_value(kind: ResponseKind, v: &VoxelEigen, is_2d: bool, alpha: f64, beta: f64, c: f64, scale: f64) -> f64 {
    let sigma_sq = scale * scale;
    match (kind, is_2d) {
        (ResponseKind::Tubeness, true) => {
            if v.e1 < 0.0 {
                (-v.e1).max(0.0) * sigma_sq
            } else {
                0.0
            }
        }
        (ResponseKind::Tubeness, false) => {
            if v.e1 < 0.0 && v.e2 < 0.0 {
                (v.e1 * v.e2).max(0.0).sqrt() * sigma_sq
            } else {
                0.0
            }
        }
        (ResponseKind::Frangi, true) => {
            if v.e1 >= 0.0 {
                return 0.0;
            }
            let blobness = v.e0 / v.e1;
            let s = (v.e0 * v.e0 + v.e1 * v.e1).sqrt();
            (-blobness * blobness / (2.0 * beta * beta)).exp() * (1.0 - (-s * s / (2.0 * c * c)).exp())
        }
        (ResponseKind::Frangi, false) => {
            if v.e1 >= 0.0 || v.e2 >= 0.0 {
                return 0.0;
            }
            let r_a = v.e1.abs() / v.e2.abs();
            let r_b = v.e0.abs() / (v.e1.abs() * v.e2.abs()).sqrt();
            let s = (v.e0 * v.e0 + v.e1 * v.e1 + v.e2 * v.e2).sqrt();
            (1.0 - (-r_a * r_a / (2.0 * alpha * alpha)).exp())
                * (-r_b * r_b / (2.0 * beta * beta)).exp()
                * (1.0 - (-s * s / (2.0 * c * c)).exp())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;

    fn flat_volume(n: i64, fill: f64) -> Arc<DenseVolume> {
        Arc::new(DenseVolume::new(n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::Eight, fill))
    }

    #[test]
    fn flat_volume_has_zero_tubeness_everywhere() {
        let volume = flat_volume(16, 100.0);
        let config = HessianConfig {
            scales: vec![1.5],
            num_threads: 1,
            ..HessianConfig::default()
        };
        let engine = HessianEngine::new(volume, config).unwrap();
        let outcome = engine.run(ResponseKind::Tubeness).unwrap();
        assert_eq!(outcome.exit_reason, ExitReason::Success);
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    assert!(outcome.volume.value(x, y, z).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn repeated_runs_are_bitwise_identical() {
        let mut data = vec![0.0; 12 * 12 * 12];
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i * 37) % 251) as f64;
        }
        let volume = Arc::new(DenseVolume::from_data(
            12, 12, 12, Calibration::isotropic(1.0, "um"), BitDepth::ThirtyTwoFloat, data,
        ));
        let config = HessianConfig {
            scales: vec![1.0, 1.5],
            num_threads: 4,
            block_size: Some([8, 8, 8]),
            ..HessianConfig::default()
        };
        let engine1 = HessianEngine::new(volume.clone(), config.clone()).unwrap();
        let engine2 = HessianEngine::new(volume, config).unwrap();
        let a = engine1.run(ResponseKind::Frangi).unwrap().volume;
        let b = engine2.run(ResponseKind::Frangi).unwrap().volume;
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn bright_cylinder_has_high_tubeness_on_axis() {
        let n = 24;
        let mut data = vec![10.0; (n * n * n) as usize];
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let dx = (x - n / 2) as f64;
                    let dy = (y - n / 2) as f64;
                    let r2 = dx * dx + dy * dy;
                    let idx = (x + y * n + z * n * n) as usize;
                    data[idx] = 10.0 + 200.0 * (-r2 / (2.0 * 4.0)).exp();
                }
            }
        }
        let volume = Arc::new(DenseVolume::from_data(
            n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::ThirtyTwoFloat, data,
        ));
        let config = HessianConfig {
            scales: vec![1.5, 2.0, 2.5],
            num_threads: 2,
            ..HessianConfig::default()
        };
        let engine = HessianEngine::new(volume, config).unwrap();
        let outcome = engine.run(ResponseKind::Tubeness).unwrap();
        let (_, vmax) = outcome.volume.min_max();
        let on_axis = outcome.volume.value(n / 2, n / 2, n / 2);
        let corner = outcome.volume.value(1, 1, 1);
        assert!(on_axis >= 0.5 * vmax, "on_axis={on_axis} vmax={vmax}");
        assert!(corner <= 0.2 * vmax, "corner={corner} vmax={vmax}");
    }
}
