//! Cost functions: per-voxel movement cost with a guaranteed lower bound,
//! used both to weight search edges and to scale the A* heuristic.
//!
//! Follows the routing profile pattern in `profiles/car.rs` and
//! `profiles/bike.rs`: a small trait implemented by several concrete,
//! table-free structs, each owning exactly the parameters it needs and
//! nothing from the others.

use std::sync::Arc;

use crate::volume::{BitDepth, Volume};

/// Smallest positive float representable without losing precision when
/// scaled into `[0, 256)`; guards the `Reciprocal`/`MaxScaling` division
/// against a literal zero input.
const RECIPROCAL_EPSILON: f64 = 256.0 * 0.5 * (f32::MIN_POSITIVE as f64) / (f32::MAX as f64);

/// `cost_moving_to` returns a strictly positive step cost; `min_cost_per_unit_distance`
/// is a lower bound on it, used to scale the A* heuristic so it stays
/// consistent (`h(u) <= d(u,v)*c_min + h(v)`).
pub trait CostFunction: Send + Sync {
    fn cost_moving_to(&self, value: f64) -> f64;
    fn min_cost_per_unit_distance(&self) -> f64;
}

fn scale_to_256(value: f64, bit_depth: BitDepth, vmin: f64, vmax: f64) -> f64 {
    match bit_depth {
        BitDepth::Eight => value,
        _ => {
            if vmax > vmin {
                256.0 * (value - vmin) / (vmax - vmin)
            } else {
                0.0
            }
        }
    }
}

/// Default cost variant. Scales the voxel value into `[0, 256)` (as-is for
/// 8-bit volumes, min/max-normalised otherwise) and inverts it.
///
/// Deliberately does **not** reproduce the legacy `AbstractSearch` behaviour
/// of returning a flat `2.0` for zero-valued voxels (see DESIGN.md); instead
/// a tiny epsilon keeps the reciprocal finite without creating an artificial
/// cheap lane through zero intensity. Prefer [`MaxScalingCost`] for new
/// integrations.
pub struct ReciprocalCost {
    volume: Arc<dyn Volume>,
    vmin: f64,
    vmax: f64,
}

impl ReciprocalCost {
    pub fn new(volume: Arc<dyn Volume>) -> Self {
        let (vmin, vmax) = min_max_of(volume.as_ref());
        ReciprocalCost { volume, vmin, vmax }
    }
}

impl CostFunction for ReciprocalCost {
    fn cost_moving_to(&self, value: f64) -> f64 {
        let scaled = scale_to_256(value, self.volume.bit_depth(), self.vmin, self.vmax);
        1.0 / scaled.max(RECIPROCAL_EPSILON)
    }

    fn min_cost_per_unit_distance(&self) -> f64 {
        1.0 / 256.0
    }
}

/// Like [`ReciprocalCost`] but with a caller-specified maximum scaled value
/// instead of the fixed `256`. Recommended default per DESIGN.md: it
/// replaces the legacy zero-cost special case with a principled
/// `reciprocal_fudge` floor.
pub struct MaxScalingCost {
    volume: Arc<dyn Volume>,
    vmin: f64,
    vmax: f64,
    max_value: f64,
    reciprocal_fudge: f64,
}

impl MaxScalingCost {
    pub fn new(volume: Arc<dyn Volume>, max_value: f64) -> Self {
        assert!(max_value > 0.0, "max_value must be positive");
        let (vmin, vmax) = min_max_of(volume.as_ref());
        MaxScalingCost {
            volume,
            vmin,
            vmax,
            max_value,
            reciprocal_fudge: RECIPROCAL_EPSILON,
        }
    }
}

impl CostFunction for MaxScalingCost {
    fn cost_moving_to(&self, value: f64) -> f64 {
        let scaled = scale_to_256(value, self.volume.bit_depth(), self.vmin, self.vmax)
            * (self.max_value / 256.0);
        1.0 / scaled.max(self.reciprocal_fudge)
    }

    fn min_cost_per_unit_distance(&self) -> f64 {
        1.0 / self.max_value
    }
}

fn min_max_of(volume: &dyn Volume) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for z in 0..volume.depth() {
        for y in 0..volume.height() {
            for x in 0..volume.width() {
                let v = volume.value(x, y, z);
                if v < lo {
                    lo = v;
                }
                if v > hi {
                    hi = v;
                }
            }
        }
    }
    (lo, hi)
}

/// Hastings-style rational approximation of `erf`, accurate to ~1.5e-7.
/// Used by the probabilistic cost variants; kept dependency-free.
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

fn mean_stdev(volume: &dyn Volume) -> (f64, f64) {
    let mut sum = 0.0;
    let mut count = 0.0;
    for z in 0..volume.depth() {
        for y in 0..volume.height() {
            for x in 0..volume.width() {
                sum += volume.value(x, y, z);
                count += 1.0;
            }
        }
    }
    let mean = sum / count.max(1.0);

    let mut sq = 0.0;
    for z in 0..volume.depth() {
        for y in 0..volume.height() {
            for x in 0..volume.width() {
                let d = volume.value(x, y, z) - mean;
                sq += d * d;
            }
        }
    }
    let stdev = (sq / count.max(1.0)).sqrt();
    (mean, stdev)
}

/// Shared shape for the probabilistic variants: `cost = 1 - erf(0.8 * z)`
/// where `z` is the voxel's z-score against a volume's own mean/stdev.
struct ProbabilisticShape {
    volume: Arc<dyn Volume>,
    mean: f64,
    stdev: f64,
    lower_bound: f64,
}

impl ProbabilisticShape {
    fn new(volume: Arc<dyn Volume>) -> Self {
        let (mean, stdev) = mean_stdev(volume.as_ref());
        let stdev = if stdev > 0.0 { stdev } else { 1.0 };

        // The response is maximised (driving z to its largest value) at the
        // volume's maximum; the cost there, plus a tiny epsilon, is this
        // cost function's lower bound.
        let (_, vmax) = min_max_of(volume.as_ref());
        let z_at_max = (vmax - mean) / stdev;
        let lower_bound = (1.0 - erf(0.8 * z_at_max)).max(0.0) + 1e-9;

        ProbabilisticShape {
            volume,
            mean,
            stdev,
            lower_bound,
        }
    }

    fn cost(&self, value: f64) -> f64 {
        let z = (value - self.mean) / self.stdev;
        (1.0 - erf(0.8 * z)).max(self.lower_bound)
    }
}

/// Cost over a precomputed Frangi vesselness volume, scored against its own
/// mean/stdev.
pub struct FrangiProbabilisticCost {
    shape: ProbabilisticShape,
}

impl FrangiProbabilisticCost {
    pub fn new(frangi_volume: Arc<dyn Volume>) -> Self {
        FrangiProbabilisticCost {
            shape: ProbabilisticShape::new(frangi_volume),
        }
    }
}

impl CostFunction for FrangiProbabilisticCost {
    fn cost_moving_to(&self, value: f64) -> f64 {
        self.shape.cost(value)
    }

    fn min_cost_per_unit_distance(&self) -> f64 {
        self.shape.lower_bound
    }
}

/// Standalone `1 - erf(0.8*z)` cost over an arbitrary pre-scored volume (for
/// instance a tubeness response rather than Frangi), kept distinct from
/// [`FrangiProbabilisticCost`] because each owns an independent mean/stdev
/// cache over a potentially different volume.
pub struct OneMinusErfCost {
    shape: ProbabilisticShape,
}

impl OneMinusErfCost {
    pub fn new(scored_volume: Arc<dyn Volume>) -> Self {
        OneMinusErfCost {
            shape: ProbabilisticShape::new(scored_volume),
        }
    }
}

impl CostFunction for OneMinusErfCost {
    fn cost_moving_to(&self, value: f64) -> f64 {
        self.shape.cost(value)
    }

    fn min_cost_per_unit_distance(&self) -> f64 {
        self.shape.lower_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use crate::volume::DenseVolume;

    #[test]
    fn reciprocal_cost_is_bounded_below() {
        let v = Arc::new(DenseVolume::new(2, 2, 1, Calibration::isotropic(1.0, "um"), BitDepth::Eight, 255.0));
        let cost = ReciprocalCost::new(v);
        assert!(cost.cost_moving_to(255.0) >= cost.min_cost_per_unit_distance() - 1e-12);
        assert!(cost.cost_moving_to(0.0).is_finite());
    }

    #[test]
    fn max_scaling_matches_reciprocal_at_256() {
        let v = Arc::new(DenseVolume::new(2, 2, 1, Calibration::isotropic(1.0, "um"), BitDepth::Eight, 128.0));
        let recip = ReciprocalCost::new(v.clone());
        let maxs = MaxScalingCost::new(v, 256.0);
        assert!((recip.cost_moving_to(128.0) - maxs.cost_moving_to(128.0)).abs() < 1e-9);
    }

    #[test]
    fn erf_matches_known_values() {
        assert!((erf(0.0)).abs() < 1e-9);
        assert!((erf(1.0) - 0.8427007929497149).abs() < 1e-6);
        assert!((erf(-1.0) + 0.8427007929497149).abs() < 1e-6);
    }
}
