//! The Fill Engine: bounded Dijkstra expansion from one or more seed voxels,
//! producing a `NodeStore` of reached voxels and their distances rather than
//! a single `Path`.
//!
//! This reuses [`crate::engine_core::Frontier`] and
//! [`crate::engine_core::relax`] with `defined_goal = false` instead of
//! branching off a separate relaxation routine: a fill is exactly a search
//! that never gets a heuristic and never checks for a goal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, info_span};

use crate::calibration::Voxel;
use crate::cost::CostFunction;
use crate::engine_core::{neighbours, relax, Frontier, RelaxOutcome};
use crate::error::ExitReason;
use crate::node::NodeStatus;
use crate::progress::{CancellationToken, ProgressEvent, ReportThrottle};
use crate::volume::Volume;

#[derive(Debug, Clone)]
pub struct FillConfig {
    pub seeds: Vec<Voxel>,
    pub draw_threshold: f64,
    pub timeout: Option<Duration>,
    pub report_interval: Duration,
}

impl FillConfig {
    pub fn new(seeds: Vec<Voxel>, draw_threshold: f64) -> Self {
        FillConfig {
            seeds,
            draw_threshold,
            timeout: None,
            report_interval: Duration::from_millis(250),
        }
    }
}

/// Result of a completed (or aborted) fill run. The `NodeStore` inside
/// `frontier` carries every reached voxel's distance (`g`) from its nearest
/// seed, which is what callers rasterise into an intensity/mask/distance
/// volume.
pub struct FillOutcome {
    pub exit_reason: ExitReason,
    pub(crate) frontier: Frontier,
}

impl FillOutcome {
    pub fn distance(&self, voxel: Voxel) -> Option<f64> {
        self.frontier.store.get(voxel).map(|n| n.g)
    }

    pub fn reached_count(&self) -> usize {
        self.frontier.closed_count()
    }

    /// Every reached (CLOSED) voxel and its distance from the nearest seed.
    pub fn reached(&self) -> impl Iterator<Item = (Voxel, f64)> + '_ {
        self.frontier
            .store
            .iter_with_z()
            .filter(|(_, n)| n.status.is_closed())
            .map(|(v, n)| (v, n.g))
    }
}

pub struct FillEngine {
    volume: Arc<dyn Volume>,
    cost_fn: Arc<dyn CostFunction>,
    config: FillConfig,
    cancellation: CancellationToken,
}

impl FillEngine {
    pub fn new(volume: Arc<dyn Volume>, cost_fn: Arc<dyn CostFunction>, config: FillConfig) -> crate::error::Result<Self> {
        if config.seeds.is_empty() {
            return Err(crate::error::SntError::InvalidArgument("fill requires at least one seed voxel".into()));
        }
        for &seed in &config.seeds {
            if !volume.in_bounds_voxel(seed) {
                return Err(crate::error::SntError::InvalidArgument(format!("seed {:?} outside volume bounds", seed)));
            }
        }
        Ok(FillEngine {
            volume,
            cost_fn,
            config,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn run(&self) -> FillOutcome {
        self.run_with_progress(|_| {})
    }

    pub fn run_with_progress(&self, mut on_progress: impl FnMut(ProgressEvent)) -> FillOutcome {
        let span = info_span!("fill", seeds = self.config.seeds.len(), threshold = self.config.draw_threshold);
        let _enter = span.enter();

        let mut frontier = Frontier::new(self.volume.depth(), NodeStatus::OpenFromStart, NodeStatus::ClosedFromStart);
        for &seed in &self.config.seeds {
            // Multiple seeds share one frontier: a later `seed()` on a voxel
            // already present would clobber it, so only seed voxels not yet
            // touched by an earlier seed or its neighbours.
            if !frontier.store.contains(seed) {
                frontier.seed(seed, 0.0);
            }
        }

        let start_time = Instant::now();
        let mut iteration: u64 = 0;
        let mut throttle = ReportThrottle::new(self.config.report_interval);

        loop {
            iteration += 1;
            let now = Instant::now();
            let due_poll = iteration % crate::progress::CANCELLATION_POLL_INTERVAL == 0;
            let due_report = throttle.should_fire(now);

            if due_poll || due_report {
                if self.cancellation.is_cancelled() {
                    return self.finish(ExitReason::Cancelled, frontier);
                }
                if let Some(timeout) = self.config.timeout {
                    if timeout > Duration::ZERO && now.duration_since(start_time) >= timeout {
                        return self.finish(ExitReason::TimedOut, frontier);
                    }
                }
                if due_report {
                    on_progress(ProgressEvent {
                        open_count: frontier.open_count(),
                        closed_count: frontier.closed_count(),
                        thread_status: self.cancellation.status(),
                    });
                }
            }

            if frontier.heap.is_empty() {
                return self.finish(ExitReason::Success, frontier);
            }

            let p = match frontier.pop_and_close() {
                Some(p) => p,
                None => continue,
            };

            for neighbour in neighbours(self.volume.as_ref(), p.voxel) {
                let _ = relax(
                    &mut frontier,
                    self.volume.as_ref(),
                    self.cost_fn.as_ref(),
                    self.volume.calibration(),
                    p.voxel,
                    p.g,
                    neighbour,
                    false,
                    None,
                    self.config.draw_threshold,
                );
            }
        }
    }

    fn finish(&self, exit_reason: ExitReason, frontier: Frontier) -> FillOutcome {
        info!(?exit_reason, reached = frontier.closed_count(), "fill finished");
        FillOutcome { exit_reason, frontier }
    }
}

/// Merges several fills' stores by per-voxel minimum distance (P7): a voxel
/// reached by more than one fill keeps the smallest `g` seen across all of
/// them. Used when combining independently-run fills (e.g. one per
/// candidate branch) into a single rasterisable result.
pub fn merge_fills(fills: &[FillOutcome]) -> rustc_hash::FxHashMap<Voxel, f64> {
    let mut merged: rustc_hash::FxHashMap<Voxel, f64> = rustc_hash::FxHashMap::default();
    for fill in fills {
        for (voxel, node) in fill.frontier.store.iter_with_z() {
            if !node.status.is_closed() {
                continue;
            }
            merged
                .entry(voxel)
                .and_modify(|g| {
                    if node.g < *g {
                        *g = node.g;
                    }
                })
                .or_insert(node.g);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use crate::cost::MaxScalingCost;
    use crate::volume::{BitDepth, DenseVolume};

    fn flat_volume(n: i64) -> Arc<DenseVolume> {
        Arc::new(DenseVolume::new(n, n, n, Calibration::isotropic(1.0, "um"), BitDepth::Eight, 200.0))
    }

    #[test]
    fn fill_reaches_every_voxel_within_threshold() {
        let volume = flat_volume(5);
        let cost = Arc::new(MaxScalingCost::new(volume.clone(), 256.0));
        let config = FillConfig::new(vec![Voxel::new(2, 2, 2)], 2.5);
        let engine = FillEngine::new(volume, cost, config).unwrap();
        let outcome = engine.run();
        assert_eq!(outcome.exit_reason, ExitReason::Success);
        assert!(outcome.distance(Voxel::new(2, 2, 2)) == Some(0.0));
        // A threshold of 2.5 on a unit grid should not reach the far corner.
        assert!(outcome.distance(Voxel::new(0, 0, 0)).is_none());
    }

    #[test]
    fn merge_keeps_minimum_distance_per_voxel() {
        let volume = flat_volume(5);
        let cost = Arc::new(MaxScalingCost::new(volume.clone(), 256.0));
        let near = FillEngine::new(volume.clone(), cost.clone(), FillConfig::new(vec![Voxel::new(0, 0, 0)], 10.0))
            .unwrap()
            .run();
        let far = FillEngine::new(volume, cost, FillConfig::new(vec![Voxel::new(4, 4, 4)], 10.0))
            .unwrap()
            .run();
        let merged = merge_fills(&[near, far]);
        let origin_distance = merged[&Voxel::new(0, 0, 0)];
        assert_eq!(origin_distance, 0.0);
    }
}
