//! The Search Engine: {bidirectional, unidirectional} x {defined goal (A*),
//! undefined goal (Dijkstra bounded by a distance threshold)}.
//!
//! Follows `NbgChQuery::distance` (`nbg_ch/query.rs`) for the overall shape
//! of an alternating bidirectional Dijkstra loop (two heaps, a "meeting"
//! check on every pop and every relax), generalised here from a fixed-size
//! dense distance array to a sparse, voxel-addressed `NodeStore`, and from a
//! plain `BinaryHeap` to the addressable heap in [`crate::heap`] so nodes
//! can have their key lowered in place instead of being pushed again and
//! filtered on pop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, info_span, trace};

use crate::calibration::{Calibration, Voxel};
use crate::cost::CostFunction;
use crate::engine_core::{neighbours, relax, Frontier, RelaxOutcome};
use crate::error::{ExitReason, Result, SntError};
use crate::node::NodeStatus;
use crate::path::{Path, SwcType};
use crate::progress::{CancellationToken, ProgressEvent, ReportThrottle, ThreadStatus};
use crate::volume::Volume;

/// Caller-facing configuration for a single search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub bidirectional: bool,
    pub defined_goal: bool,
    pub start: Voxel,
    pub goal: Option<Voxel>,
    pub timeout: Option<Duration>,
    pub report_interval: Duration,
    pub draw_threshold: f64,
}

impl SearchConfig {
    pub fn unidirectional_astar(start: Voxel, goal: Voxel) -> Self {
        SearchConfig {
            bidirectional: false,
            defined_goal: true,
            start,
            goal: Some(goal),
            timeout: None,
            report_interval: Duration::from_millis(250),
            draw_threshold: f64::INFINITY,
        }
    }

    pub fn bidirectional_astar(start: Voxel, goal: Voxel) -> Self {
        SearchConfig {
            bidirectional: true,
            ..SearchConfig::unidirectional_astar(start, goal)
        }
    }

    pub fn dijkstra(start: Voxel, draw_threshold: f64) -> Self {
        SearchConfig {
            bidirectional: false,
            defined_goal: false,
            start,
            goal: None,
            timeout: None,
            report_interval: Duration::from_millis(250),
            draw_threshold,
        }
    }

    fn needs_goal(&self) -> bool {
        self.bidirectional || self.defined_goal
    }
}

/// Result of a completed (or aborted) search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub exit_reason: ExitReason,
    pub path: Option<Path>,
    pub closed_start: usize,
    pub closed_goal: usize,
}

pub struct SearchEngine {
    volume: Arc<dyn Volume>,
    cost_fn: Arc<dyn CostFunction>,
    config: SearchConfig,
    cancellation: CancellationToken,
}

impl SearchEngine {
    pub fn new(volume: Arc<dyn Volume>, cost_fn: Arc<dyn CostFunction>, config: SearchConfig) -> Result<Self> {
        if !volume.calibration().is_valid() {
            return Err(SntError::InvalidArgument("volume calibration must have finite, positive spacing".into()));
        }
        if !volume.in_bounds_voxel(config.start) {
            return Err(SntError::InvalidArgument(format!("start {:?} outside volume bounds", config.start)));
        }
        if config.needs_goal() {
            match config.goal {
                None => return Err(SntError::InvalidArgument("bidirectional or defined-goal search requires a goal".into())),
                Some(goal) if !volume.in_bounds_voxel(goal) => {
                    return Err(SntError::InvalidArgument(format!("goal {:?} outside volume bounds", goal)));
                }
                _ => {}
            }
        }
        Ok(SearchEngine {
            volume,
            cost_fn,
            config,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn run(&self) -> SearchOutcome {
        self.run_with_progress(|_| {})
    }

    pub fn run_with_progress(&self, mut on_progress: impl FnMut(ProgressEvent)) -> SearchOutcome {
        let span = info_span!(
            "search",
            start = ?self.config.start,
            goal = ?self.config.goal,
            bidirectional = self.config.bidirectional,
            defined_goal = self.config.defined_goal,
        );
        let _enter = span.enter();

        let calibration: &Calibration = self.volume.calibration();
        let depth = self.volume.depth();
        let min_cost = self.cost_fn.min_cost_per_unit_distance();

        let start_h = match (self.config.defined_goal, self.config.goal) {
            (true, Some(goal)) => calibration.distance(self.config.start, goal) * min_cost,
            _ => 0.0,
        };

        // Degenerate case: immediate success with a one-node path, not a
        // search at all.
        if self.config.defined_goal && self.config.goal == Some(self.config.start) {
            let path = Path::from_voxels(&[self.config.start], calibration, SwcType::Undefined);
            info!("start equals goal; trivial success");
            return SearchOutcome {
                exit_reason: ExitReason::Success,
                path: Some(path),
                closed_start: 0,
                closed_goal: 0,
            };
        }

        let mut start_frontier = Frontier::new(depth, NodeStatus::OpenFromStart, NodeStatus::ClosedFromStart);
        start_frontier.seed(self.config.start, start_h);

        let mut goal_frontier = if self.config.bidirectional {
            let goal = self.config.goal.expect("validated by constructor");
            let goal_h = if self.config.defined_goal {
                calibration.distance(goal, self.config.start) * min_cost
            } else {
                0.0
            };
            let mut f = Frontier::new(depth, NodeStatus::OpenFromGoal, NodeStatus::ClosedFromGoal);
            f.seed(goal, goal_h);
            Some(f)
        } else {
            None
        };

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
                    return self.finish(ExitReason::Cancelled, None, &start_frontier, &goal_frontier);
                }
                if let Some(timeout) = self.config.timeout {
                    if timeout > Duration::ZERO && now.duration_since(start_time) >= timeout {
                        return self.finish(ExitReason::TimedOut, None, &start_frontier, &goal_frontier);
                    }
                }
                if due_report {
                    on_progress(ProgressEvent {
                        open_count: start_frontier.open_count()
                            + goal_frontier.as_ref().map(Frontier::open_count).unwrap_or(0),
                        closed_count: start_frontier.closed_count()
                            + goal_frontier.as_ref().map(Frontier::closed_count).unwrap_or(0),
                        thread_status: self.cancellation.status(),
                    });
                }
            }

            let bidirectional = goal_frontier.is_some();
            let start_empty = start_frontier.heap.is_empty();
            let goal_empty = goal_frontier.as_ref().map(|f| f.heap.is_empty()).unwrap_or(true);
            if start_empty && (!bidirectional || goal_empty) {
                let reason = if self.config.defined_goal {
                    ExitReason::PointsExhausted
                } else {
                    ExitReason::Success
                };
                return self.finish(reason, None, &start_frontier, &goal_frontier);
            }

            let use_goal_side = bidirectional
                && !goal_empty
                && (start_empty || goal_frontier.as_ref().unwrap().open_count() > start_frontier.open_count());

            let popped = if use_goal_side {
                goal_frontier.as_mut().unwrap().pop_and_close()
            } else {
                start_frontier.pop_and_close()
            };
            let p = match popped {
                Some(p) => p,
                None => continue,
            };
            trace!(voxel = ?p.voxel, g = p.g, f = p.f(), "popped");

            // Step 2: same-voxel meeting / unidirectional goal check.
            if bidirectional {
                let other = if use_goal_side { &start_frontier } else { goal_frontier.as_ref().unwrap() };
                if let Some(other_node) = other.store.get(p.voxel) {
                    if other_node.status.is_closed() {
                        let path = self.reconstruct(&start_frontier, goal_frontier.as_ref().unwrap(), p.voxel, p.voxel, use_goal_side, calibration);
                        return self.finish(ExitReason::Success, Some(path), &start_frontier, &goal_frontier);
                    }
                }
            } else if self.config.defined_goal && p.voxel == self.config.goal.unwrap() {
                let chain = start_frontier.chain_to_origin(p.voxel);
                let path = Path::from_voxels(&chain, calibration, SwcType::Undefined);
                return self.finish(ExitReason::Success, Some(path), &start_frontier, &goal_frontier);
            }

            // Steps 3-4: relax every in-bounds neighbour.
            let opposite_endpoint = if self.config.defined_goal {
                Some(if use_goal_side { self.config.start } else { self.config.goal.unwrap() })
            } else {
                None
            };

            let mut touched = Vec::new();
            {
                let active = if use_goal_side { goal_frontier.as_mut().unwrap() } else { &mut start_frontier };
                for neighbour in neighbours(self.volume.as_ref(), p.voxel) {
                    let outcome = relax(
                        active,
                        self.volume.as_ref(),
                        self.cost_fn.as_ref(),
                        calibration,
                        p.voxel,
                        p.g,
                        neighbour,
                        self.config.defined_goal,
                        opposite_endpoint,
                        self.config.draw_threshold,
                    );
                    if matches!(outcome, RelaxOutcome::Inserted | RelaxOutcome::Improved | RelaxOutcome::Reopened) {
                        touched.push(neighbour);
                    }
                }
            }

            if bidirectional {
                for nb in touched {
                    let other_closed = if use_goal_side {
                        start_frontier.store.get(nb).map(|n| n.status.is_closed()).unwrap_or(false)
                    } else {
                        goal_frontier.as_ref().unwrap().store.get(nb).map(|n| n.status.is_closed()).unwrap_or(false)
                    };
                    if other_closed {
                        let path = self.reconstruct(&start_frontier, goal_frontier.as_ref().unwrap(), p.voxel, nb, use_goal_side, calibration);
                        return self.finish(ExitReason::Success, Some(path), &start_frontier, &goal_frontier);
                    }
                }
            }
        }
    }

    /// Builds the final start-to-goal voxel chain when `p` (popped on the
    /// active side) and `nb` (the just-relaxed neighbour, equal to `p` for
    /// the same-voxel meeting case) bridge the two frontiers.
    fn reconstruct(
        &self,
        start_frontier: &Frontier,
        goal_frontier: &Frontier,
        p: Voxel,
        nb: Voxel,
        use_goal_side: bool,
        calibration: &Calibration,
    ) -> Path {
        let chain = if use_goal_side {
            let mut s = start_frontier.chain_to_origin(nb);
            let mut g = goal_frontier.chain_to_origin(p);
            g.reverse();
            if nb == p {
                g.remove(0);
            }
            s.extend(g);
            s
        } else {
            let mut s = start_frontier.chain_to_origin(p);
            let mut g = goal_frontier.chain_to_origin(nb);
            g.reverse();
            if nb == p {
                g.remove(0);
            }
            s.extend(g);
            s
        };
        Path::from_voxels(&chain, calibration, SwcType::Undefined)
    }

    fn finish(
        &self,
        exit_reason: ExitReason,
        path: Option<Path>,
        start_frontier: &Frontier,
        goal_frontier: &Option<Frontier>,
    ) -> SearchOutcome {
        info!(?exit_reason, "search finished");
        SearchOutcome {
            exit_reason,
            path,
            closed_start: start_frontier.closed_count(),
            closed_goal: goal_frontier.as_ref().map(Frontier::closed_count).unwrap_or(0),
        }
    }
}
