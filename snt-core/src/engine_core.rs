//! Shared frontier bookkeeping used by both [`crate::search::SearchEngine`]
//! and [`crate::fill::FillEngine`].
//!
//! `Fill` is modelled as a Dijkstra search with
//! `defined_goal = false` and possibly multiple seed origins rather than a
//! separate inheritance branch, so the open-heap/node-store relaxation step,
//! the part both engines share byte-for-byte, lives here once instead of
//! being duplicated.

use crate::calibration::{Calibration, Voxel};
use crate::cost::CostFunction;
use crate::heap::AddressableHeap;
use crate::node::{NodeStatus, NodeStore, SearchNode};
use crate::volume::Volume;

/// One side's working state: its node store and open heap. A search owns
/// one or two of these (start-side, and goal-side iff bidirectional); a
/// fill owns exactly one.
pub struct Frontier {
    pub store: NodeStore,
    pub heap: AddressableHeap,
    open_status: NodeStatus,
    closed_status: NodeStatus,
}

impl Frontier {
    pub fn new(depth: i64, open_status: NodeStatus, closed_status: NodeStatus) -> Self {
        Frontier {
            store: NodeStore::new(depth),
            heap: AddressableHeap::new(),
            open_status,
            closed_status,
        }
    }

    /// Seeds this frontier with an origin node at `g = 0`.
    pub fn seed(&mut self, voxel: Voxel, h: f64) {
        let handle = self.heap.push(voxel, h);
        let mut node = SearchNode::origin(voxel, h, self.open_status);
        node.heap_handle = Some(handle);
        self.store.insert(voxel, node);
    }

    /// Pops the minimum-`f` voxel and marks it CLOSED, returning the closed
    /// node's snapshot (by value; cheap, `SearchNode` is `Copy`).
    pub fn pop_and_close(&mut self) -> Option<SearchNode> {
        let voxel = self.heap.pop_min()?;
        let node = self.store.get_mut(voxel).expect("popped voxel must be in store");
        node.status = self.closed_status;
        node.heap_handle = None;
        Some(*node)
    }

    pub fn closed_count(&self) -> usize {
        self.store
            .iter()
            .filter(|(_, n)| n.status == self.closed_status)
            .count()
    }

    pub fn open_count(&self) -> usize {
        self.heap.len()
    }

    /// Reconstructs the voxel chain from `from` back to the frontier's
    /// origin by walking `predecessor` links, returned root-first.
    pub fn chain_to_origin(&self, from: Voxel) -> Vec<Voxel> {
        let mut voxels = Vec::new();
        let mut current = Some(from);
        while let Some(v) = current {
            voxels.push(v);
            current = self.store.get(v).and_then(|n| n.predecessor);
        }
        voxels.reverse();
        voxels
    }
}

/// Outcome of relaxing one edge `p -> neighbour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxOutcome {
    /// The neighbour was not in the store; inserted fresh.
    Inserted,
    /// The neighbour already had an equal-or-better `f`; nothing changed.
    NoOp,
    /// The neighbour was OPEN with a worse `f`; its key was decreased.
    Improved,
    /// The neighbour was CLOSED with a worse `f` (non-admissible cost
    /// surface); reopened.
    Reopened,
    /// Skipped because it would exceed the Dijkstra fill's draw threshold.
    OverThreshold,
}

/// Enumerates the 26-connected (3D) or 8-connected (2D) neighbourhood of
/// `p`, skipping the centre and any out-of-bounds voxel.
pub fn neighbours(volume: &dyn Volume, p: Voxel) -> impl Iterator<Item = Voxel> + '_ {
    let is_2d = volume.is_2d();
    let z_range = if is_2d { 0..=0 } else { -1..=1 };
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            z_range.clone().filter_map(move |dz| {
                if dx == 0 && dy == 0 && dz == 0 {
                    return None;
                }
                let n = Voxel::new(p.x + dx, p.y + dy, p.z + dz);
                if volume.in_bounds_voxel(n) {
                    Some(n)
                } else {
                    None
                }
            })
        })
    })
}

/// Relaxes the edge `p -> neighbour` against `frontier`, per §4.4 step 4.
/// `opposite_endpoint` is `Some` for a defined-goal search (used to scale
/// `h'`); `draw_threshold` bounds undefined-goal (Dijkstra) expansion.
#[allow(clippy::too_many_arguments)]
pub fn relax(
    frontier: &mut Frontier,
    volume: &dyn Volume,
    cost_fn: &dyn CostFunction,
    calibration: &Calibration,
    p: Voxel,
    p_g: f64,
    neighbour: Voxel,
    defined_goal: bool,
    opposite_endpoint: Option<Voxel>,
    draw_threshold: f64,
) -> RelaxOutcome {
    let step_dist = calibration.distance(p, neighbour);
    let step_cost = cost_fn
        .cost_moving_to(volume.value(neighbour.x, neighbour.y, neighbour.z))
        .max(cost_fn.min_cost_per_unit_distance());
    let g_prime = p_g + step_dist * step_cost;

    if !defined_goal && g_prime > draw_threshold {
        return RelaxOutcome::OverThreshold;
    }

    let h_prime = match (defined_goal, opposite_endpoint) {
        (true, Some(goal)) => calibration.distance(neighbour, goal) * cost_fn.min_cost_per_unit_distance(),
        _ => 0.0,
    };
    let f_prime = g_prime + h_prime;

    match frontier.store.get(neighbour).copied() {
        None => {
            let handle = frontier.heap.push(neighbour, f_prime);
            let node = SearchNode {
                voxel: neighbour,
                g: g_prime,
                h: h_prime,
                status: frontier_open_status(frontier),
                predecessor: Some(p),
                heap_handle: Some(handle),
            };
            frontier.store.insert(neighbour, node);
            RelaxOutcome::Inserted
        }
        Some(existing) if existing.f() <= f_prime => RelaxOutcome::NoOp,
        Some(mut existing) if existing.status.is_open() => {
            let handle = existing.heap_handle.expect("open node must carry a heap handle");
            frontier.heap.decrease_key(handle, f_prime);
            existing.g = g_prime;
            existing.h = h_prime;
            existing.predecessor = Some(p);
            frontier.store.insert(neighbour, existing);
            RelaxOutcome::Improved
        }
        Some(mut existing) => {
            // CLOSED with a worse f: reopen. Rare, reflects a non-admissible
            // cost surface from filtered images (negative-curvature
            // artifacts), but the heuristic staying consistent for the
            // *common* case is what keeps this path cold.
            let handle = frontier.heap.push(neighbour, f_prime);
            existing.g = g_prime;
            existing.h = h_prime;
            existing.status = frontier_open_status(frontier);
            existing.predecessor = Some(p);
            existing.heap_handle = Some(handle);
            frontier.store.insert(neighbour, existing);
            RelaxOutcome::Reopened
        }
    }
}

fn frontier_open_status(frontier: &Frontier) -> NodeStatus {
    frontier.open_status
}
