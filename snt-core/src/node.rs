//! `SearchNode` and the per-side `NodeStore`.
//!
//! `NodeStore` mirrors `NbgChQuery`'s reusable search state (`fwd_dist` /
//! `bwd_dist` arrays indexed by node id, `nbg_ch/query.rs`). That state
//! pre-sizes a dense `Vec<u32>` for a bounded node-id space; voxel
//! coordinates are unbounded in practice, so each of the `D` slices here is
//! a sparse map `(x, y) -> SearchNode`, allocated lazily on first write and
//! keyed with `rustc_hash::FxHashMap` for the same reason the contraction
//! loop it's based on reaches for `rustc-hash`: the keys are plain integers,
//! so SipHash's cryptographic strength buys nothing.

use rustc_hash::FxHashMap;

use crate::calibration::Voxel;
use crate::heap::HeapHandle;

/// Which side of a (possibly bidirectional) search owns a node, and whether
/// it has been finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    OpenFromStart,
    ClosedFromStart,
    OpenFromGoal,
    ClosedFromGoal,
}

impl NodeStatus {
    pub fn is_open(self) -> bool {
        matches!(self, NodeStatus::OpenFromStart | NodeStatus::OpenFromGoal)
    }

    pub fn is_closed(self) -> bool {
        !self.is_open()
    }
}

/// A node in the search's in-tree. `predecessor` is `None` only for the
/// origin (start, goal, or a fill seed); it is always a back-reference to
/// another node in the *same* side's store, never an owning pointer.
#[derive(Debug, Clone, Copy)]
pub struct SearchNode {
    pub voxel: Voxel,
    pub g: f64,
    pub h: f64,
    pub status: NodeStatus,
    pub predecessor: Option<Voxel>,
    pub heap_handle: Option<HeapHandle>,
}

impl SearchNode {
    pub fn f(&self) -> f64 {
        self.g + self.h
    }

    pub fn origin(voxel: Voxel, h: f64, status: NodeStatus) -> Self {
        SearchNode {
            voxel,
            g: 0.0,
            h,
            status,
            predecessor: None,
            heap_handle: None,
        }
    }
}

/// Per-slice sparse map `(x, y) -> SearchNode`, `D` slices allocated lazily.
/// A node is present in the store iff its status is not "free"; there is no
/// explicit `FREE` variant stored, absence from the map *is* `FREE`.
pub struct NodeStore {
    depth: i64,
    slices: Vec<Option<FxHashMap<(i64, i64), SearchNode>>>,
    len: usize,
}

impl NodeStore {
    pub fn new(depth: i64) -> Self {
        assert!(depth > 0, "depth must be positive");
        NodeStore {
            depth,
            slices: (0..depth).map(|_| None).collect(),
            len: 0,
        }
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, v: Voxel) -> Option<&SearchNode> {
        self.slices
            .get(v.z as usize)?
            .as_ref()
            .and_then(|slice| slice.get(&(v.x, v.y)))
    }

    pub fn get_mut(&mut self, v: Voxel) -> Option<&mut SearchNode> {
        self.slices
            .get_mut(v.z as usize)?
            .as_mut()
            .and_then(|slice| slice.get_mut(&(v.x, v.y)))
    }

    pub fn contains(&self, v: Voxel) -> bool {
        self.get(v).is_some()
    }

    /// Inserts or overwrites the node at `v`, allocating its slice lazily.
    pub fn insert(&mut self, v: Voxel, node: SearchNode) {
        let slice = self.slices[v.z as usize].get_or_insert_with(FxHashMap::default);
        if slice.insert((v.x, v.y), node).is_none() {
            self.len += 1;
        }
    }

    /// Iterates every node across every allocated slice. Order is
    /// unspecified; callers that need determinism (e.g. rasterisation) sort
    /// by voxel coordinate after collecting.
    pub fn iter(&self) -> impl Iterator<Item = (&(i64, i64), &SearchNode)> {
        self.slices
            .iter()
            .enumerate()
            .filter_map(|(z, slice)| slice.as_ref().map(move |s| (z, s)))
            .flat_map(|(_, s)| s.iter())
    }

    pub fn iter_with_z(&self) -> impl Iterator<Item = (Voxel, &SearchNode)> {
        self.slices.iter().enumerate().filter_map(|(z, slice)| slice.as_ref().map(move |s| (z as i64, s))).flat_map(
            |(z, s)| s.iter().map(move |(&(x, y), node)| (Voxel::new(x, y, z), node)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_slice_allocation() {
        let mut store = NodeStore::new(4);
        assert!(store.slices[0].is_none());
        let v = Voxel::new(1, 2, 0);
        store.insert(v, SearchNode::origin(v, 0.0, NodeStatus::OpenFromStart));
        assert!(store.slices[0].is_some());
        assert!(store.slices[1].is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn presence_iff_not_free() {
        let mut store = NodeStore::new(1);
        let v = Voxel::new(0, 0, 0);
        assert!(!store.contains(v));
        store.insert(v, SearchNode::origin(v, 0.0, NodeStatus::OpenFromStart));
        assert!(store.contains(v));
    }
}
