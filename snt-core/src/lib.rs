//! `snt-core`: the semi-automated tracing engine. Volume access, Hessian
//! tubeness/Frangi filtering, cost functions, an addressable-heap search
//! engine (unidirectional/bidirectional A* and Dijkstra), and a flood-fill
//! engine, with read-only SWC and `.traces` fragment codecs at the boundary.

pub mod calibration;
pub mod cost;
mod engine_core;
pub mod error;
pub mod fill;
pub mod hessian;
pub mod io;
pub mod node;
pub mod path;
pub mod progress;
pub mod search;
mod heap;
pub mod volume;

pub use calibration::{Calibration, Voxel};
pub use cost::{CostFunction, FrangiProbabilisticCost, MaxScalingCost, OneMinusErfCost, ReciprocalCost};
pub use error::{ExitReason, Result, SntError};
pub use fill::{FillConfig, FillEngine, FillOutcome};
pub use hessian::{HessianConfig, HessianEngine, HessianOutcome, ResponseKind};
pub use node::{NodeStatus, NodeStore, SearchNode};
pub use path::{Path, PathPoint, SwcType};
pub use progress::{CancellationToken, ProgressEvent, ThreadStatus};
pub use search::{SearchConfig, SearchEngine, SearchOutcome};
pub use volume::{BitDepth, DenseVolume, Volume};
