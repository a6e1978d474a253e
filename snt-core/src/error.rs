//! Error taxonomy for the tracing engine.
//!
//! Typed errors live here and are used throughout `snt-core`, following the
//! usual split between library-level `thiserror` types and `anyhow`-at-the-
//! boundary application code: the CLI binaries add `anyhow` context on top
//! of these, but nothing inside this crate reaches for it.

use thiserror::Error;

/// Errors raised by construction or execution of the core engines.
#[derive(Debug, Error)]
pub enum SntError {
    /// Caller-supplied configuration could not possibly produce a valid search
    /// or filter run (NaN spacing, empty scale list, start == goal, endpoint
    /// outside the volume bounds, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The Hessian engine halved its block size below the minimum without
    /// fitting the memory budget.
    #[error("insufficient memory to size a Hessian block (budget {budget_bytes} bytes, minimum block edge {min_edge})")]
    InsufficientMemory {
        budget_bytes: usize,
        min_edge: i64,
    },

    /// Wraps a lower-level I/O failure (SWC / traces codecs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read-only codec (SWC, `.traces` fragment) received malformed input.
    #[error("malformed {format} input: {reason}")]
    MalformedInput { format: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SntError>;

/// Why a search or fill loop stopped. `Success` and `PointsExhausted` /
/// `Cancelled` / `TimedOut` / `OutOfMemory` are not errors in the `Result`
/// sense: a run that fails to meet its goal is a normal outcome delivered
/// through `finished(success, exit_reason)`, not a propagated `SntError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Success,
    Cancelled,
    TimedOut,
    PointsExhausted,
    OutOfMemory,
}

impl ExitReason {
    pub fn is_success(self) -> bool {
        matches!(self, ExitReason::Success)
    }
}
