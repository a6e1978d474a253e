//! Read-only external format codecs sitting at the Path/Fill boundary.

pub mod swc;
pub mod traces;
