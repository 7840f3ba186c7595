//! Typed records exchanged between the pipeline stages.
//!
//! Everything crossing the system boundary (the metrics backend and the AI
//! service) is decoded into these types first, so the rest of the crate
//! works on known-valid shapes.

mod insight;
mod lenient;
mod snapshot;

pub use insight::*;
pub use snapshot::*;

pub(crate) use lenient::value_to_f64;
