//! Ambient concerns shared by the courtbook crates: logger setup, trace
//! correlation ids and slow-operation warnings.

pub mod logger;

pub use logger::{TraceId, child_span, init_logger, root_span, warn_if_slow};
