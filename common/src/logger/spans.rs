use tracing::{Level, Span, field};

use super::TraceId;

/// Root span for one CLI invocation or request.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "root",
        name = %name,
        trace_id = %trace_id,
        court_id = field::Empty,
        session_id = field::Empty
    )
}

/// Child span; inherits the trace id from whatever span is current.
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "child", name = %name)
}
