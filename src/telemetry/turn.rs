//! Turn span helpers.
//!
//! Provides span creation and state-transition recording for a client
//! working through the turn protocol.

use tracing::Span;

/// Start a span covering one task's turn, from join to release.
///
/// The `turn.state` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_turn_span(name: &str, priority: i64) -> Span {
    tracing::info_span!(
        "turn",
        "turn.task" = name,
        "turn.priority" = priority,
        "turn.state" = tracing::field::Empty,
    )
}

/// Record a state transition event on the given span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("turn.state", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
