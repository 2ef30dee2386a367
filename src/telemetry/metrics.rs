//! Metric instrument factories for turnq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"turnq"` meter. Without an
//! OTLP endpoint the global provider is a no-op and these cost nothing.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for turnq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("turnq")
}

/// Counter: tasks that joined the line.
/// Labels: `result` ("created" | "rejoined" | "queue_full").
pub fn tasks_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("turnq.tasks.enqueued")
        .with_description("Number of enqueue requests")
        .build()
}

/// Counter: tasks that left the line after their turn.
pub fn tasks_released() -> Counter<u64> {
    meter()
        .u64_counter("turnq.tasks.released")
        .with_description("Number of tasks released from the head of the line")
        .build()
}

/// Counter: tasks removed before their turn completed.
/// Labels: `reason` ("removed" | "cleared").
pub fn tasks_removed() -> Counter<u64> {
    meter()
        .u64_counter("turnq.tasks.removed")
        .with_description("Number of tasks removed from the queue")
        .build()
}

/// Counter: durable store writes that failed.
/// Labels: `operation` ("snapshot" | "metric").
pub fn persistence_failures() -> Counter<u64> {
    meter()
        .u64_counter("turnq.persistence.failures")
        .with_description("Number of failed durable store writes")
        .build()
}

/// Histogram: time a task spent in line before its release, in milliseconds.
pub fn wait_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("turnq.turn.wait_ms")
        .with_description("Time from enqueue to release")
        .with_unit("ms")
        .build()
}
