//! Turn queue engine: ranked queue, engine handle, metrics recorder.

pub mod control;
pub mod queue;
pub mod recorder;

pub use control::QueueEngine;
pub use queue::{Insert, RESERVED_NAMES, RankedQueue};
pub use recorder::MetricsRecorder;
