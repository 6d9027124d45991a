//! Telemetry for the admission gate.
//!
//! Structured logging via `tracing` and a thin facade over the `metrics`
//! crate. No exporter is wired here — the embedding service installs its own
//! subscriber/recorder.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_admission_rejected, record_dispatch_deferred, record_dispatch_failure,
    record_dispatch_success, record_enqueue, record_queue_depth,
};
