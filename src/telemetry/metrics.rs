//! Metrics facade for the admission gate.
//!
//! Thin wrappers over the `metrics` crate so call sites stay one-liners and
//! metric names live in one place.

/// A request was admitted to the queue.
pub fn record_enqueue(tenant: &str) {
    metrics::counter!("fairgate_enqueued_total", "tenant" => tenant.to_string()).increment(1);
}

/// A request was rejected at admission time.
pub fn record_admission_rejected(tenant: &str, reason: &'static str) {
    metrics::counter!(
        "fairgate_admission_rejected_total",
        "tenant" => tenant.to_string(),
        "reason" => reason,
    )
    .increment(1);
}

/// A dispatch completed successfully.
pub fn record_dispatch_success(tenant: &str, latency_ms: u64) {
    metrics::counter!("fairgate_dispatch_success_total", "tenant" => tenant.to_string())
        .increment(1);
    metrics::histogram!("fairgate_dispatch_latency_ms").record(latency_ms as f64);
}

/// A dispatch came back 429 and the request was re-queued.
pub fn record_dispatch_deferred(tenant: &str, backoff_secs: f64) {
    metrics::counter!("fairgate_dispatch_deferred_total", "tenant" => tenant.to_string())
        .increment(1);
    metrics::gauge!("fairgate_backoff_seconds", "tenant" => tenant.to_string()).set(backoff_secs);
}

/// A dispatch reached a terminal failure.
pub fn record_dispatch_failure(tenant: &str, reason: &'static str) {
    metrics::counter!(
        "fairgate_dispatch_failure_total",
        "tenant" => tenant.to_string(),
        "reason" => reason,
    )
    .increment(1);
}

/// Live (pending + deferred + running) queue depth.
pub fn record_queue_depth(depth: usize) {
    metrics::gauge!("fairgate_queue_depth").set(depth as f64);
}
