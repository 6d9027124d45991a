//! Worker pool: claim the best eligible request, dispatch it upstream, and
//! settle the outcome.
//!
//! Workers never busy-poll. An idle worker waits on the enqueue notify and,
//! when deferred work exists, simultaneously on a sleep until the earliest
//! backoff deadline; shutdown cancellation wakes it immediately.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::Claim;
use crate::error::GateError;
use crate::executor::ExecuteOutcome;
use crate::gate::GateShared;
use crate::telemetry;

/// Spawn the worker pool. Returns handles for shutdown joining.
pub(crate) fn spawn_workers(
    shared: &Arc<GateShared>,
    count: usize,
    token: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let shared = Arc::clone(shared);
            let token = token.clone();
            tokio::spawn(async move { worker_loop(shared, token, worker_id).await })
        })
        .collect()
}

async fn worker_loop(shared: Arc<GateShared>, token: CancellationToken, worker_id: usize) {
    tracing::debug!(worker_id, "worker started");
    loop {
        if token.is_cancelled() {
            break;
        }

        let claim = {
            let mut store = shared.store.lock().await;
            let now = shared.clock.now();
            store.sweep_expired(now, shared.result_ttl);
            store.claim_best(now, |tenant| shared.backoff.is_eligible(tenant, now))
        };

        match claim {
            Some(claim) => execute_claim(&shared, claim).await,
            None => idle(&shared, &token).await,
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}

/// Wait for new work. With deferred work outstanding the wait is bounded by
/// the earliest backoff deadline so retries resume on time.
async fn idle(shared: &Arc<GateShared>, token: &CancellationToken) {
    let deadline = {
        let store = shared.store.lock().await;
        let tenants = store.queued_tenants();
        drop(store);
        if tenants.is_empty() {
            None
        } else {
            shared.backoff.earliest_deadline(&tenants, shared.clock.now())
        }
    };

    match deadline {
        Some(when) => {
            let wait = when.saturating_duration_since(shared.clock.now());
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = shared.notify.notified() => {}
                () = tokio::time::sleep(wait) => {}
            }
        }
        None => {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = shared.notify.notified() => {}
            }
        }
    }
}

async fn execute_claim(shared: &Arc<GateShared>, claim: Claim) {
    let _guard = shared.drain.guard();
    tracing::debug!(
        request_id = %claim.id,
        tenant = %claim.tenant_id,
        endpoint = %claim.endpoint,
        attempt = claim.attempt_count,
        "dispatching"
    );

    let started = Instant::now();
    // A panicking executor must not leave the request stuck in `running`;
    // it settles as a terminal upstream failure instead.
    let outcome = AssertUnwindSafe(shared.executor.execute(&claim.endpoint, &claim.params))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| ExecuteOutcome::Error("executor panicked".to_string()));
    let latency = started.elapsed();
    let now = shared.clock.now();

    match outcome {
        ExecuteOutcome::Success(payload) => {
            shared.backoff.record_success(&claim.tenant_id);
            shared.latency.record(latency);
            let mut store = shared.store.lock().await;
            store.settle_success(claim.id, payload, now);
            let depth = store.live_count();
            drop(store);
            telemetry::record_dispatch_success(&claim.tenant_id, latency.as_millis() as u64);
            telemetry::record_queue_depth(depth);
        }
        ExecuteOutcome::RateLimited => {
            // The tenant was throttled regardless of this request's fate.
            let window = shared.backoff.record_rate_limited(&claim.tenant_id, now);
            if claim.attempt_count >= shared.max_attempts {
                let mut store = shared.store.lock().await;
                store.settle_failure(
                    claim.id,
                    GateError::RateLimitExceeded {
                        attempts: claim.attempt_count,
                    },
                    now,
                );
                drop(store);
                tracing::warn!(
                    request_id = %claim.id,
                    tenant = %claim.tenant_id,
                    attempts = claim.attempt_count,
                    "rate limit retries exhausted"
                );
                telemetry::record_dispatch_failure(&claim.tenant_id, "rate_limit_exhausted");
            } else {
                shared.store.lock().await.settle_deferred(claim.id);
                shared.notify.notify_one();
                tracing::warn!(
                    request_id = %claim.id,
                    tenant = %claim.tenant_id,
                    backoff_secs = window.as_secs_f64(),
                    "upstream rate limited, deferring"
                );
                telemetry::record_dispatch_deferred(&claim.tenant_id, window.as_secs_f64());
            }
        }
        ExecuteOutcome::Error(detail) => {
            shared
                .store
                .lock()
                .await
                .settle_failure(claim.id, GateError::Upstream(detail.clone()), now);
            tracing::error!(
                request_id = %claim.id,
                tenant = %claim.tenant_id,
                error = %detail,
                "upstream dispatch failed"
            );
            telemetry::record_dispatch_failure(&claim.tenant_id, "upstream_error");
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
