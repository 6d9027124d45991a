//! Public gate facade.
//!
//! Composes the queue store, backoff map, quota tracker, and worker pool into
//! the five caller-facing operations: enqueue, position, length, estimated
//! wait, and result waiting — plus graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::executor::UpstreamExecutor;
use crate::scheduler::backoff::BackoffMap;
use crate::scheduler::latency::LatencyWindow;
use crate::scheduler::quota::QuotaTracker;
use crate::scheduler::request::{priority, QueuedRequest, RequestId, Role};
use crate::scheduler::store::QueueStore;
use crate::scheduler::worker;
use crate::shutdown::{ShutdownCoordinator, ShutdownResult};
use crate::telemetry;

/// State shared between the facade and the worker pool.
pub(crate) struct GateShared {
    pub(crate) store: Mutex<QueueStore>,
    pub(crate) backoff: BackoffMap,
    pub(crate) quota: QuotaTracker,
    pub(crate) latency: LatencyWindow,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) executor: Arc<dyn UpstreamExecutor>,
    /// Wakes an idle worker on enqueue and on deferral.
    pub(crate) notify: Notify,
    pub(crate) drain: ShutdownCoordinator,
    pub(crate) max_attempts: u32,
    pub(crate) result_ttl: Duration,
}

impl GateShared {
    pub(crate) fn new(
        config: &GateConfig,
        executor: Arc<dyn UpstreamExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(QueueStore::new(config.score_policy(), config.max_pending)),
            backoff: BackoffMap::new(config.backoff_policy()),
            quota: QuotaTracker::new(config.quota_policy()),
            latency: LatencyWindow::new(config.latency_samples, config.avg_processing_time),
            clock,
            executor,
            notify: Notify::new(),
            drain: ShutdownCoordinator::new(),
            max_attempts: config.max_attempts,
            result_ttl: config.result_ttl,
        })
    }
}

/// An admission request.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub role: Role,
    pub endpoint: String,
    pub params: Value,
    /// Base priority 0..=100; defaults to `priority::NORMAL`.
    pub priority: Option<u8>,
}

impl EnqueueRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            role,
            endpoint: endpoint.into(),
            params: Value::Null,
            priority: None,
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Serializable totals and live depths for an exporting layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub deferrals: u64,
    pub pending: usize,
    pub deferred: usize,
    pub running: usize,
}

/// Admission-control gate over a rate-limited upstream API.
pub struct Gate {
    shared: Arc<GateShared>,
    token: CancellationToken,
    workers: parking_lot::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Gate {
    /// Create a gate with the system clock and spawn its worker pool.
    pub fn new(config: GateConfig, executor: Arc<dyn UpstreamExecutor>) -> Self {
        Self::with_clock(config, executor, Arc::new(SystemClock))
    }

    /// Create a gate with an injected clock (test seam).
    pub fn with_clock(
        config: GateConfig,
        executor: Arc<dyn UpstreamExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shared = GateShared::new(&config, executor, clock);
        let token = CancellationToken::new();
        let handles = worker::spawn_workers(&shared, config.worker_count, &token);
        tracing::info!(worker_count = config.worker_count, "gate started");
        Self {
            shared,
            token,
            workers: parking_lot::Mutex::new(handles),
        }
    }

    /// Admit a request. Quota is charged here, exactly once — retries after
    /// backoff never consume more.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<RequestId, GateError> {
        let tenant = request.tenant_id.clone();
        if !self.shared.drain.is_accepting() {
            telemetry::record_admission_rejected(&tenant, "shutting_down");
            return Err(GateError::ShuttingDown);
        }

        let now = self.shared.clock.now();
        let mut store = self.shared.store.lock().await;

        if let Err(err) = store.check_capacity() {
            telemetry::record_admission_rejected(&tenant, "queue_full");
            return Err(err);
        }
        if let Err(err) = self.shared.quota.try_consume(&tenant, request.role, now) {
            telemetry::record_admission_rejected(&tenant, "quota_exceeded");
            return Err(err);
        }

        let queued = QueuedRequest::new(
            request.tenant_id,
            request.user_id,
            request.role,
            request.endpoint,
            request.params,
            request.priority.unwrap_or(priority::NORMAL),
            now,
        );
        let id = store.insert(queued);
        let depth = store.live_count();
        drop(store);

        self.shared.notify.notify_one();
        telemetry::record_enqueue(&tenant);
        telemetry::record_queue_depth(depth);
        tracing::debug!(request_id = %id, tenant = %tenant, "request enqueued");
        Ok(id)
    }

    /// 1-based rank among the tenant's queued requests, in dispatch order.
    /// Returns 0 for a request that is currently running.
    pub async fn queue_position(&self, id: RequestId) -> Result<usize, GateError> {
        let now = self.shared.clock.now();
        self.shared.store.lock().await.position(id, now)
    }

    /// Pending + deferred + running count for a tenant.
    pub async fn queue_length(&self, tenant_id: &str) -> usize {
        self.shared.store.lock().await.tenant_depth(tenant_id)
    }

    /// `position * average dispatch latency`, using the configured default
    /// until measured latencies exist.
    pub async fn estimated_wait(&self, id: RequestId) -> Result<Duration, GateError> {
        let position = self.queue_position(id).await?;
        Ok(self.shared.latency.average() * position as u32)
    }

    /// Block until the request reaches a terminal state or the timeout
    /// elapses. A timeout never cancels the request — a later call on the
    /// same id still observes the eventual outcome. Delivering an outcome
    /// evicts the request.
    pub async fn wait_for_result(
        &self,
        id: RequestId,
        timeout: Duration,
    ) -> Result<Value, GateError> {
        let mut rx = self
            .shared
            .store
            .lock()
            .await
            .subscribe(id)
            .ok_or(GateError::NotFound)?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                self.shared.store.lock().await.evict_retrieved(id);
                return outcome;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Err(_) => return Err(GateError::Timeout),
                // Publisher gone: the entry was evicted by the retention TTL.
                Ok(Err(_)) => return Err(GateError::NotFound),
                Ok(Ok(())) => {}
            }
        }
    }

    /// Totals and live depths since startup.
    pub async fn snapshot(&self) -> GateSnapshot {
        let store = self.shared.store.lock().await;
        let counters = store.counters().clone();
        let (pending, deferred, running) = store.depth_by_state();
        GateSnapshot {
            enqueued: counters.enqueued,
            succeeded: counters.succeeded,
            failed: counters.failed,
            deferrals: counters.deferrals,
            pending,
            deferred,
            running,
        }
    }

    /// Stop admissions, let in-flight dispatches finish, and join the worker
    /// pool. Cooperative: nothing is interrupted, and a timeout only reports
    /// what is still executing.
    pub async fn shutdown(&self, drain_timeout: Duration) -> ShutdownResult {
        self.shared.drain.begin_drain();
        self.token.cancel();
        self.shared.notify.notify_waiters();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let joined =
            tokio::time::timeout(drain_timeout, futures::future::join_all(handles)).await;

        let result = match joined {
            Ok(_) => ShutdownResult::Complete,
            Err(_) => ShutdownResult::Timeout {
                remaining: self.shared.drain.in_flight_count(),
            },
        };
        self.shared.drain.mark_stopped();
        tracing::info!(?result, "gate shut down");
        result
    }
}
