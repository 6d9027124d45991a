//! Queue store: registry, selection, and lifecycle transitions.
//!
//! One store behind one mutex is the consistency domain for the whole gate.
//! Claiming a request (`pending`/`deferred` -> `running`) happens under the
//! lock, so two workers racing for the top-ranked request resolve
//! deterministically: one wins the claim, the other selects the next-ranked
//! eligible request.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::watch;

use super::request::{Outcome, QueuedRequest, RequestId, RequestState};
use super::score::{dispatch_cmp, ScorePolicy};
use crate::error::GateError;

/// Monotonic totals since gate startup.
#[derive(Debug, Default, Clone)]
pub struct StoreCounters {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Dispatch attempts that came back 429 and were re-queued.
    pub deferrals: u64,
}

/// Snapshot handed to a worker when it wins a claim.
#[derive(Debug, Clone)]
pub struct Claim {
    pub id: RequestId,
    pub tenant_id: String,
    pub endpoint: String,
    pub params: Value,
    /// Attempt number of this dispatch, 1-based.
    pub attempt_count: u32,
}

/// Live request registry plus selection logic.
pub struct QueueStore {
    requests: HashMap<RequestId, QueuedRequest>,
    policy: ScorePolicy,
    max_pending: Option<usize>,
    counters: StoreCounters,
}

impl QueueStore {
    pub fn new(policy: ScorePolicy, max_pending: Option<usize>) -> Self {
        Self {
            requests: HashMap::new(),
            policy,
            max_pending,
            counters: StoreCounters::default(),
        }
    }

    /// Count of non-terminal requests (pending + deferred + running).
    pub fn live_count(&self) -> usize {
        self.requests
            .values()
            .filter(|r| !r.state.is_terminal())
            .count()
    }

    /// Enforce the optional capacity bound before admission.
    pub fn check_capacity(&self) -> Result<(), GateError> {
        if let Some(max) = self.max_pending {
            let current = self.live_count();
            if current >= max {
                return Err(GateError::QueueFull { current, max });
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, request: QueuedRequest) -> RequestId {
        let id = request.id;
        self.counters.enqueued += 1;
        self.requests.insert(id, request);
        id
    }

    /// Select the highest-effective-score queued request whose tenant passes
    /// the eligibility filter and atomically transition it to running.
    pub fn claim_best(
        &mut self,
        now: Instant,
        eligible: impl Fn(&str) -> bool,
    ) -> Option<Claim> {
        let best_id = self
            .requests
            .values()
            .filter(|r| r.state.is_queued() && eligible(&r.tenant_id))
            .min_by(|a, b| dispatch_cmp(a, b, now, &self.policy))
            .map(|r| r.id)?;

        let request = self.requests.get_mut(&best_id)?;
        request.state = RequestState::Running;
        request.attempt_count += 1;
        Some(Claim {
            id: request.id,
            tenant_id: request.tenant_id.clone(),
            endpoint: request.endpoint.clone(),
            params: request.params.clone(),
            attempt_count: request.attempt_count,
        })
    }

    /// Tenants that currently have queued (pending/deferred) work.
    pub fn queued_tenants(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.requests
            .values()
            .filter(|r| r.state.is_queued())
            .filter_map(|r| seen.insert(r.tenant_id.clone()).then(|| r.tenant_id.clone()))
            .collect()
    }

    pub fn settle_success(&mut self, id: RequestId, payload: Value, now: Instant) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.state = RequestState::Succeeded;
            request.completed_at = Some(now);
            request.publish(Ok(payload));
            self.counters.succeeded += 1;
        }
    }

    /// Return a 429'd request to the queue. It keeps its original
    /// `enqueued_at`, so its aging bonus keeps accruing while deferred.
    pub fn settle_deferred(&mut self, id: RequestId) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.state = RequestState::Deferred;
            self.counters.deferrals += 1;
        }
    }

    pub fn settle_failure(&mut self, id: RequestId, error: GateError, now: Instant) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.state = RequestState::Failed;
            request.completed_at = Some(now);
            request.publish(Err(error));
            self.counters.failed += 1;
        }
    }

    /// 1-based rank among queued requests of the same tenant, ordered exactly
    /// as the dispatcher would order them. A running request reports 0.
    pub fn position(&self, id: RequestId, now: Instant) -> Result<usize, GateError> {
        let request = self.requests.get(&id).ok_or(GateError::NotFound)?;
        match request.state {
            RequestState::Running => Ok(0),
            state if state.is_terminal() => Err(GateError::NotFound),
            _ => {
                let ahead = self
                    .requests
                    .values()
                    .filter(|r| r.tenant_id == request.tenant_id && r.state.is_queued())
                    .filter(|r| {
                        dispatch_cmp(r, request, now, &self.policy) == std::cmp::Ordering::Less
                    })
                    .count();
                Ok(ahead + 1)
            }
        }
    }

    /// Pending + deferred + running count for one tenant.
    pub fn tenant_depth(&self, tenant_id: &str) -> usize {
        self.requests
            .values()
            .filter(|r| r.tenant_id == tenant_id && !r.state.is_terminal())
            .count()
    }

    pub fn state_of(&self, id: RequestId) -> Option<RequestState> {
        self.requests.get(&id).map(|r| r.state)
    }

    pub fn subscribe(&self, id: RequestId) -> Option<watch::Receiver<Option<Outcome>>> {
        self.requests.get(&id).map(|r| r.subscribe())
    }

    /// Evict after the caller has retrieved the outcome.
    pub fn evict_retrieved(&mut self, id: RequestId) {
        self.requests.remove(&id);
    }

    /// Evict terminal entries whose retention TTL elapsed without retrieval.
    /// Live requests are never swept.
    pub fn sweep_expired(&mut self, now: Instant, ttl: Duration) {
        self.requests.retain(|_, r| {
            !(r.state.is_terminal()
                && r.completed_at
                    .is_some_and(|done| now.saturating_duration_since(done) >= ttl))
        });
    }

    pub fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    /// (pending, deferred, running) live depths.
    pub fn depth_by_state(&self) -> (usize, usize, usize) {
        let mut pending = 0;
        let mut deferred = 0;
        let mut running = 0;
        for request in self.requests.values() {
            match request.state {
                RequestState::Pending => pending += 1,
                RequestState::Deferred => deferred += 1,
                RequestState::Running => running += 1,
                _ => {}
            }
        }
        (pending, deferred, running)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
