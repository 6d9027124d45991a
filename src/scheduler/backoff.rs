//! Per-tenant exponential backoff state machine.
//!
//! A tenant is `healthy` until the upstream answers 429, then `backed_off`
//! until its window elapses or one dispatch succeeds. Backoff doubles per
//! consecutive 429 and is capped. Tenants are isolated: one tenant's window
//! never affects another's eligibility.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Backoff growth parameters.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Window applied after the n-th consecutive 429 (0-based).
    fn window(&self, consecutive_429s: u32) -> Duration {
        let secs = self.base.as_secs_f64() * 2f64.powi(consecutive_429s.min(62) as i32);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

/// Backoff state for one tenant. Created lazily on first 429.
#[derive(Debug, Default, Clone)]
pub struct TenantBackoff {
    pub consecutive_429s: u32,
    pub next_eligible_at: Option<Instant>,
    pub current_backoff: Duration,
}

impl TenantBackoff {
    fn is_eligible(&self, now: Instant) -> bool {
        match self.next_eligible_at {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    fn record_rate_limited(&mut self, now: Instant, policy: &BackoffPolicy) -> Duration {
        self.current_backoff = policy.window(self.consecutive_429s);
        self.consecutive_429s += 1;
        self.next_eligible_at = Some(now + self.current_backoff);
        self.current_backoff
    }

    fn record_success(&mut self) {
        self.consecutive_429s = 0;
        self.next_eligible_at = None;
        self.current_backoff = Duration::ZERO;
    }
}

/// Tenant-keyed backoff map. Each record locks independently.
pub struct BackoffMap {
    tenants: DashMap<String, TenantBackoff>,
    policy: BackoffPolicy,
}

impl BackoffMap {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            tenants: DashMap::new(),
            policy,
        }
    }

    /// A tenant with no backoff record is healthy.
    pub fn is_eligible(&self, tenant_id: &str, now: Instant) -> bool {
        self.tenants
            .get(tenant_id)
            .map_or(true, |state| state.is_eligible(now))
    }

    /// Apply a 429: double the window and push out the eligibility deadline.
    /// Returns the window that was applied.
    pub fn record_rate_limited(&self, tenant_id: &str, now: Instant) -> Duration {
        self.tenants
            .entry(tenant_id.to_string())
            .or_default()
            .record_rate_limited(now, &self.policy)
    }

    /// One successful dispatch fully resets the tenant.
    pub fn record_success(&self, tenant_id: &str) {
        if let Some(mut state) = self.tenants.get_mut(tenant_id) {
            state.record_success();
        }
    }

    /// Earliest eligibility deadline among the given tenants that are still
    /// backed off. `None` when every listed tenant is already eligible.
    pub fn earliest_deadline(&self, tenant_ids: &[String], now: Instant) -> Option<Instant> {
        tenant_ids
            .iter()
            .filter_map(|id| self.tenants.get(id).and_then(|s| s.next_eligible_at))
            .filter(|deadline| *deadline > now)
            .min()
    }

    /// Current state snapshot for a tenant, if one exists.
    pub fn get(&self, tenant_id: &str) -> Option<TenantBackoff> {
        self.tenants.get(tenant_id).map(|s| s.clone())
    }
}
