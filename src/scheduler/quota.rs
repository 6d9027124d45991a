//! Fixed-window per-tenant quota tracking.
//!
//! Quota is charged once at enqueue. A request retried after backoff never
//! consumes additional quota, so the dispatch path has no quota check.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::GateError;
use crate::scheduler::request::Role;

/// Quota parameters: window length and per-role limits.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub window: Duration,
    pub default_limit: u32,
    pub per_role: HashMap<Role, u32>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            default_limit: 50,
            per_role: HashMap::new(),
        }
    }
}

impl QuotaPolicy {
    fn limit_for(&self, role: Role) -> u32 {
        self.per_role.get(&role).copied().unwrap_or(self.default_limit)
    }
}

#[derive(Debug)]
struct QuotaWindow {
    window_start: Instant,
    count: u32,
}

/// Tenant-keyed rolling counters. Window rollover and increment happen under
/// the per-tenant entry lock, so the check-and-consume is atomic.
pub struct QuotaTracker {
    windows: DashMap<String, QuotaWindow>,
    policy: QuotaPolicy,
}

impl QuotaTracker {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            windows: DashMap::new(),
            policy,
        }
    }

    /// Consume one unit of quota for the tenant, or fail with `QuotaExceeded`
    /// without consuming anything.
    pub fn try_consume(&self, tenant_id: &str, role: Role, now: Instant) -> Result<(), GateError> {
        let limit = self.policy.limit_for(role);
        let mut window = self
            .windows
            .entry(tenant_id.to_string())
            .or_insert_with(|| QuotaWindow {
                window_start: now,
                count: 0,
            });

        if now.saturating_duration_since(window.window_start) >= self.policy.window {
            window.window_start = now;
            window.count = 0;
        }

        if window.count >= limit {
            return Err(GateError::QuotaExceeded {
                tenant: tenant_id.to_string(),
                used: window.count,
                limit,
            });
        }

        window.count += 1;
        Ok(())
    }

    /// Remaining quota in the tenant's current window.
    pub fn remaining(&self, tenant_id: &str, role: Role, now: Instant) -> u32 {
        let limit = self.policy.limit_for(role);
        match self.windows.get(tenant_id) {
            Some(window)
                if now.saturating_duration_since(window.window_start) < self.policy.window =>
            {
                limit.saturating_sub(window.count)
            }
            _ => limit,
        }
    }
}
