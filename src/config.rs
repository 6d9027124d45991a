//! Gate configuration loading from environment variables.
//!
//! All values are loaded from `FAIRGATE_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FAIRGATE_WORKER_COUNT` | 5 | Concurrent dispatch workers |
//! | `FAIRGATE_BASE_BACKOFF_SECONDS` | 2 | First backoff window after a 429 |
//! | `FAIRGATE_MAX_BACKOFF_SECONDS` | 60 | Backoff window cap |
//! | `FAIRGATE_MAX_ATTEMPTS` | 5 | Dispatch attempts before a request fails |
//! | `FAIRGATE_AGING_RATE` | 0.1 | Score points gained per second waiting |
//! | `FAIRGATE_AGING_CAP` | 20 | Upper bound on the aging bonus |
//! | `FAIRGATE_AVG_PROCESSING_SECONDS` | 30 | Wait-estimate fallback per queue slot |
//! | `FAIRGATE_QUOTA_WINDOW_SECONDS` | 3600 | Quota window length |
//! | `FAIRGATE_QUOTA_LIMIT` | 50 | Default requests per tenant per window |
//! | `FAIRGATE_MAX_PENDING` | unbounded | Optional live-request capacity bound |
//! | `FAIRGATE_RESULT_TTL_SECONDS` | 300 | Retention of unretrieved results |

use std::collections::HashMap;
use std::time::Duration;

use crate::scheduler::backoff::BackoffPolicy;
use crate::scheduler::quota::QuotaPolicy;
use crate::scheduler::request::Role;
use crate::scheduler::score::ScorePolicy;

/// Full gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub worker_count: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Dispatch attempts (including the first) before a request is failed
    /// with `RateLimitExceeded`.
    pub max_attempts: u32,
    pub aging_rate: f64,
    pub aging_cap: f64,
    /// Wait-estimate fallback until measured dispatch latencies exist.
    pub avg_processing_time: Duration,
    pub quota_window: Duration,
    pub default_quota_limit: u32,
    /// Per-role quota overrides; roles not listed use the default limit.
    pub quota_limit_per_role: HashMap<Role, u32>,
    /// Optional bound on live (pending + deferred + running) requests.
    pub max_pending: Option<usize>,
    /// How long unretrieved terminal results are kept before eviction.
    pub result_ttl: Duration,
    /// Dispatch latency samples kept for wait estimation.
    pub latency_samples: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            max_attempts: 5,
            aging_rate: 0.1,
            aging_cap: 20.0,
            avg_processing_time: Duration::from_secs(30),
            quota_window: Duration::from_secs(3600),
            default_quota_limit: 50,
            quota_limit_per_role: HashMap::new(),
            max_pending: None,
            result_ttl: Duration::from_secs(300),
            latency_samples: 32,
        }
    }
}

impl GateConfig {
    /// Load configuration from `FAIRGATE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: parse_usize("FAIRGATE_WORKER_COUNT", defaults.worker_count),
            base_backoff: Duration::from_secs(
                parse_u64("FAIRGATE_BASE_BACKOFF_SECONDS", 2).max(1),
            ),
            max_backoff: Duration::from_secs(parse_u64("FAIRGATE_MAX_BACKOFF_SECONDS", 60).max(1)),
            max_attempts: parse_u32("FAIRGATE_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            aging_rate: parse_f64("FAIRGATE_AGING_RATE", defaults.aging_rate).max(0.0),
            aging_cap: parse_f64("FAIRGATE_AGING_CAP", defaults.aging_cap).max(0.0),
            avg_processing_time: Duration::from_secs(
                parse_u64("FAIRGATE_AVG_PROCESSING_SECONDS", 30).max(1),
            ),
            quota_window: Duration::from_secs(
                parse_u64("FAIRGATE_QUOTA_WINDOW_SECONDS", 3600).max(1),
            ),
            default_quota_limit: parse_u32("FAIRGATE_QUOTA_LIMIT", defaults.default_quota_limit)
                .max(1),
            quota_limit_per_role: defaults.quota_limit_per_role,
            max_pending: std::env::var("FAIRGATE_MAX_PENDING")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0),
            result_ttl: Duration::from_secs(parse_u64("FAIRGATE_RESULT_TTL_SECONDS", 300).max(1)),
            latency_samples: defaults.latency_samples,
        }
    }

    pub(crate) fn score_policy(&self) -> ScorePolicy {
        ScorePolicy {
            aging_rate: self.aging_rate,
            aging_cap: self.aging_cap,
        }
    }

    pub(crate) fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: self.base_backoff,
            max: self.max_backoff,
        }
    }

    pub(crate) fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            window: self.quota_window,
            default_limit: self.default_quota_limit,
            per_role: self.quota_limit_per_role.clone(),
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `f64` env var, returning `default` on missing or invalid.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<f64>().unwrap_or(default),
        Err(_) => default,
    }
}
