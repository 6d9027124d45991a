//! Upstream API executor contract.
//!
//! The gate never talks to the analytics API directly; it dispatches through
//! this trait. Only `RateLimited` is retryable — any other error is terminal
//! for the request, and resubmission policy belongs to the caller.

use async_trait::async_trait;
use serde_json::Value;

/// Result of one upstream dispatch.
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// Upstream accepted the request and returned a payload.
    Success(Value),
    /// Upstream rejected with HTTP 429; the tenant must back off.
    RateLimited,
    /// Any other upstream failure. Not retried by this layer.
    Error(String),
}

/// Executor for upstream analytics operations.
#[async_trait]
pub trait UpstreamExecutor: Send + Sync {
    async fn execute(&self, endpoint: &str, params: &Value) -> ExecuteOutcome;
}
