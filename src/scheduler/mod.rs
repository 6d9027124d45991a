//! Request scheduling for the admission gate.
//!
//! Manages request ordering by effective score, per-tenant backoff and quota
//! state, and the worker pool that dispatches to the upstream executor.

pub mod backoff;
pub mod latency;
pub mod quota;
pub mod request;
pub mod score;
pub mod store;
pub(crate) mod worker;

pub use backoff::{BackoffMap, BackoffPolicy, TenantBackoff};
pub use quota::{QuotaPolicy, QuotaTracker};
pub use request::{priority, Outcome, QueuedRequest, RequestId, RequestState, Role};
pub use score::ScorePolicy;
pub use store::{Claim, QueueStore, StoreCounters};
