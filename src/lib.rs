//! fairgate — fair-share admission control for rate-limited upstream APIs.
//!
//! Gates access to a quota-constrained analytics backend shared by many
//! tenants: requests are ordered by an effective score (base priority + role
//! bonus + bounded aging), dispatched by a fixed worker pool, and throttled
//! per tenant with exponential backoff when the upstream answers 429 — one
//! throttled tenant never blocks another.
//!
//! # Design
//!
//! - **Admission**: `enqueue` charges the tenant's fixed-window quota exactly
//!   once; over-quota requests never enter the queue.
//! - **Ordering**: the effective score is a pure function of request and
//!   current time, computed identically by the dispatcher and by position
//!   queries, with role / arrival-time / id tie-breaking.
//! - **Failure handling**: upstream 429s defer the request and back the
//!   tenant off (2s, 4s, 8s, ... capped); any other upstream error is
//!   terminal for that request only.
//! - **Observation**: callers poll position, length, and estimated wait, or
//!   block on `wait_for_result`; a wait timeout never cancels the request.
//! - **Shutdown**: cooperative draining — in-flight dispatches finish, the
//!   pool joins, nothing is interrupted.

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GateConfig;
pub use error::GateError;
pub use executor::{ExecuteOutcome, UpstreamExecutor};
pub use gate::{EnqueueRequest, Gate, GateSnapshot};
pub use scheduler::{priority, RequestId, RequestState, Role};
pub use shutdown::{ShutdownResult, ShutdownState};
