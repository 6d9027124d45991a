//! Queued request type and its lifecycle states.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::GateError;

/// Unique request identifier, generated at enqueue.
pub type RequestId = Uuid;

/// Terminal outcome published to waiters.
pub type Outcome = Result<Value, GateError>;

/// Caller-facing priority constants. `base_priority` may be any value in
/// 0..=100; these are the conventional tiers.
pub mod priority {
    pub const CRITICAL: u8 = 100;
    pub const HIGH: u8 = 80;
    pub const NORMAL: u8 = 50;
    pub const LOW: u8 = 20;
}

/// Per-user privilege tier, used as a scheduling bonus and tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    /// Score bonus added to `base_priority` for this role.
    pub fn bonus(self) -> i32 {
        match self {
            Self::Owner => 15,
            Self::Admin => 10,
            Self::Member => 0,
            Self::Viewer => -10,
        }
    }
}

/// Request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Running,
    /// Backed off after an upstream 429; retried once the tenant is healthy.
    Deferred,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Pending or deferred: waiting for dispatch.
    pub fn is_queued(self) -> bool {
        matches!(self, Self::Pending | Self::Deferred)
    }
}

/// A request admitted to the queue.
///
/// `enqueued_at` is immutable for the lifetime of the request — a deferred
/// request keeps its original arrival time so its aging bonus keeps accruing.
pub struct QueuedRequest {
    pub id: RequestId,
    pub tenant_id: String,
    pub user_id: String,
    pub role: Role,
    pub endpoint: String,
    pub params: Value,
    pub base_priority: u8,
    pub enqueued_at: Instant,
    pub state: RequestState,
    pub attempt_count: u32,
    pub completed_at: Option<Instant>,
    /// Publishes the terminal outcome; waiters may attach and re-attach.
    done_tx: watch::Sender<Option<Outcome>>,
}

impl std::fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("state", &self.state)
            .field("attempt_count", &self.attempt_count)
            .finish()
    }
}

impl QueuedRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: String,
        user_id: String,
        role: Role,
        endpoint: String,
        params: Value,
        base_priority: u8,
        enqueued_at: Instant,
    ) -> Self {
        let (done_tx, _) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            role,
            endpoint,
            params,
            base_priority: base_priority.min(100),
            enqueued_at,
            state: RequestState::Pending,
            attempt_count: 0,
            completed_at: None,
            done_tx,
        }
    }

    /// Attach a waiter. The receiver observes the terminal outcome whenever
    /// it is published, even if the waiter subscribes afterwards.
    pub fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.done_tx.subscribe()
    }

    /// Publish the terminal outcome to all current and future waiters.
    pub fn publish(&self, outcome: Outcome) {
        self.done_tx.send_replace(Some(outcome));
    }
}
