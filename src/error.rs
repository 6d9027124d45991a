//! Error types for the admission gate.
//!
//! Admission errors surface synchronously from `enqueue`; execution errors
//! surface only through `wait_for_result`. The worker loop never propagates a
//! request failure out of itself.

use thiserror::Error;

/// Errors produced by the gate and its scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("quota exceeded for tenant {tenant}: {used}/{limit} in current window")]
    QuotaExceeded {
        tenant: String,
        used: u32,
        limit: u32,
    },

    #[error("upstream rate limit retries exhausted after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("request not found")]
    NotFound,

    #[error("timed out waiting for result")]
    Timeout,

    #[error("queue full: {current}/{max} live requests")]
    QueueFull { current: usize, max: usize },

    #[error("gate is shutting down")]
    ShuttingDown,
}

impl GateError {
    /// Returns true for admission-time rejections the caller can recover from
    /// by waiting (quota window reset, queue drain).
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::QueueFull { .. } | Self::ShuttingDown
        )
    }

    /// Returns true if the request reached a terminal failure state upstream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. } | Self::Upstream(_))
    }
}
