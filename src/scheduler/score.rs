//! Effective-score computation and dispatch ordering.
//!
//! The score is a pure function of the request and the current time — it is
//! never stored. The dispatch path and the position-query path call the same
//! comparator, so they cannot disagree about ordering.

use std::cmp::Ordering;
use std::time::Instant;

use super::request::QueuedRequest;

/// Aging parameters for the effective score.
#[derive(Debug, Clone, Copy)]
pub struct ScorePolicy {
    /// Points gained per second of waiting.
    pub aging_rate: f64,
    /// Upper bound on the aging bonus, so an old low-priority request cannot
    /// permanently outrank the highest fresh-priority tier.
    pub aging_cap: f64,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            aging_rate: 0.1,
            aging_cap: 20.0,
        }
    }
}

impl ScorePolicy {
    /// Time-based bonus for a request enqueued at `enqueued_at`.
    pub fn age_bonus(&self, now: Instant, enqueued_at: Instant) -> f64 {
        let waited = now.saturating_duration_since(enqueued_at).as_secs_f64();
        (self.aging_rate * waited).min(self.aging_cap)
    }

    /// `base_priority + role_bonus + age_bonus`.
    pub fn effective_score(&self, request: &QueuedRequest, now: Instant) -> f64 {
        f64::from(request.base_priority)
            + f64::from(request.role.bonus())
            + self.age_bonus(now, request.enqueued_at)
    }
}

/// Orders requests best-first: `Less` means `a` dispatches before `b`.
///
/// Tie-break on equal scores: higher role bonus, then earlier arrival (FIFO),
/// then request id for determinism.
pub fn dispatch_cmp(
    a: &QueuedRequest,
    b: &QueuedRequest,
    now: Instant,
    policy: &ScorePolicy,
) -> Ordering {
    let score_a = policy.effective_score(a, now);
    let score_b = policy.effective_score(b, now);
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.role.bonus().cmp(&a.role.bonus()))
        .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::scheduler::request::{priority, Role};

    fn request(role: Role, base_priority: u8, enqueued_at: Instant) -> QueuedRequest {
        QueuedRequest::new(
            "acme".into(),
            "user-1".into(),
            role,
            "runReport".into(),
            json!({}),
            base_priority,
            enqueued_at,
        )
    }

    #[test]
    fn score_sums_priority_role_and_age() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        let req = request(Role::Admin, priority::NORMAL, t0);

        let now = t0 + Duration::from_secs(50);
        // 50 + 10 + 0.1 * 50
        assert_eq!(policy.effective_score(&req, now), 65.0);
    }

    #[test]
    fn age_bonus_is_capped() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        assert_eq!(policy.age_bonus(t0 + Duration::from_secs(10_000), t0), 20.0);
    }

    #[test]
    fn owner_ranks_before_member_at_equal_priority() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        let owner = request(Role::Owner, priority::NORMAL, t0);
        let member = request(Role::Member, priority::NORMAL, t0);

        assert_eq!(dispatch_cmp(&owner, &member, t0, &policy), Ordering::Less);
        assert_eq!(dispatch_cmp(&member, &owner, t0, &policy), Ordering::Greater);
    }

    #[test]
    fn earlier_arrival_breaks_role_ties() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        let first = request(Role::Member, priority::NORMAL, t0);
        let second = request(Role::Member, priority::NORMAL, t0 + Duration::from_millis(1));

        // Equal score once the age difference is negligible at comparison
        // time t0: the earlier arrival still wins.
        assert_eq!(dispatch_cmp(&first, &second, t0, &policy), Ordering::Less);
    }

    #[test]
    fn id_breaks_full_ties_deterministically() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        let a = request(Role::Member, priority::NORMAL, t0);
        let b = request(Role::Member, priority::NORMAL, t0);

        let ab = dispatch_cmp(&a, &b, t0, &policy);
        let ba = dispatch_cmp(&b, &a, t0, &policy);
        assert_ne!(ab, Ordering::Equal);
        assert_eq!(ab, ba.reverse());
    }

    #[test]
    fn aged_low_never_outranks_fresh_critical() {
        let policy = ScorePolicy::default();
        let t0 = Instant::now();
        let old_low = request(Role::Owner, priority::LOW, t0);
        let now = t0 + Duration::from_secs(3600);
        let fresh_critical = request(Role::Viewer, priority::CRITICAL, now);

        // 20 + 15 + 20 = 55 vs 100 - 10 = 90
        assert_eq!(
            dispatch_cmp(&fresh_critical, &old_low, now, &policy),
            Ordering::Less
        );
    }
}
