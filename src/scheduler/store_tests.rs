//! Tests for queue store selection, positions, and lifecycle transitions.

use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::scheduler::request::{priority, Role};

fn store() -> QueueStore {
    QueueStore::new(ScorePolicy::default(), None)
}

fn request(tenant: &str, role: Role, base_priority: u8, enqueued_at: Instant) -> QueuedRequest {
    QueuedRequest::new(
        tenant.into(),
        "user-1".into(),
        role,
        "runReport".into(),
        json!({"metric": "sessions"}),
        base_priority,
        enqueued_at,
    )
}

#[test]
fn owner_outranks_member_at_equal_priority() {
    let mut store = store();
    let t0 = Instant::now();

    let member = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    let owner = store.insert(request("acme", Role::Owner, priority::NORMAL, t0));

    assert_eq!(store.position(owner, t0).unwrap(), 1);
    assert_eq!(store.position(member, t0).unwrap(), 2);

    let claim = store.claim_best(t0, |_| true).unwrap();
    assert_eq!(claim.id, owner);
}

#[test]
fn fifo_within_same_role_and_priority() {
    let mut store = store();
    let t0 = Instant::now();

    let ids: Vec<_> = (0..3)
        .map(|i| {
            store.insert(request(
                "acme",
                Role::Member,
                priority::NORMAL,
                t0 + Duration::from_millis(i),
            ))
        })
        .collect();

    let now = t0 + Duration::from_millis(10);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.position(*id, now).unwrap(), i + 1);
    }
    for id in &ids {
        assert_eq!(store.claim_best(now, |_| true).unwrap().id, *id);
    }
}

#[test]
fn claim_marks_running_and_counts_attempt() {
    let mut store = store();
    let t0 = Instant::now();
    let id = store.insert(request("acme", Role::Member, priority::NORMAL, t0));

    let claim = store.claim_best(t0, |_| true).unwrap();
    assert_eq!(claim.attempt_count, 1);
    assert_eq!(store.state_of(id), Some(RequestState::Running));

    // The claimed request is no longer selectable.
    assert!(store.claim_best(t0, |_| true).is_none());
}

#[test]
fn claim_skips_ineligible_tenants() {
    let mut store = store();
    let t0 = Instant::now();

    store.insert(request("acme", Role::Owner, priority::CRITICAL, t0));
    let low = store.insert(request("globex", Role::Viewer, priority::LOW, t0));

    // acme is backed off: even its critical request must not be claimed.
    let claim = store.claim_best(t0, |tenant| tenant != "acme").unwrap();
    assert_eq!(claim.id, low);
}

#[test]
fn deferred_request_retains_arrival_order() {
    let mut store = store();
    let t0 = Instant::now();
    let first = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    let second = store.insert(request(
        "acme",
        Role::Member,
        priority::NORMAL,
        t0 + Duration::from_millis(1),
    ));

    let claim = store.claim_best(t0, |_| true).unwrap();
    assert_eq!(claim.id, first);
    store.settle_deferred(first);

    // Back in the queue with its original arrival time: still ahead.
    let now = t0 + Duration::from_secs(1);
    assert_eq!(store.state_of(first), Some(RequestState::Deferred));
    assert_eq!(store.position(first, now).unwrap(), 1);
    assert_eq!(store.position(second, now).unwrap(), 2);

    let reclaim = store.claim_best(now, |_| true).unwrap();
    assert_eq!(reclaim.id, first);
    assert_eq!(reclaim.attempt_count, 2);
}

#[test]
fn position_is_zero_while_running_and_gone_when_terminal() {
    let mut store = store();
    let t0 = Instant::now();
    let id = store.insert(request("acme", Role::Member, priority::NORMAL, t0));

    store.claim_best(t0, |_| true).unwrap();
    assert_eq!(store.position(id, t0).unwrap(), 0);

    store.settle_success(id, json!({"rows": 3}), t0);
    assert_eq!(store.position(id, t0), Err(GateError::NotFound));
    assert_eq!(
        store.position(RequestId::new_v4(), t0),
        Err(GateError::NotFound)
    );
}

#[test]
fn positions_shrink_as_requests_ahead_complete() {
    let mut store = store();
    let t0 = Instant::now();
    let ids: Vec<_> = (0..4)
        .map(|i| {
            store.insert(request(
                "acme",
                Role::Member,
                priority::NORMAL,
                t0 + Duration::from_millis(i),
            ))
        })
        .collect();

    let now = t0 + Duration::from_millis(10);
    let last = ids[3];
    let mut previous = store.position(last, now).unwrap();
    assert_eq!(previous, 4);

    for id in &ids[..3] {
        store.claim_best(now, |_| true).unwrap();
        store.settle_success(*id, json!({}), now);
        let current = store.position(last, now).unwrap();
        assert!(current <= previous, "position must never move backwards");
        previous = current;
    }
    assert_eq!(previous, 1);
}

#[test]
fn position_scoped_to_tenant() {
    let mut store = store();
    let t0 = Instant::now();

    store.insert(request("globex", Role::Owner, priority::CRITICAL, t0));
    let acme = store.insert(request(
        "acme",
        Role::Member,
        priority::LOW,
        t0 + Duration::from_millis(1),
    ));

    // globex's higher-ranked request does not push acme's rank down.
    assert_eq!(store.position(acme, t0 + Duration::from_millis(2)).unwrap(), 1);
}

#[test]
fn capacity_bound_rejects_when_full() {
    let mut store = QueueStore::new(ScorePolicy::default(), Some(2));
    let t0 = Instant::now();

    store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    store.insert(request("acme", Role::Member, priority::NORMAL, t0));

    assert_eq!(
        store.check_capacity(),
        Err(GateError::QueueFull { current: 2, max: 2 })
    );

    // A running request still occupies capacity.
    store.claim_best(t0, |_| true).unwrap();
    assert!(store.check_capacity().is_err());
}

#[test]
fn sweep_evicts_only_expired_terminals() {
    let mut store = store();
    let t0 = Instant::now();
    let ttl = Duration::from_secs(300);

    let done = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    let live = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    store.claim_best(t0, |_| true).unwrap();
    store.settle_success(done, json!({}), t0);

    store.sweep_expired(t0 + ttl - Duration::from_secs(1), ttl);
    assert!(store.state_of(done).is_some(), "not yet expired");

    store.sweep_expired(t0 + ttl, ttl);
    assert!(store.state_of(done).is_none(), "expired terminal swept");
    assert!(store.state_of(live).is_some(), "live requests never swept");
}

#[test]
fn settle_publishes_outcome_to_late_subscribers() {
    let mut store = store();
    let t0 = Instant::now();
    let id = store.insert(request("acme", Role::Member, priority::NORMAL, t0));

    store.claim_best(t0, |_| true).unwrap();
    store.settle_success(id, json!({"rows": 7}), t0);

    // Subscribing after completion still observes the outcome.
    let rx = store.subscribe(id).unwrap();
    let outcome = rx.borrow().clone().expect("terminal outcome published");
    assert_eq!(outcome.unwrap(), json!({"rows": 7}));
}

#[test]
fn tenant_depth_counts_all_live_states() {
    let mut store = store();
    let t0 = Instant::now();

    let a = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    store.insert(request(
        "acme",
        Role::Member,
        priority::NORMAL,
        t0 + Duration::from_millis(1),
    ));
    store.insert(request("globex", Role::Member, priority::NORMAL, t0));

    let claim = store.claim_best(t0, |tenant| tenant == "acme").unwrap();
    assert_eq!(claim.id, a);
    store.settle_deferred(a);
    assert_eq!(store.tenant_depth("acme"), 2);

    let b = store.claim_best(t0, |tenant| tenant == "acme").unwrap();
    assert_eq!(b.id, a, "deferred request is first in line again");
    assert_eq!(store.tenant_depth("acme"), 2, "running still counts");

    store.settle_failure(b.id, GateError::Upstream("boom".into()), t0);
    assert_eq!(store.tenant_depth("acme"), 1);
    assert_eq!(store.tenant_depth("globex"), 1);
}

#[test]
fn queued_tenants_deduplicates() {
    let mut store = store();
    let t0 = Instant::now();

    store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    store.insert(request("globex", Role::Member, priority::NORMAL, t0));

    let mut tenants = store.queued_tenants();
    tenants.sort();
    assert_eq!(tenants, vec!["acme".to_string(), "globex".to_string()]);
}

#[test]
fn counters_track_lifecycle() {
    let mut store = store();
    let t0 = Instant::now();

    let a = store.insert(request("acme", Role::Member, priority::NORMAL, t0));
    let b = store.insert(request(
        "acme",
        Role::Member,
        priority::NORMAL,
        t0 + Duration::from_millis(1),
    ));

    let first = store.claim_best(t0, |_| true).unwrap();
    assert_eq!(first.id, a);
    store.settle_deferred(a);

    let retry = store.claim_best(t0, |_| true).unwrap();
    assert_eq!(retry.id, a, "deferred request is retried first");
    store.settle_success(a, json!({}), t0);

    let counters = store.counters();
    assert_eq!(counters.enqueued, 2);
    assert_eq!(counters.deferrals, 1);
    assert_eq!(counters.succeeded, 1);
    assert_eq!(counters.failed, 0);
    assert_eq!(store.state_of(b), Some(RequestState::Pending));
}
