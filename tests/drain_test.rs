//! Shutdown and drain behavior.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fairgate::{
    EnqueueRequest, ExecuteOutcome, Gate, GateConfig, GateError, Role, ShutdownResult,
    UpstreamExecutor,
};

struct SleepyExecutor {
    delay: Duration,
}

#[async_trait]
impl UpstreamExecutor for SleepyExecutor {
    async fn execute(&self, _endpoint: &str, _params: &Value) -> ExecuteOutcome {
        tokio::time::sleep(self.delay).await;
        ExecuteOutcome::Success(json!({"ok": true}))
    }
}

fn request(tenant: &str) -> EnqueueRequest {
    EnqueueRequest::new(tenant, "user-1", Role::Member, "runReport")
}

#[tokio::test]
async fn shutdown_drains_in_flight_requests() {
    let executor = Arc::new(SleepyExecutor {
        delay: Duration::from_millis(100),
    });
    let gate = Arc::new(Gate::new(GateConfig::default(), executor));

    let id = gate.enqueue(request("acme")).await.unwrap();
    // Let a worker claim the request before draining.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiter = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.wait_for_result(id, Duration::from_secs(2)).await })
    };

    let result = gate.shutdown(Duration::from_secs(2)).await;
    assert_eq!(result, ShutdownResult::Complete);

    // The in-flight dispatch was allowed to finish and deliver its result.
    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(outcome, json!({"ok": true}));
}

#[tokio::test]
async fn enqueue_after_shutdown_is_rejected() {
    let executor = Arc::new(SleepyExecutor {
        delay: Duration::ZERO,
    });
    let gate = Gate::new(GateConfig::default(), executor);

    gate.shutdown(Duration::from_secs(1)).await;

    let err = gate.enqueue(request("acme")).await.unwrap_err();
    assert_eq!(err, GateError::ShuttingDown);
}

#[tokio::test]
async fn shutdown_timeout_reports_remaining_work() {
    let executor = Arc::new(SleepyExecutor {
        delay: Duration::from_secs(10),
    });
    let config = GateConfig {
        worker_count: 1,
        ..Default::default()
    };
    let gate = Gate::new(config, executor);

    gate.enqueue(request("acme")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = gate.shutdown(Duration::from_millis(50)).await;
    assert_eq!(result, ShutdownResult::Timeout { remaining: 1 });
}

#[tokio::test]
async fn shutdown_with_idle_workers_completes_quickly() {
    let executor = Arc::new(SleepyExecutor {
        delay: Duration::ZERO,
    });
    let gate = Gate::new(GateConfig::default(), executor);

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        gate.shutdown(Duration::from_secs(1)),
    )
    .await
    .expect("shutdown must not hang on an idle pool");
    assert_eq!(result, ShutdownResult::Complete);
}
