//! spec.md §4.1/§5: "transient (network/KV) → leave unacked" — a handler
//! that only ever reports `HandlerError::Transient` must keep being
//! redelivered forever and never count toward `maxFailures`, unlike a
//! `Permanent` failure (see `scenario_poison_entry_lands_in_dlq_exactly_once`).
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-bus --test \
//!     scenario_transient_failures_never_reach_the_dlq -- --ignored

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::streams::dlq_name;
use serde_json::{json, Value};
use tokio::sync::watch;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn transient_entry_stays_pending_and_is_redelivered_past_max_failures() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let stream = format!("test.transient.{}", Uuid::new_v4());
    let group = "test-group".to_string();
    let dlq = dlq_name(&stream);

    qf_bus::append(&pool, &stream, &json!({"k": "flaky"}))
        .await
        .expect("append entry");

    let attempts = Arc::new(AtomicUsize::new(0));
    let handler_attempts = Arc::clone(&attempts);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let opts = ConsumeOpts {
        block_ms: 20,
        batch_size: 10,
        idempotency_key_fn: |payload: &Value| {
            payload.get("k").and_then(Value::as_str).unwrap_or_default().to_string()
        },
        idempotency_ttl: chrono::Duration::seconds(86400),
        max_failures: 3,
    };

    tokio::spawn(qf_bus::consume(
        pool.clone(),
        stream.clone(),
        group.clone(),
        "consumer-1".to_string(),
        opts,
        move |_entry_id, _payload| {
            let attempts = Arc::clone(&handler_attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), HandlerError>(HandlerError::Transient("kv unavailable".to_string()))
            }
        },
        shutdown_rx,
    ));

    // Enough poll ticks to exceed max_failures if transient failures wrongly
    // counted toward the DLQ threshold.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let _ = shutdown_tx.send(true);

    assert!(
        attempts.load(Ordering::SeqCst) > 3,
        "handler should be retried well past max_failures for transient errors"
    );

    let pending = qf_bus::pending_count(&pool, &stream, &group).await.expect("pending_count");
    assert_eq!(pending, 1, "transient failure must leave the entry unacked, not DLQ'd");

    let entries = qf_bus::range_dlq(&pool, &dlq, 0, i64::MAX, 100)
        .await
        .expect("range dlq");
    assert!(entries.is_empty(), "transient failures must never reach the DLQ");
}
