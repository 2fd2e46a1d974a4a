//! spec.md §8: "For every entry that fails `maxFailures` times, it appears
//! exactly once in the corresponding DLQ and exactly once is acked on the
//! original stream."
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-bus --test \
//!     scenario_poison_entry_lands_in_dlq_exactly_once -- --ignored

use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use qf_wire::streams::dlq_name;
use serde_json::{json, Value};
use tokio::sync::watch;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn poison_entry_dlqs_after_max_failures_and_acks_exactly_once() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let stream = format!("test.poison.{}", Uuid::new_v4());
    let group = "test-group".to_string();
    let dlq = dlq_name(&stream);

    qf_bus::append(&pool, &stream, &json!({"k": "poison"}))
        .await
        .expect("append poison entry");

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
        |_entry_id, _payload| async {
            Err::<(), HandlerError>(HandlerError::Permanent("always fails".to_string()))
        },
        shutdown_rx,
    ));

    // 3 poll ticks at block_ms=20 is plenty for 3 redeliveries; give it
    // generous headroom against scheduler jitter.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let _ = shutdown_tx.send(true);

    let pending = qf_bus::pending_count(&pool, &stream, &group).await.expect("pending_count");
    assert_eq!(pending, 0, "original entry must be acked once DLQ'd");

    let entries = qf_bus::range_dlq(&pool, &dlq, 0, i64::MAX, 100)
        .await
        .expect("range dlq");
    assert_eq!(entries.len(), 1, "entry must appear exactly once in the DLQ");
    assert_eq!(entries[0].original_stream, stream);
    assert!(entries[0].failures >= 3);
}
