//! spec.md §8: "For every stream entry with the same idempotency key, the
//! handler executes at most once per consumer group within the TTL
//! window." Two distinct entries sharing one idempotency key must only
//! invoke the handler once; the second is acked as a skip.
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-bus --test \
//!     scenario_consume_delivers_at_most_once_per_idempotency_key -- --ignored

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qf_bus::{ConsumeOpts, HandlerError};
use serde_json::{json, Value};
use tokio::sync::watch;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn duplicate_idempotency_key_invokes_handler_once() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let stream = format!("test.idemp.{}", Uuid::new_v4());
    let group = "test-group".to_string();

    qf_bus::append(&pool, &stream, &json!({"k": "dup"}))
        .await
        .expect("append first");
    qf_bus::append(&pool, &stream, &json!({"k": "dup"}))
        .await
        .expect("append second");

    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let opts = ConsumeOpts {
        block_ms: 20,
        batch_size: 10,
        idempotency_key_fn: |payload: &Value| {
            payload.get("k").and_then(Value::as_str).unwrap_or_default().to_string()
        },
        idempotency_ttl: chrono::Duration::seconds(86400),
        max_failures: 5,
    };

    tokio::spawn(qf_bus::consume(
        pool.clone(),
        stream.clone(),
        group.clone(),
        "consumer-1".to_string(),
        opts,
        move |_entry_id, _payload| {
            let calls = Arc::clone(&handler_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), HandlerError>(())
            }
        },
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let _ = shutdown_tx.send(true);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let pending = qf_bus::pending_count(&pool, &stream, &group).await.expect("pending_count");
    assert_eq!(pending, 0);
}
