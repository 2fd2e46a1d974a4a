//! spec.md §8: "Requeue is idempotent: requeueing the same DLQ id twice
//! yields one original-stream append and one DLQ deletion; the second
//! attempt is a no-op 404."
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-bus --test \
//!     scenario_requeue_is_idempotent -- --ignored

use qf_bus::RequeueOutcome;
use qf_wire::streams::dlq_name;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn requeueing_twice_is_a_no_op_the_second_time() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let stream = format!("test.requeue.{}", Uuid::new_v4());
    let dlq = dlq_name(&stream);

    let entry_id = sqlx::query_as::<_, (i64,)>(
        "INSERT INTO stream_entries (stream, payload) VALUES ($1, $2) RETURNING entry_id",
    )
    .bind(&dlq)
    .bind(json!({"k": "dlq-entry"}))
    .fetch_one(&pool)
    .await
    .expect("seed dlq entry")
    .0;

    sqlx::query(
        "INSERT INTO stream_dlq_meta (dlq_stream, entry_id, original_stream, failures, last_error) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&dlq)
    .bind(entry_id)
    .bind(&stream)
    .bind(5_i32)
    .bind("always fails")
    .execute(&pool)
    .await
    .expect("seed dlq metadata");

    let before: i64 = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM stream_entries WHERE stream = $1")
        .bind(&stream)
        .fetch_one(&pool)
        .await
        .expect("count original stream")
        .0;
    assert_eq!(before, 0);

    let first = qf_bus::requeue(&pool, &dlq, entry_id).await.expect("first requeue");
    assert!(matches!(first, RequeueOutcome::Requeued { .. }));

    let after: i64 = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM stream_entries WHERE stream = $1")
        .bind(&stream)
        .fetch_one(&pool)
        .await
        .expect("count original stream")
        .0;
    assert_eq!(after, 1, "exactly one original-stream append");

    let second = qf_bus::requeue(&pool, &dlq, entry_id).await.expect("second requeue");
    assert_eq!(second, RequeueOutcome::NotFound, "second requeue is a no-op");

    let after_second: i64 =
        sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM stream_entries WHERE stream = $1")
            .bind(&stream)
            .fetch_one(&pool)
            .await
            .expect("count original stream")
            .0;
    assert_eq!(after_second, 1, "second attempt must not append again");
}
