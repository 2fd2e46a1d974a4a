//! spec.md §8 scenario 6: "during the 60s cooldown no further opt requests
//! are enqueued regardless of additional losses" — modeled here at the
//! `try_acquire` level, which is the single gate the orchestrator's
//! loss-trigger path (spec.md §4.8) consults before appending to
//! `opt.requests`.
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-kv --test \
//!     scenario_cooldown_suppresses_repeat_acquire -- --ignored

use chrono::Duration;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn second_acquire_within_ttl_is_refused() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let key = format!("test:opt:cooldown:{}", Uuid::new_v4());

    let first = qf_kv::cooldown::try_acquire(&pool, &key, Duration::seconds(60))
        .await
        .expect("first acquire");
    assert!(first, "cooldown key is absent on first loss, acquire succeeds");

    let second = qf_kv::cooldown::try_acquire(&pool, &key, Duration::seconds(60))
        .await
        .expect("second acquire");
    assert!(!second, "cooldown still active, second acquire must be refused");

    // A key already expired must be acquirable again (next-window loss).
    let expired_key = format!("test:opt:cooldown:expired:{}", Uuid::new_v4());
    let acquired = qf_kv::cooldown::try_acquire(&pool, &expired_key, Duration::seconds(-1))
        .await
        .expect("acquire already-expired window");
    assert!(acquired);
    let reacquired = qf_kv::cooldown::try_acquire(&pool, &expired_key, Duration::seconds(60))
        .await
        .expect("reacquire after expiry");
    assert!(reacquired, "an expired cooldown key must be acquirable again");
}
