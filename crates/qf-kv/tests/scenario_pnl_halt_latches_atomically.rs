//! spec.md §8 scenario 1/2: with `startEquity=1000, dailyTargetPct=1`, two
//! `profit=5` fills latch `halted=true` on the second one (`pnlPct=1.0 >=
//! 1.0`), and the latch is observed atomically with the balance that
//! tripped it.
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p qf-kv --test \
//!     scenario_pnl_halt_latches_atomically -- --ignored

#[tokio::test]
#[ignore]
async fn second_fill_reaches_target_and_latches_halted() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");

    let day = qf_kv::pnl::reset_day(&pool, 1000.0, 1.0).await.expect("reset_day");
    assert!(!day.halted);
    assert_eq!(day.pnl_usd, 0.0);

    let (day, just_latched) = qf_kv::pnl::increment(&pool, 5.0).await.expect("first increment");
    assert_eq!(day.pnl_usd, 5.0);
    assert_eq!(day.pnl_pct, 0.5);
    assert!(!day.halted);
    assert!(!just_latched);

    let (day, just_latched) = qf_kv::pnl::increment(&pool, 5.0).await.expect("second increment");
    assert_eq!(day.pnl_usd, 10.0);
    assert_eq!(day.pnl_pct, 1.0);
    assert!(day.halted, "pnlPct >= dailyTargetPct must latch halted");
    assert!(just_latched, "this call is the one that first observed the target");
    assert_eq!(day.halt_reason.as_deref(), Some("daily_target_reached"));

    // A third fill must observe the latch stays set (no un-latching on
    // further increments) and this call must report it did not just latch.
    let (day, just_latched) = qf_kv::pnl::increment(&pool, -1.0).await.expect("third increment");
    assert!(day.halted);
    assert!(!just_latched);
}
