//! spec.md §8 scenario 1/2, exercised at the `pipeline::apply_fill` level
//! (the fold `exec.status(filled) -> Increment -> halt latch -> halt
//! command + notify event` that both the synchronous HTTP path and the
//! `exec.status` stream consumer share, per spec.md §4.8).
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p orchestrator --test \
//!     scenario_apply_fill_halts_at_daily_target -- --ignored

use chrono::Utc;
use orchestrator::pipeline::apply_fill;
use qf_config::settings::{Exchange, Settings};
use qf_wire::{ExecStatus, ExecStatusKind, Side};
use std::time::Duration;
use uuid::Uuid;

fn settings() -> Settings {
    Settings {
        start_equity: 1000.0,
        daily_target_pct: 1.0,
        comm_mode: qf_wire::CommMode::Pubsub,
        stream_idemp_ttl_seconds: 86_400,
        stream_max_failures: 5,
        enable_opt_on_loss: false,
        opt_min_loss: 1.0,
        opt_cooldown_seconds: 1_800,
        exchange: Exchange::Paper,
        paper_price_default: 100.0,
        exchange_fee_bps: 0.0,
        slippage_bps: 0.0,
        admin_token_file: "/dev/null".to_string(),
        port: 0,
        database_url: String::new(),
        inter_service_timeout: Duration::from_secs(5),
        shutdown_deadline: Duration::from_secs(30),
    }
}

fn filled(symbol: &str, profit: f64) -> ExecStatus {
    ExecStatus {
        order_id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        side: Side::Buy,
        qty: 1,
        status: ExecStatusKind::Filled,
        price: Some(100.0),
        fee: Some(0.0),
        profit: Some(profit),
        trace_id: Uuid::new_v4(),
        ts: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
async fn second_five_dollar_fill_latches_halted_at_one_percent() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let settings = settings();

    qf_kv::pnl::reset_day(&pool, settings.start_equity, settings.daily_target_pct)
        .await
        .expect("reset_day");

    apply_fill(&pool, &settings, &filled("BTC-USD", 5.0))
        .await
        .expect("first fill");
    let after_first = qf_kv::pnl::get(&pool).await.expect("get after first fill");
    assert_eq!(after_first.pnl_usd, 5.0);
    assert!(!after_first.halted);

    apply_fill(&pool, &settings, &filled("BTC-USD", 5.0))
        .await
        .expect("second fill");
    let after_second = qf_kv::pnl::get(&pool).await.expect("get after second fill");
    assert_eq!(after_second.pnl_usd, 10.0);
    assert_eq!(after_second.pnl_pct, 1.0);
    assert!(after_second.halted);
    assert_eq!(after_second.halt_reason.as_deref(), Some("daily_target_reached"));
}
