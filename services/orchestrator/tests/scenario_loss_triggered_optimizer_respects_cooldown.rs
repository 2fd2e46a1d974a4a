//! spec.md §8 scenario 6: "Two consecutive filled orders with profit=-5
//! result in exactly one opt.requests entry; during the cooldown no
//! further opt requests are enqueued regardless of additional losses."
//!
//! Requires a live Postgres reachable via QF_DATABASE_URL:
//!   QF_DATABASE_URL=... cargo test -p orchestrator --test \
//!     scenario_loss_triggered_optimizer_respects_cooldown -- --ignored

use chrono::Utc;
use orchestrator::pipeline::apply_fill;
use qf_config::settings::{Exchange, Settings};
use qf_wire::{streams, ExecStatus, ExecStatusKind, Side};
use std::time::Duration;
use uuid::Uuid;

fn settings() -> Settings {
    Settings {
        start_equity: 100_000.0,
        daily_target_pct: 50.0,
        comm_mode: qf_wire::CommMode::Pubsub,
        stream_idemp_ttl_seconds: 86_400,
        stream_max_failures: 5,
        enable_opt_on_loss: true,
        opt_min_loss: 1.0,
        opt_cooldown_seconds: 60,
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

fn losing_fill(symbol: &str) -> ExecStatus {
    ExecStatus {
        order_id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        side: Side::Buy,
        qty: 1,
        status: ExecStatusKind::Filled,
        price: Some(100.0),
        fee: Some(0.0),
        profit: Some(-5.0),
        trace_id: Uuid::new_v4(),
        ts: Utc::now(),
    }
}

async fn opt_requests_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM stream_entries WHERE stream = $1")
        .bind(streams::OPT_REQUESTS)
        .fetch_one(pool)
        .await
        .expect("count opt.requests")
        .0
}

#[tokio::test]
#[ignore]
async fn two_consecutive_losses_enqueue_exactly_one_opt_request() {
    let pool = qf_bus::testkit_db_pool().await.expect("db pool");
    let settings = settings();
    qf_kv::pnl::reset_day(&pool, settings.start_equity, settings.daily_target_pct)
        .await
        .expect("reset_day");

    let before = opt_requests_count(&pool).await;

    apply_fill(&pool, &settings, &losing_fill("BTC-USD"))
        .await
        .expect("first loss");
    let after_first = opt_requests_count(&pool).await;
    assert_eq!(after_first, before + 1, "first loss acquires the cooldown and enqueues once");

    apply_fill(&pool, &settings, &losing_fill("BTC-USD"))
        .await
        .expect("second loss");
    let after_second = opt_requests_count(&pool).await;
    assert_eq!(
        after_second, after_first,
        "second loss within the cooldown window must not enqueue again"
    );
}
