//! PnL ledger (C2, spec.md §4.2). The halt-latch invariant (§8: "`halted`
//! becomes true in the same transaction that first observes `pnlPct ≥
//! dailyTargetPct`") is enforced by folding the recompute into the same
//! `UPDATE` that applies the increment — mirroring `mqk-db`'s CAS-style
//! single-statement state transitions.

use anyhow::{Context, Result};
use chrono::Utc;
use qf_wire::PnLDay;
use sqlx::PgPool;

/// Pure recompute: `pnlPct = pnlUsd*100/startEquity`; halt latches once
/// `pnlPct >= dailyTargetPct` and stays latched (a caller never un-latches
/// by calling this — only `set_halted`/`reset_day` do).
pub fn recompute(start_equity: f64, pnl_usd: f64, daily_target_pct: f64, already_halted: bool) -> (f64, bool, Option<&'static str>) {
    let pnl_pct = if start_equity != 0.0 {
        pnl_usd * 100.0 / start_equity
    } else {
        0.0
    };
    if already_halted {
        return (pnl_pct, true, None);
    }
    if pnl_pct >= daily_target_pct {
        (pnl_pct, true, Some("daily_target_reached"))
    } else {
        (pnl_pct, false, None)
    }
}

fn today() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

pub async fn init_day_if_needed(
    pool: &PgPool,
    start_equity: f64,
    daily_target_pct: f64,
) -> Result<PnLDay> {
    let date = today();
    sqlx::query(
        "INSERT INTO pnl_day (date, start_equity, pnl_usd, pnl_pct, daily_target_pct, halted) \
         VALUES ($1, $2, 0, 0, $3, false) \
         ON CONFLICT (date) DO NOTHING",
    )
    .bind(&date)
    .bind(start_equity)
    .bind(daily_target_pct)
    .execute(pool)
    .await
    .context("init_day_if_needed")?;

    get(pool).await
}

pub async fn get(pool: &PgPool) -> Result<PnLDay> {
    let date = today();
    let row: (String, f64, f64, f64, f64, bool, Option<String>, chrono::DateTime<Utc>) =
        sqlx::query_as(
            "SELECT date, start_equity, pnl_usd, pnl_pct, daily_target_pct, halted, halt_reason, updated_at \
             FROM pnl_day WHERE date = $1",
        )
        .bind(&date)
        .fetch_one(pool)
        .await
        .context("get pnl_day")?;

    Ok(PnLDay {
        date: row.0,
        start_equity: row.1,
        pnl_usd: row.2,
        pnl_pct: row.3,
        daily_target_pct: row.4,
        halted: row.5,
        halt_reason: row.6,
        updated_at: row.7,
    })
}

/// Atomic read-modify-write: the only mutator of `pnl_usd` (spec.md §4.2).
/// Locks the row with `SELECT ... FOR UPDATE` to capture the pre-increment
/// `halted` flag, then applies the same single-`UPDATE` recompute+latch as
/// before inside the same transaction — no reader can observe a torn state
/// between the increment and the halt flag, and the caller learns whether
/// this call is the one that flipped the latch (spec.md §8: "`halted`
/// becomes true in the same transaction that first observes `pnlPct ≥
/// dailyTargetPct`") without a second race-prone read afterward.
pub async fn increment(pool: &PgPool, profit_usd: f64) -> Result<(PnLDay, bool)> {
    let date = today();
    let mut tx = pool.begin().await.context("begin increment transaction")?;

    let (was_halted,): (bool,) =
        sqlx::query_as("SELECT halted FROM pnl_day WHERE date = $1 FOR UPDATE")
            .bind(&date)
            .fetch_one(&mut *tx)
            .await
            .context("lock pnl_day row")?;

    let row: (String, f64, f64, f64, f64, bool, Option<String>, chrono::DateTime<Utc>) =
        sqlx::query_as(
            "UPDATE pnl_day SET \
               pnl_usd = pnl_usd + $2, \
               pnl_pct = CASE WHEN start_equity <> 0 THEN (pnl_usd + $2) * 100.0 / start_equity ELSE 0 END, \
               halted = halted OR (CASE WHEN start_equity <> 0 THEN (pnl_usd + $2) * 100.0 / start_equity ELSE 0 END >= daily_target_pct), \
               halt_reason = CASE \
                 WHEN halted THEN halt_reason \
                 WHEN (CASE WHEN start_equity <> 0 THEN (pnl_usd + $2) * 100.0 / start_equity ELSE 0 END >= daily_target_pct) \
                   THEN 'daily_target_reached' \
                 ELSE halt_reason \
               END, \
               updated_at = now() \
             WHERE date = $1 \
             RETURNING date, start_equity, pnl_usd, pnl_pct, daily_target_pct, halted, halt_reason, updated_at",
        )
        .bind(&date)
        .bind(profit_usd)
        .fetch_one(&mut *tx)
        .await
        .context("increment pnl_day")?;

    tx.commit().await.context("commit increment transaction")?;

    let day = PnLDay {
        date: row.0,
        start_equity: row.1,
        pnl_usd: row.2,
        pnl_pct: row.3,
        daily_target_pct: row.4,
        halted: row.5,
        halt_reason: row.6,
        updated_at: row.7,
    };
    let just_latched = !was_halted && day.halted;
    Ok((day, just_latched))
}

pub async fn set_halted(pool: &PgPool, halted: bool, reason: Option<&str>) -> Result<PnLDay> {
    let date = today();
    sqlx::query(
        "UPDATE pnl_day SET halted = $2, halt_reason = $3, updated_at = now() WHERE date = $1",
    )
    .bind(&date)
    .bind(halted)
    .bind(reason)
    .execute(pool)
    .await
    .context("set_halted")?;
    get(pool).await
}

pub async fn reset_day(pool: &PgPool, start_equity: f64, daily_target_pct: f64) -> Result<PnLDay> {
    let date = today();
    sqlx::query(
        "INSERT INTO pnl_day (date, start_equity, pnl_usd, pnl_pct, daily_target_pct, halted, halt_reason) \
         VALUES ($1, $2, 0, 0, $3, false, NULL) \
         ON CONFLICT (date) DO UPDATE SET \
           start_equity = EXCLUDED.start_equity, \
           pnl_usd = 0, pnl_pct = 0, \
           daily_target_pct = EXCLUDED.daily_target_pct, \
           halted = false, halt_reason = NULL, updated_at = now()",
    )
    .bind(&date)
    .bind(start_equity)
    .bind(daily_target_pct)
    .execute(pool)
    .await
    .context("reset_day")?;
    get(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_latches_on_target_reached() {
        let (pct, halted, reason) = recompute(1000.0, 10.0, 1.0, false);
        assert_eq!(pct, 1.0);
        assert!(halted);
        assert_eq!(reason, Some("daily_target_reached"));
    }

    #[test]
    fn recompute_does_not_latch_below_target() {
        let (pct, halted, reason) = recompute(1000.0, 5.0, 1.0, false);
        assert_eq!(pct, 0.5);
        assert!(!halted);
        assert_eq!(reason, None);
    }

    #[test]
    fn recompute_stays_latched_once_halted() {
        let (_, halted, reason) = recompute(1000.0, -50.0, 1.0, true);
        assert!(halted);
        assert_eq!(reason, None);
    }

    #[test]
    fn recompute_handles_zero_start_equity() {
        let (pct, halted, _) = recompute(0.0, 5.0, 1.0, false);
        assert_eq!(pct, 0.0);
        assert!(!halted);
    }
}
