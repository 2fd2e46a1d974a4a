//! `opt:cooldown:loss` TTL key (spec.md §4.7/§4.8, §8 scenario 6).

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::PgPool;

/// Returns `true` if the key is absent (or expired) and was just set to
/// expire `ttl` from now — a single statement so two concurrent callers
/// cannot both observe "absent" (the loser's `INSERT ... ON CONFLICT DO
/// NOTHING` simply inserts nothing and the function reports `false`).
pub async fn try_acquire(pool: &PgPool, key: &str, ttl: Duration) -> Result<bool> {
    sqlx::query("DELETE FROM opt_cooldown WHERE key = $1 AND expires_at <= now()")
        .bind(key)
        .execute(pool)
        .await
        .context("expire stale cooldown")?;

    let result = sqlx::query(
        "INSERT INTO opt_cooldown (key, expires_at) VALUES ($1, $2) \
         ON CONFLICT (key) DO NOTHING",
    )
    .bind(key)
    .bind(Utc::now() + ttl)
    .execute(pool)
    .await
    .context("acquire cooldown")?;

    Ok(result.rows_affected() == 1)
}
