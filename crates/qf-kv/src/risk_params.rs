//! Risk-parameter hot-reload channel: a singleton KV row all risk workers
//! re-read; operator approval swaps it atomically (spec.md §4.7/§8:
//! "Approving an OptJob is atomic: a reader either sees the complete
//! previous or the complete new `RiskParameters`"). Singleton-row upsert
//! ported from `mqk-db::persist_arm_state`/`load_arm_state`.

use anyhow::{Context, Result};
use qf_wire::RiskParameters;
use sqlx::PgPool;

pub async fn load(pool: &PgPool) -> Result<RiskParameters> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT params FROM risk_parameters WHERE sentinel_id = 1")
            .fetch_optional(pool)
            .await
            .context("load risk_parameters")?;

    match row {
        Some((params,)) => {
            serde_json::from_value(params).context("deserialize risk_parameters")
        }
        None => Ok(RiskParameters::default()),
    }
}

/// Atomic swap: a single-row upsert, so a concurrent reader's single
/// `SELECT` either returns the whole old row or the whole new one, never a
/// partial merge of the two (Postgres row visibility guarantees this; no
/// extra locking needed beyond the statement itself).
pub async fn store(pool: &PgPool, params: &RiskParameters) -> Result<()> {
    let json = serde_json::to_value(params).context("serialize risk_parameters")?;
    sqlx::query(
        "INSERT INTO risk_parameters (sentinel_id, params) VALUES (1, $1) \
         ON CONFLICT (sentinel_id) DO UPDATE SET params = EXCLUDED.params, updated_at = now()",
    )
    .bind(json)
    .execute(pool)
    .await
    .context("store risk_parameters")?;
    Ok(())
}
