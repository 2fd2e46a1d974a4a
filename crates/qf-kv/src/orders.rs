//! `exec:orders:<orderId>` — application-level idempotency for the
//! executor, double-bound with the stream runtime's own idempotency gate
//! (spec.md §4.5).

use anyhow::{Context, Result};
use qf_wire::ExecStatus;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn load(pool: &PgPool, order_id: Uuid) -> Result<Option<ExecStatus>> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT payload FROM exec_orders WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(pool)
            .await
            .context("load exec_order")?;

    row.map(|(payload,)| serde_json::from_value(payload).context("deserialize exec_order"))
        .transpose()
}

pub async fn store(pool: &PgPool, status: &ExecStatus) -> Result<()> {
    let payload = serde_json::to_value(status).context("serialize exec_order")?;
    sqlx::query(
        "INSERT INTO exec_orders (order_id, status, payload) VALUES ($1, $2, $3) \
         ON CONFLICT (order_id) DO UPDATE SET status = EXCLUDED.status, payload = EXCLUDED.payload, updated_at = now()",
    )
    .bind(status.order_id)
    .bind(format!("{:?}", status.status))
    .bind(payload)
    .execute(pool)
    .await
    .context("store exec_order")?;
    Ok(())
}
