//! Shared KV (spec.md §3 "Persisted state layout" / §4.2). Every namespace
//! gets its own module and its own table; no module reaches into another's
//! table, mirroring the "no worker may mutate another worker's namespace"
//! contract in spec.md §5.

pub mod cooldown;
pub mod notify;
pub mod optimizer;
pub mod orders;
pub mod pnl;
pub mod risk_params;
pub mod runs;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var("POSTGRES_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .context("POSTGRES_URL or DATABASE_URL must be set")?;
    connect(&url).await
}

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to postgres")?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run qf-kv migrations")?;
    Ok(())
}
