//! Env-sourced runtime settings (spec.md §6 "Configuration (ENUMERATED)").
//!
//! These are plain process env vars, not the layered-YAML static config —
//! the distinction mirrors the teacher's own split between `mqk-config`'s
//! file-based layer and `mqk-config::secrets`' env-based layer.

use anyhow::{Context, Result};
use qf_wire::CommMode;
use std::env;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={v}: {e}")),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub start_equity: f64,
    pub daily_target_pct: f64,
    pub comm_mode: CommMode,
    pub stream_idemp_ttl_seconds: i64,
    pub stream_max_failures: i32,
    pub enable_opt_on_loss: bool,
    pub opt_min_loss: f64,
    pub opt_cooldown_seconds: i64,
    pub exchange: Exchange,
    pub paper_price_default: f64,
    pub exchange_fee_bps: f64,
    pub slippage_bps: f64,
    pub admin_token_file: String,
    pub port: u16,
    pub database_url: String,
    pub inter_service_timeout: Duration,
    pub shutdown_deadline: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Paper,
    Binance,
    Coinbase,
}

impl std::str::FromStr for Exchange {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "paper" => Ok(Exchange::Paper),
            "binance" => Ok(Exchange::Binance),
            "coinbase" => Ok(Exchange::Coinbase),
            other => Err(anyhow::anyhow!("unknown EXCHANGE: {other}")),
        }
    }
}

// `CommMode` lives in qf-wire without a FromStr impl (it has no business
// reason to parse itself there); parse the env var locally instead of
// adding an env-parsing dependency to the wire crate.
fn parse_comm_mode(raw: &str) -> Result<CommMode> {
    match raw {
        "http" => Ok(CommMode::Http),
        "pubsub" => Ok(CommMode::Pubsub),
        "hybrid" => Ok(CommMode::Hybrid),
        other => Err(anyhow::anyhow!("unknown COMM_MODE: {other}")),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Settings {
            start_equity: parse_env("START_EQUITY", 10_000.0)?,
            daily_target_pct: parse_env("DAILY_TARGET_PCT", 2.0)?,
            comm_mode: parse_comm_mode(&env_or("COMM_MODE", "pubsub"))?,
            stream_idemp_ttl_seconds: parse_env("STREAM_IDEMP_TTL_SECONDS", 86_400)?,
            stream_max_failures: parse_env("STREAM_MAX_FAILURES", 5)?,
            enable_opt_on_loss: parse_env("ENABLE_OPT_ON_LOSS", false)?,
            opt_min_loss: parse_env("OPT_MIN_LOSS", 1.0)?,
            opt_cooldown_seconds: parse_env("OPT_COOLDOWN_SECONDS", 1_800)?,
            exchange: env_or("EXCHANGE", "paper").parse()?,
            paper_price_default: parse_env("PAPER_PRICE_DEFAULT", 100.0)?,
            exchange_fee_bps: parse_env("EXCHANGE_FEE_BPS", 0.0)?,
            slippage_bps: parse_env("SLIPPAGE_BPS", 0.0)?,
            admin_token_file: env_or("ADMIN_TOKEN_FILE", "/run/secrets/admin_token"),
            port: parse_env("PORT", 8080)?,
            database_url: env::var("POSTGRES_URL")
                .or_else(|_| env::var("DATABASE_URL"))
                .context("POSTGRES_URL or DATABASE_URL must be set")?,
            inter_service_timeout: Duration::from_secs(5),
            shutdown_deadline: Duration::from_secs(
                parse_env("SHUTDOWN_DEADLINE_SECONDS", 30u64)?,
            ),
        })
    }
}

/// Base URL for a sibling service, per spec.md §6's `*_URL for sibling
/// services` convention. `RISK_URL`, `ANALYST_URL`, `EXECUTOR_URL`, ...
pub fn sibling_url(service: &str) -> Result<String> {
    let key = format!("{}_URL", service.to_uppercase());
    env::var(&key).with_context(|| format!("{key} must be set"))
}
