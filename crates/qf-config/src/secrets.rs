//! Secret resolution. Config/env stores only env-var **names** or file
//! **paths**; this module resolves the actual values once at startup.
//! Ported from `mqk-config::secrets::resolve_secrets_for_mode`, adapted
//! from LIVE/PAPER/BACKTEST exchange modes to the spec's `EXCHANGE`
//! enum (paper/binance/coinbase) plus the admin token file.

use anyhow::{bail, Context, Result};
use std::fs;

/// Exchange API credentials. `None` for the paper exchange, which needs no
/// live secrets.
pub struct ResolvedExchangeSecrets {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedExchangeSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedExchangeSecrets")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn resolve_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve exchange credentials. `binance`/`coinbase` require both the key
/// and secret env vars to be set; `paper` requires neither (fail-closed:
/// both, not exactly-one, since a half-supplied credential pair signals
/// operator error rather than intent).
pub fn resolve_exchange_secrets(exchange: &str) -> Result<ResolvedExchangeSecrets> {
    if exchange == "paper" {
        return Ok(ResolvedExchangeSecrets {
            api_key: None,
            api_secret: None,
        });
    }

    let key_env = format!("QF_{}_API_KEY", exchange.to_uppercase());
    let secret_env = format!("QF_{}_API_SECRET", exchange.to_uppercase());

    let api_key = resolve_env(&key_env);
    let api_secret = resolve_env(&secret_env);

    match (&api_key, &api_secret) {
        (Some(_), Some(_)) => Ok(ResolvedExchangeSecrets {
            api_key,
            api_secret,
        }),
        _ => bail!("live exchange {exchange} requires {key_env} and {secret_env}"),
    }
}

/// Read the admin control-plane token from the file path given in config
/// (spec.md §6: "admin endpoints require `X-Admin-Token` equal to the token
/// loaded from the secret file path given in config").
pub struct AdminToken(String);

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AdminToken").field(&"<redacted>").finish()
    }
}

impl AdminToken {
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

pub fn load_admin_token(path: &str) -> Result<AdminToken> {
    let raw = fs::read_to_string(path).with_context(|| format!("read admin token: {path}"))?;
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        bail!("admin token file {path} is empty");
    }
    Ok(AdminToken(trimmed))
}

/// Per-severity notifier webhook URLs, resolved from env-var names.
/// Mirrors `mqk-config::secrets::ResolvedDiscordWebhooks`'s per-channel
/// `Option<String>` shape, generalized from Discord-specific channels to
/// the spec's generic severity routing.
pub struct ResolvedWebhooks {
    pub info: Option<String>,
    pub warning: Option<String>,
    pub critical: Option<String>,
}

impl std::fmt::Debug for ResolvedWebhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedWebhooks")
            .field("info", &self.info.as_ref().map(|_| "<redacted>"))
            .field("warning", &self.warning.as_ref().map(|_| "<redacted>"))
            .field("critical", &self.critical.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub fn resolve_webhooks() -> ResolvedWebhooks {
    ResolvedWebhooks {
        info: resolve_env("QF_WEBHOOK_INFO_URL"),
        warning: resolve_env("QF_WEBHOOK_WARNING_URL"),
        critical: resolve_env("QF_WEBHOOK_CRITICAL_URL"),
    }
}

/// Ticket/knowledge-base webhook targets for the integrations broker
/// (spec.md §4.9). Either may be unset — a target with no URL configured is
/// skipped by its sink rather than treated as a delivery failure.
pub struct ResolvedIntegrationSinks {
    pub ticket_url: Option<String>,
    pub kb_url: Option<String>,
}

impl std::fmt::Debug for ResolvedIntegrationSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedIntegrationSinks")
            .field("ticket_url", &self.ticket_url.as_ref().map(|_| "<redacted>"))
            .field("kb_url", &self.kb_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub fn resolve_integration_sinks() -> ResolvedIntegrationSinks {
    ResolvedIntegrationSinks {
        ticket_url: resolve_env("QF_TICKET_WEBHOOK_URL"),
        kb_url: resolve_env("QF_KB_WEBHOOK_URL"),
    }
}
