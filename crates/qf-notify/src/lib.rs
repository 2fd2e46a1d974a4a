//! Notifier's webhook sink + severity routing (C6, spec.md §4.6). Mirrors
//! `mqk_config::secrets::ResolvedDiscordWebhooks`'s per-channel URL
//! resolution, generalized from Discord-specific channels to the spec's
//! generic severity routing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use qf_wire::{Event, Severity};

#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn send(&self, url: &str, event: &Event) -> Result<()>;
}

/// Resolves a webhook URL by severity; `None` means no sink is configured
/// for that severity and the event is dropped silently (spec.md does not
/// require a catch-all sink).
#[derive(Debug, Clone)]
pub struct SeverityRouter {
    pub info: Option<String>,
    pub warning: Option<String>,
    pub critical: Option<String>,
}

impl SeverityRouter {
    pub fn url_for(&self, severity: Severity) -> Option<&str> {
        match severity {
            Severity::Info => self.info.as_deref(),
            Severity::Warning => self.warning.as_deref(),
            Severity::Critical => self.critical.as_deref(),
        }
    }
}

pub struct WebhookSink {
    http: reqwest::Client,
}

impl Default for WebhookSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSink {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotifySink for WebhookSink {
    async fn send(&self, url: &str, event: &Event) -> Result<()> {
        let response = self
            .http
            .post(url)
            .json(event)
            .send()
            .await
            .context("POST to webhook")?;

        if !response.status().is_success() {
            anyhow::bail!("webhook sink returned {}", response.status());
        }
        Ok(())
    }
}

/// Route `event` to its severity's sink and send it. Returns `Ok(None)` if
/// no sink is configured for the event's severity (not an error — a
/// deliberately unrouted severity, not a delivery failure).
pub async fn dispatch(
    sink: &dyn NotifySink,
    router: &SeverityRouter,
    event: &Event,
) -> Result<Option<()>> {
    match router.url_for(event.severity) {
        Some(url) => {
            sink.send(url, event).await?;
            Ok(Some(()))
        }
        None => {
            tracing::debug!(severity = ?event.severity, "no webhook configured, dropping");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotifySink for CountingSink {
        async fn send(&self, _url: &str, _event: &Event) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_skips_unrouted_severity() {
        let router = SeverityRouter {
            info: None,
            warning: None,
            critical: Some("https://example.invalid/critical".to_string()),
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            calls: calls.clone(),
        };
        let event = Event::info("risk_rejected", "low confidence");
        let result = dispatch(&sink, &router, &event).await.unwrap();
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispatch_routes_to_configured_severity() {
        let router = SeverityRouter {
            info: Some("https://example.invalid/info".to_string()),
            warning: None,
            critical: None,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            calls: calls.clone(),
        };
        let event = Event::info("risk_rejected", "low confidence");
        let result = dispatch(&sink, &router, &event).await.unwrap();
        assert!(result.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
