//! Integrations broker (C9, spec.md §4.9). Recast as a pure function per
//! spec.md §9's redesign flag ("Callback-heavy integration handlers →
//! recast as pure functions `handleEvent(event, deps) -> {acted, jira?,
//! notion?}`"): `handle_event` takes trait-object dependencies so it is
//! unit-testable without any transport, and the stream worker is a thin
//! wrapper that calls it and emits a metric.

use anyhow::{Context, Result};
use async_trait::async_trait;
use qf_wire::{Event, Severity};

#[async_trait]
pub trait TicketSink: Send + Sync {
    async fn create_ticket(&self, event: &Event) -> Result<String>;
}

#[async_trait]
pub trait KbSink: Send + Sync {
    async fn create_page(&self, event: &Event) -> Result<String>;
}

/// Opens a ticket by POSTing the event to a configured webhook (e.g. a
/// Jira/ticketing system's inbound-webhook endpoint). `None` URL means the
/// target is unconfigured; `create_ticket` then fails so the caller records
/// it as `TargetResult::Fail` rather than silently skipping a critical event.
pub struct WebhookTicketSink {
    http: reqwest::Client,
    url: Option<String>,
}

impl WebhookTicketSink {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl TicketSink for WebhookTicketSink {
    async fn create_ticket(&self, event: &Event) -> Result<String> {
        let url = self.url.as_deref().context("no ticket webhook configured")?;
        let response = self
            .http
            .post(url)
            .json(event)
            .send()
            .await
            .context("POST to ticket webhook")?;
        if !response.status().is_success() {
            anyhow::bail!("ticket webhook returned {}", response.status());
        }
        Ok(event_ref(event))
    }
}

/// Writes a knowledge-base entry by POSTing the event to a configured
/// webhook (e.g. a Notion/Confluence inbound integration).
pub struct WebhookKbSink {
    http: reqwest::Client,
    url: Option<String>,
}

impl WebhookKbSink {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl KbSink for WebhookKbSink {
    async fn create_page(&self, event: &Event) -> Result<String> {
        let url = self.url.as_deref().context("no kb webhook configured")?;
        let response = self
            .http
            .post(url)
            .json(event)
            .send()
            .await
            .context("POST to kb webhook")?;
        if !response.status().is_success() {
            anyhow::bail!("kb webhook returned {}", response.status());
        }
        Ok(event_ref(event))
    }
}

fn event_ref(event: &Event) -> String {
    event
        .request_id
        .map(|id| id.to_string())
        .or_else(|| event.trace_id.map(|id| id.to_string()))
        .unwrap_or_else(|| event.event_type.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetResult {
    Ok,
    Fail,
    Error,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub acted: bool,
    pub ticket: Option<TargetResult>,
    pub kb: Option<TargetResult>,
}

/// Only `severity=critical` triggers action; info/warning are no-ops
/// (spec.md §4.9). Each target is attempted independently — one failing
/// never blocks or fails the other, and a non-critical event never fails
/// the caller's stream entry.
pub async fn handle_event(
    event: &Event,
    tickets: &dyn TicketSink,
    kb: &dyn KbSink,
) -> Outcome {
    if event.severity != Severity::Critical {
        return Outcome {
            acted: false,
            ticket: None,
            kb: None,
        };
    }

    let ticket = match tickets.create_ticket(event).await {
        Ok(_) => TargetResult::Ok,
        Err(e) => {
            tracing::warn!(error = %e, "ticket sink failed");
            TargetResult::Fail
        }
    };

    let kb_result = match kb.create_page(event).await {
        Ok(_) => TargetResult::Ok,
        Err(e) => {
            tracing::warn!(error = %e, "kb sink failed");
            TargetResult::Fail
        }
    };

    Outcome {
        acted: true,
        ticket: Some(ticket),
        kb: Some(kb_result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OkSink;
    struct FailSink;

    #[async_trait]
    impl TicketSink for OkSink {
        async fn create_ticket(&self, _event: &Event) -> Result<String> {
            Ok("TICKET-1".to_string())
        }
    }
    #[async_trait]
    impl KbSink for OkSink {
        async fn create_page(&self, _event: &Event) -> Result<String> {
            Ok("page-1".to_string())
        }
    }
    #[async_trait]
    impl TicketSink for FailSink {
        async fn create_ticket(&self, _event: &Event) -> Result<String> {
            anyhow::bail!("ticket service down")
        }
    }
    #[async_trait]
    impl KbSink for FailSink {
        async fn create_page(&self, _event: &Event) -> Result<String> {
            anyhow::bail!("kb service down")
        }
    }

    fn critical_event() -> Event {
        Event::info("exec_failed", "executor returned 500").with_severity(Severity::Critical)
    }

    #[tokio::test]
    async fn non_critical_events_are_no_ops() {
        let event = Event::info("risk_rejected", "low confidence");
        let outcome = handle_event(&event, &OkSink, &OkSink).await;
        assert!(!outcome.acted);
        assert!(outcome.ticket.is_none());
        assert!(outcome.kb.is_none());
    }

    #[tokio::test]
    async fn critical_events_attempt_both_targets() {
        let outcome = handle_event(&critical_event(), &OkSink, &OkSink).await;
        assert!(outcome.acted);
        assert_eq!(outcome.ticket, Some(TargetResult::Ok));
        assert_eq!(outcome.kb, Some(TargetResult::Ok));
    }

    #[tokio::test]
    async fn one_target_failing_does_not_block_the_other() {
        let outcome = handle_event(&critical_event(), &FailSink, &OkSink).await;
        assert_eq!(outcome.ticket, Some(TargetResult::Fail));
        assert_eq!(outcome.kb, Some(TargetResult::Ok));
    }

    #[tokio::test]
    async fn webhook_ticket_sink_fails_closed_without_a_configured_url() {
        let sink = WebhookTicketSink::new(None);
        let result = sink.create_ticket(&critical_event()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn webhook_kb_sink_fails_closed_without_a_configured_url() {
        let sink = WebhookKbSink::new(None);
        let result = sink.create_page(&critical_event()).await;
        assert!(result.is_err());
    }
}
