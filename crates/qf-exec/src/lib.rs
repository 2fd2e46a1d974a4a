//! Executor worker's exchange boundary (C5, spec.md §4.5/§6).
//!
//! `ExchangeAdapter` is the single trait every broker implementation (paper,
//! live) satisfies. `ExecutionGateway` is the single choke-point through
//! which every order flows — modeled on `mqk_execution::gateway::BrokerGateway`'s
//! "all broker operations pass through one place" invariant, generalized
//! here to enforce application-level idempotency (spec.md §4.5: "double-bound"
//! with the stream runtime) rather than integrity/risk/reconcile gates,
//! since those gates live upstream of the executor in this fleet (at the
//! orchestrator and risk worker).

mod live;
mod paper;

pub use live::LiveAdapter;
pub use paper::PaperAdapter;

use anyhow::Result;
use async_trait::async_trait;
use qf_wire::{ExecStatus, ExecStatusKind, Order};
use sqlx::PgPool;

/// Outcome of placing an order with the exchange. Paper adapters compute
/// `price`/`fee`/`profit` deterministically from config; live adapters
/// report them straight from the exchange response (spec.md §6).
#[derive(Debug, Clone)]
pub struct PlaceOrderOutcome {
    pub filled: bool,
    pub price: Option<f64>,
    pub fee: Option<f64>,
    pub profit: Option<f64>,
    pub raw: Option<serde_json::Value>,
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn place_order(&self, order: &Order) -> Result<PlaceOrderOutcome>;
}

/// Runtime-selected adapter (spec.md §6 `EXCHANGE` ENUMERATED: paper/binance/
/// coinbase). One enum so `executor-worker` can hold a single concrete
/// `ExecutionGateway<Adapter>` chosen at startup instead of boxing a trait
/// object, mirroring `mqk_execution::gateway::BrokerGateway`'s single
/// concrete-broker-per-process setup.
pub enum Adapter {
    Paper(PaperAdapter),
    Live(LiveAdapter),
}

#[async_trait]
impl ExchangeAdapter for Adapter {
    async fn place_order(&self, order: &Order) -> Result<PlaceOrderOutcome> {
        match self {
            Adapter::Paper(a) => a.place_order(order).await,
            Adapter::Live(a) => a.place_order(order).await,
        }
    }
}

/// Validate an incoming order before it ever reaches an adapter (spec.md
/// §4.5 step 1: "Reject malformed orders").
pub fn validate(order: &Order) -> Result<(), &'static str> {
    if order.qty <= 0 {
        return Err("qty must be > 0");
    }
    Ok(())
}

/// The single path into an `ExchangeAdapter`. Checks `qf_kv::orders` for a
/// terminal status keyed by `orderId` before ever calling the adapter
/// (spec.md §4.5 step 2), persists the result, and returns the `ExecStatus`
/// to emit on `exec.status`.
pub struct ExecutionGateway<A: ExchangeAdapter> {
    adapter: A,
}

impl<A: ExchangeAdapter> ExecutionGateway<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub async fn submit(&self, pool: &PgPool, order: &Order) -> Result<ExecStatus> {
        if let Err(reason) = validate(order) {
            tracing::warn!(order_id = %order.order_id, reason, "order validation failed");
            return Ok(ExecStatus {
                order_id: order.order_id,
                symbol: order.symbol.clone(),
                side: order.side,
                qty: order.qty,
                status: ExecStatusKind::Rejected,
                price: None,
                fee: None,
                profit: None,
                trace_id: order.trace_id,
                ts: chrono::Utc::now(),
            });
        }

        if let Some(existing) = qf_kv::orders::load(pool, order.order_id).await? {
            if existing.status.is_terminal() {
                tracing::info!(order_id = %order.order_id, "order_duplicate_skip");
                return Ok(existing);
            }
        }

        let outcome = self.adapter.place_order(order).await?;
        let status = ExecStatus {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            status: if outcome.filled {
                ExecStatusKind::Filled
            } else {
                ExecStatusKind::Failed
            },
            price: outcome.price,
            fee: outcome.fee,
            profit: outcome.profit,
            trace_id: order.trace_id,
            ts: chrono::Utc::now(),
        };

        qf_kv::orders::store(pool, &status).await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qf_wire::Side;
    use uuid::Uuid;

    #[test]
    fn validate_rejects_non_positive_qty() {
        let order = Order {
            order_id: Uuid::nil(),
            symbol: "BTC-USD".to_string(),
            side: Side::Buy,
            qty: 0,
            trace_id: Uuid::nil(),
            ts: chrono::Utc::now(),
        };
        assert!(validate(&order).is_err());
    }

    #[test]
    fn validate_accepts_positive_qty() {
        let order = Order {
            order_id: Uuid::nil(),
            symbol: "BTC-USD".to_string(),
            side: Side::Buy,
            qty: 1,
            trace_id: Uuid::nil(),
            ts: chrono::Utc::now(),
        };
        assert!(validate(&order).is_ok());
    }
}
