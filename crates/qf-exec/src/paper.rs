//! Deterministic paper exchange adapter (spec.md §4.5 step 3, §6).
//! No randomness, no wall-clock-dependent price path — every fill uses the
//! configured reference price and fee schedule, following
//! `mqk_broker_paper::PaperBroker`'s "no RNG, no timestamps" design choice.

use crate::{ExchangeAdapter, PlaceOrderOutcome};
use anyhow::Result;
use async_trait::async_trait;
use qf_wire::Order;

#[derive(Debug, Clone)]
pub struct PaperAdapter {
    pub price_default: f64,
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub profit_per_trade: f64,
}

#[async_trait]
impl ExchangeAdapter for PaperAdapter {
    async fn place_order(&self, order: &Order) -> Result<PlaceOrderOutcome> {
        let notional = self.price_default * order.qty as f64;
        let fee = notional * self.fee_bps / 10_000.0;
        let slippage = notional * self.slippage_bps / 10_000.0;
        let profit = self.profit_per_trade - fee;

        Ok(PlaceOrderOutcome {
            filled: true,
            price: Some(self.price_default),
            fee: Some(fee),
            profit: Some(profit),
            raw: Some(serde_json::json!({
                "adapter": "paper",
                "notional": notional,
                "slippage": slippage,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qf_wire::Side;
    use uuid::Uuid;

    #[tokio::test]
    async fn fills_with_configured_profit_minus_fee() {
        let adapter = PaperAdapter {
            price_default: 100.0,
            fee_bps: 0.0,
            slippage_bps: 0.0,
            profit_per_trade: 5.0,
        };
        let order = Order {
            order_id: Uuid::nil(),
            symbol: "BTC-USD".to_string(),
            side: Side::Buy,
            qty: 1,
            trace_id: Uuid::nil(),
            ts: chrono::Utc::now(),
        };
        let outcome = adapter.place_order(&order).await.unwrap();
        assert!(outcome.filled);
        assert_eq!(outcome.profit, Some(5.0));
        assert_eq!(outcome.fee, Some(0.0));
    }

    #[tokio::test]
    async fn fee_is_deducted_from_profit() {
        let adapter = PaperAdapter {
            price_default: 100.0,
            fee_bps: 10.0, // 10 bps = 0.1%
            slippage_bps: 0.0,
            profit_per_trade: 5.0,
        };
        let order = Order {
            order_id: Uuid::nil(),
            symbol: "BTC-USD".to_string(),
            side: Side::Buy,
            qty: 1,
            trace_id: Uuid::nil(),
            ts: chrono::Utc::now(),
        };
        let outcome = adapter.place_order(&order).await.unwrap();
        // notional = 100, fee = 100 * 10/10000 = 0.1
        assert_eq!(outcome.fee, Some(0.1));
        assert_eq!(outcome.profit, Some(4.9));
    }
}
