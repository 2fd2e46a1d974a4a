//! In-memory stand-in for the namespaces of `qf_kv` (spec.md §3 "Persisted
//! state layout") that pure-logic unit tests need without a database: PnL
//! day, risk parameters, and the loss-optimizer cooldown.

use qf_wire::{PnLDay, RiskParameters};
use std::sync::Mutex;

pub struct FakeKv {
    pnl: Mutex<Option<PnLDay>>,
    risk_params: Mutex<RiskParameters>,
    cooldowns: Mutex<std::collections::HashMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl Default for FakeKv {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeKv {
    pub fn new() -> Self {
        Self {
            pnl: Mutex::new(None),
            risk_params: Mutex::new(RiskParameters::default()),
            cooldowns: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn init_day_if_needed(&self, start_equity: f64, daily_target_pct: f64) -> PnLDay {
        let mut slot = self.pnl.lock().unwrap();
        if slot.is_none() {
            *slot = Some(PnLDay {
                date: "19700101".to_string(),
                start_equity,
                pnl_usd: 0.0,
                pnl_pct: 0.0,
                daily_target_pct,
                halted: false,
                halt_reason: None,
                updated_at: chrono::Utc::now(),
            });
        }
        slot.clone().unwrap()
    }

    pub fn get_pnl(&self) -> PnLDay {
        self.pnl.lock().unwrap().clone().expect("init_day_if_needed first")
    }

    pub fn increment(&self, profit_usd: f64) -> PnLDay {
        let mut slot = self.pnl.lock().unwrap();
        let day = slot.as_mut().expect("init_day_if_needed first");
        day.pnl_usd += profit_usd;
        day.pnl_pct = if day.start_equity != 0.0 {
            day.pnl_usd * 100.0 / day.start_equity
        } else {
            0.0
        };
        if !day.halted && day.pnl_pct >= day.daily_target_pct {
            day.halted = true;
            day.halt_reason = Some("daily_target_reached".to_string());
        }
        day.updated_at = chrono::Utc::now();
        day.clone()
    }

    pub fn set_halted(&self, halted: bool, reason: Option<&str>) -> PnLDay {
        let mut slot = self.pnl.lock().unwrap();
        let day = slot.as_mut().expect("init_day_if_needed first");
        day.halted = halted;
        day.halt_reason = reason.map(str::to_string);
        day.clone()
    }

    pub fn load_risk_params(&self) -> RiskParameters {
        self.risk_params.lock().unwrap().clone()
    }

    pub fn store_risk_params(&self, params: RiskParameters) {
        *self.risk_params.lock().unwrap() = params;
    }

    /// Returns `true` if the cooldown was absent and is now set.
    pub fn try_acquire_cooldown(&self, key: &str, ttl: chrono::Duration) -> bool {
        let mut cooldowns = self.cooldowns.lock().unwrap();
        let now = chrono::Utc::now();
        if let Some(expires_at) = cooldowns.get(key) {
            if *expires_at > now {
                return false;
            }
        }
        cooldowns.insert(key.to_string(), now + ttl);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_latches_halt_at_target() {
        let kv = FakeKv::new();
        kv.init_day_if_needed(1000.0, 1.0);
        kv.increment(5.0);
        assert!(!kv.get_pnl().halted);
        kv.increment(5.0);
        let day = kv.get_pnl();
        assert!(day.halted);
        assert_eq!(day.pnl_usd, 10.0);
    }

    #[test]
    fn cooldown_blocks_second_acquire_within_ttl() {
        let kv = FakeKv::new();
        assert!(kv.try_acquire_cooldown("opt:cooldown:loss", chrono::Duration::seconds(60)));
        assert!(!kv.try_acquire_cooldown("opt:cooldown:loss", chrono::Duration::seconds(60)));
    }
}
