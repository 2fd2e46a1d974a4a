//! UTC-only trading-window check (spec.md §4.3 step 3, §9 "Risk uses
//! trading-window hours in UTC in some paths and local time in others; this
//! spec fixes UTC" — REDESIGN FLAG honored literally: no `chrono::Local`
//! import anywhere in this crate).

use chrono::{DateTime, Timelike, Utc};

/// `start > end` wraps around midnight (e.g. 22..4 covers 22,23,0,1,2,3).
pub fn in_trading_window(start_hour: u8, end_hour: u8, now: DateTime<Utc>) -> bool {
    let h = now.hour() as u8;
    if start_hour <= end_hour {
        h >= start_hour && h < end_hour
    } else {
        h >= start_hour || h < end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        "2026-01-15T00:00:00Z"
            .parse::<DateTime<Utc>>()
            .unwrap()
            .with_hour(hour)
            .unwrap()
    }

    #[test]
    fn simple_window_excludes_end_hour() {
        assert!(!in_trading_window(9, 17, at(17)));
        assert!(in_trading_window(9, 17, at(16)));
        assert!(in_trading_window(9, 17, at(9)));
        assert!(!in_trading_window(9, 17, at(8)));
    }

    #[test]
    fn wraparound_window_two_intervals() {
        assert!(in_trading_window(22, 4, at(23)));
        assert!(in_trading_window(22, 4, at(0)));
        assert!(in_trading_window(22, 4, at(3)));
        assert!(!in_trading_window(22, 4, at(4)));
        assert!(!in_trading_window(22, 4, at(12)));
    }

    #[test]
    fn equal_start_and_end_is_never_open() {
        assert!(!in_trading_window(9, 9, at(9)));
        assert!(!in_trading_window(9, 9, at(23)));
    }
}
