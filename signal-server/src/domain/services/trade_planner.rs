use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::domain::models::{Direction, OrderType, TpLotMode};
use crate::domain::services::pip_tables::order_threshold;

/// Order-type selection table (C5): given direction, intended entry, current
/// market price and a symbol-dependent threshold, choose MARKET/LIMIT/STOP.
pub fn select_order_type(direction: Direction, entry: f64, market: f64, symbol: &str, gold_market_threshold: f64) -> OrderType {
    let t = order_threshold(symbol, gold_market_threshold);
    match direction {
        Direction::Buy => {
            if entry < market - t {
                OrderType::BuyLimit
            } else if entry > market + t {
                OrderType::BuyStop
            } else {
                OrderType::BuyMarket
            }
        }
        Direction::Sell => {
            if entry > market + t {
                OrderType::SellLimit
            } else if entry < market - t {
                OrderType::SellStop
            } else {
                OrderType::SellMarket
            }
        }
    }
}

/// One planned sub-order: a take-profit price paired with the lot to place on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TpAllocation {
    pub take_profit: f64,
    pub lot_size: f64,
    pub tp_index: u32,
}

/// Splits `total_lot` across `take_profits` per the tenant's TP-splitting policy.
pub fn plan_tp_allocations(
    take_profits: &[f64],
    total_lot: f64,
    split_tps: bool,
    tp_lot_mode: TpLotMode,
    normalized_ratios: &[f64],
) -> Vec<TpAllocation> {
    if take_profits.is_empty() {
        return Vec::new();
    }
    if !split_tps || take_profits.len() == 1 {
        return vec![TpAllocation { take_profit: take_profits[0], lot_size: round2(total_lot), tp_index: 1 }];
    }

    match tp_lot_mode {
        TpLotMode::Equal => take_profits
            .iter()
            .enumerate()
            .map(|(i, tp)| TpAllocation { take_profit: *tp, lot_size: round2(total_lot), tp_index: (i + 1) as u32 })
            .collect(),
        TpLotMode::Split => take_profits
            .iter()
            .enumerate()
            .map(|(i, tp)| {
                let ratio = normalized_ratios.get(i).copied().unwrap_or(0.0);
                let lot = (round2(total_lot * ratio)).max(0.01);
                TpAllocation { take_profit: *tp, lot_size: lot, tp_index: (i + 1) as u32 }
            })
            .collect(),
    }
}

pub fn order_comment(tenant_prefix: &str, tp_index: u32) -> String {
    format!("U:{} TP{}", tenant_prefix, tp_index)
}

/// Weekend window: Friday 22:00 UTC through Sunday 22:00 UTC. Used to classify
/// a double quote failure as "market closed" vs. "symbol not found" for
/// non-crypto symbols.
pub fn is_weekend_market_closed(now: DateTime<Utc>, symbol: &str) -> bool {
    if is_crypto_symbol(symbol) {
        return false;
    }
    match now.weekday() {
        Weekday::Fri => now.hour() >= 22,
        Weekday::Sat => true,
        Weekday::Sun => now.hour() < 22,
        _ => false,
    }
}

fn is_crypto_symbol(symbol: &str) -> bool {
    const CRYPTO_PREFIXES: [&str; 4] = ["BTC", "ETH", "XRP", "LTC"];
    CRYPTO_PREFIXES.iter().any(|p| symbol.starts_with(p))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buy_below_market_minus_threshold_is_a_limit() {
        let order = select_order_type(Direction::Buy, 1.0900, 1.1000, "EURUSD", 3.0);
        assert_eq!(order, OrderType::BuyLimit);
    }

    #[test]
    fn buy_above_market_plus_threshold_is_a_stop() {
        let order = select_order_type(Direction::Buy, 1.1100, 1.1000, "EURUSD", 3.0);
        assert_eq!(order, OrderType::BuyStop);
    }

    #[test]
    fn buy_near_market_is_a_market_order() {
        let order = select_order_type(Direction::Buy, 1.10001, 1.1000, "EURUSD", 3.0);
        assert_eq!(order, OrderType::BuyMarket);
    }

    #[test]
    fn split_mode_matches_documented_example() {
        let allocations = plan_tp_allocations(
            &[1.0, 2.0, 3.0],
            0.04,
            true,
            TpLotMode::Split,
            &[0.5, 0.3, 0.2],
        );
        let lots: Vec<f64> = allocations.iter().map(|a| a.lot_size).collect();
        assert_eq!(lots, vec![0.02, 0.01, 0.01]);
    }

    #[test]
    fn equal_mode_gives_full_lot_to_every_tp() {
        let allocations = plan_tp_allocations(&[1.0, 2.0, 3.0], 0.04, true, TpLotMode::Equal, &[]);
        let lots: Vec<f64> = allocations.iter().map(|a| a.lot_size).collect();
        assert_eq!(lots, vec![0.04, 0.04, 0.04]);
    }

    #[test]
    fn single_tp_or_split_disabled_places_one_order() {
        let allocations = plan_tp_allocations(&[1.0, 2.0], 0.10, false, TpLotMode::Split, &[0.5, 0.5]);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].take_profit, 1.0);
    }

    #[test]
    fn friday_late_is_weekend_closed_for_forex() {
        let t = Utc.with_ymd_and_hms(2026, 7, 31, 22, 0, 0).unwrap(); // a Friday
        assert!(is_weekend_market_closed(t, "EURUSD"));
    }

    #[test]
    fn sunday_before_reopen_is_still_closed() {
        let t = Utc.with_ymd_and_hms(2026, 8, 2, 21, 59, 0).unwrap(); // a Sunday
        assert!(is_weekend_market_closed(t, "EURUSD"));
    }

    #[test]
    fn weekday_is_never_weekend_closed() {
        let t = Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap(); // a Wednesday
        assert!(!is_weekend_market_closed(t, "EURUSD"));
    }

    #[test]
    fn crypto_never_closes_for_the_weekend() {
        let t = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(); // a Saturday
        assert!(!is_weekend_market_closed(t, "BTCUSD"));
    }
}
