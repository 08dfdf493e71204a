use crate::domain::models::{AccountSnapshot, Direction, Quote, TenantSettings};
use crate::domain::services::pip_tables::{pip_size, pip_value_per_lot};

/// One parsed `Open` signal's fields, as the validator needs them. Kept
/// separate from `ParseOutcome::Open` so the validator does not depend on the
/// parser's tagged-union shape.
pub struct OpenSignal<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profits: &'a [f64],
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub adjusted_lot_size: Option<f64>,
}

pub struct TradeValidator;

impl TradeValidator {
    pub fn new() -> Self {
        Self
    }

    /// `market_quote = None` models a network failure fetching the live
    /// quote, which per contract 2 is a warning, never an error.
    pub fn validate(
        &self,
        signal: &OpenSignal<'_>,
        account: &AccountSnapshot,
        settings: &TenantSettings,
        market_quote: Option<Quote>,
    ) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Symbol whitelist.
        if let Some(whitelist) = &settings.symbol_whitelist {
            if !whitelist.contains(signal.symbol) {
                errors.push(format!("symbol {} is not in the tenant's whitelist", signal.symbol));
            }
        }

        // 2. Market distance (network failure degrades to a warning).
        match market_quote {
            Some(quote) => {
                let market = quote.mid();
                if market > 0.0 && ((signal.entry - market).abs() / market) > 0.01 {
                    warnings.push(format!(
                        "entry {} is more than 1% away from market {}",
                        signal.entry, market
                    ));
                }
            }
            None => warnings.push("could not fetch live quote; skipped market-distance check".into()),
        }

        // 3. SL distance.
        if signal.entry != 0.0
            && ((signal.entry - signal.stop_loss).abs() / signal.entry) > 0.05
        {
            warnings.push("stop loss is more than 5% away from entry".into());
        }

        // 4. Lot sizing.
        let base_lot = account.balance / settings.lot_reference_balance
            * settings.lot_reference_size_for(signal.symbol);
        let sl_pips = (signal.entry - signal.stop_loss).abs() / pip_size(signal.symbol);
        let max_risk_amount = account.balance * settings.max_risk_percent / 100.0;
        let risk_per_lot = sl_pips * pip_value_per_lot(signal.symbol);
        let risk_adjusted_lot = if risk_per_lot > 0.0 {
            max_risk_amount / risk_per_lot
        } else {
            base_lot
        };
        let raw_lot = base_lot.min(risk_adjusted_lot);
        let chosen_lot = clamp_lot(raw_lot, settings.max_lot_size);
        if (chosen_lot - round2(base_lot)).abs() > f64::EPSILON {
            warnings.push(format!(
                "lot adjusted from base {:.2} to {:.2} by risk policy",
                base_lot, chosen_lot
            ));
        }

        // 5. Open trade cap.
        if account.positions.len() as u32 >= settings.max_open_trades {
            errors.push(format!(
                "open position count {} meets or exceeds the cap of {}",
                account.positions.len(),
                settings.max_open_trades
            ));
        }

        // 6. Duplicate / hedge warnings (non-blocking).
        for position in &account.positions {
            if position.symbol != signal.symbol {
                continue;
            }
            if position.direction == signal.direction {
                warnings.push(format!("duplicate same-direction position already open on {}", signal.symbol));
            } else {
                warnings.push(format!("opposite-direction hedge already open on {}", signal.symbol));
            }
        }

        // 7. Confidence floor.
        if signal.confidence < 0.6 {
            errors.push(format!("confidence {:.3} is below the 0.6 floor", signal.confidence));
        }

        // 8. Geometric sanity.
        if signal.take_profits.is_empty() {
            errors.push("take_profits is empty".into());
        } else {
            match signal.direction {
                Direction::Buy => {
                    if !(signal.stop_loss < signal.entry) {
                        errors.push("BUY requires stop_loss < entry".into());
                    }
                    if !signal.take_profits.iter().all(|tp| *tp > signal.entry) {
                        errors.push("BUY requires every take_profit > entry".into());
                    }
                }
                Direction::Sell => {
                    if !(signal.stop_loss > signal.entry) {
                        errors.push("SELL requires stop_loss > entry".into());
                    }
                    if !signal.take_profits.iter().all(|tp| *tp < signal.entry) {
                        errors.push("SELL requires every take_profit < entry".into());
                    }
                }
            }
        }

        let passed = errors.is_empty();
        ValidationOutcome {
            passed,
            errors,
            warnings,
            adjusted_lot_size: passed.then_some(chosen_lot),
        }
    }
}

impl Default for TradeValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clamp_lot(value: f64, max_lot_size: f64) -> f64 {
    round2(value.clamp(0.01, max_lot_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TenantSettings {
        TenantSettings {
            max_risk_percent: 2.0,
            max_lot_size: 5.0,
            max_open_trades: 10,
            lot_reference_balance: 1000.0,
            lot_reference_size_gold: 0.04,
            lot_reference_size_default: 0.1,
            ..TenantSettings::default()
        }
    }

    fn account(balance: f64) -> AccountSnapshot {
        AccountSnapshot { balance, equity: balance, positions: vec![] }
    }

    fn buy_signal() -> OpenSignal<'static> {
        OpenSignal {
            symbol: "EURUSD",
            direction: Direction::Buy,
            entry: 1.1000,
            stop_loss: 1.0950,
            take_profits: &[1.1050, 1.1100],
            confidence: 0.9,
        }
    }

    #[test]
    fn rejects_low_confidence() {
        let validator = TradeValidator::new();
        let mut signal = buy_signal();
        signal.confidence = 0.599;
        let outcome = validator.validate(&signal, &account(1000.0), &settings(), None);
        assert!(!outcome.passed);
    }

    #[test]
    fn accepts_confidence_at_the_floor() {
        let validator = TradeValidator::new();
        let mut signal = buy_signal();
        signal.confidence = 0.6;
        let outcome = validator.validate(&signal, &account(1000.0), &settings(), None);
        assert!(outcome.passed);
    }

    #[test]
    fn rejects_empty_take_profits() {
        let validator = TradeValidator::new();
        let signal = OpenSignal { take_profits: &[], ..buy_signal() };
        let outcome = validator.validate(&signal, &account(1000.0), &settings(), None);
        assert!(!outcome.passed);
    }

    #[test]
    fn rejects_geometric_violation_for_sell() {
        let validator = TradeValidator::new();
        let signal = OpenSignal {
            direction: Direction::Sell,
            take_profits: &[1.1100], // above entry: invalid for SELL
            ..buy_signal()
        };
        let outcome = validator.validate(&signal, &account(1000.0), &settings(), None);
        assert!(!outcome.passed);
    }

    #[test]
    fn computed_lot_is_always_within_bounds_and_two_decimals() {
        let validator = TradeValidator::new();
        let outcome = validator.validate(&buy_signal(), &account(1_000_000.0), &settings(), None);
        let lot = outcome.adjusted_lot_size.unwrap();
        assert!((0.01..=5.0).contains(&lot));
        assert_eq!(round2(lot), lot);
    }

    #[test]
    fn split_lot_scenario_matches_the_documented_example() {
        // balance 500, gold reference 0.04, policy 2%, SL 10 pips gold.
        let validator = TradeValidator::new();
        let mut s = settings();
        s.lot_reference_size_gold = 0.04;
        s.lot_reference_balance = 500.0;
        let signal = OpenSignal {
            symbol: "XAUUSD",
            direction: Direction::Buy,
            entry: 2000.0,
            stop_loss: 2000.0 - 10.0 * pip_size("XAUUSD"),
            take_profits: &[2001.0],
            confidence: 0.9,
        };
        let outcome = validator.validate(&signal, &account(500.0), &s, None);
        assert_eq!(outcome.adjusted_lot_size, Some(0.04));
    }

    #[test]
    fn max_open_trades_is_a_hard_error() {
        let validator = TradeValidator::new();
        let mut acc = account(1000.0);
        for _ in 0..10 {
            acc.positions.push(crate::domain::models::Position {
                id: "p".into(),
                symbol: "EURUSD".into(),
                direction: Direction::Buy,
                lot_size: 0.1,
                open_price: 1.1,
                stop_loss: None,
                take_profit: None,
                opened_at: chrono::Utc::now(),
            });
        }
        let outcome = validator.validate(&buy_signal(), &acc, &settings(), None);
        assert!(!outcome.passed);
    }
}
