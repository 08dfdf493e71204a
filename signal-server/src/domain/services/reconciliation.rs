//! Pure deal-aggregation logic for the trade reconciler (C7). Kept separate
//! from the background loop so the aggregation rule is unit-testable without
//! a live bridge connection.

use chrono::{DateTime, Utc};

use crate::domain::models::{Deal, DealEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPositionSummary {
    pub open_price: Option<f64>,
    pub close_price: Option<f64>,
    pub profit: f64,
    pub closed_at: DateTime<Utc>,
}

/// Summarizes a closed position's deal history: `profit` is the sum of every
/// deal's profit on the position (partial closes included), `open_price`
/// comes from the `DEAL_ENTRY_IN` deal, `close_price`/`closed_at` from the
/// last `DEAL_ENTRY_OUT` deal. Ties on identical close timestamps are broken
/// by broker-assigned deal id ordering, highest id wins, for determinism.
///
/// Returns `None` when no deals were returned at all; the caller is expected
/// to close the trade with zero P&L and a warning in that case.
pub fn summarize_closed_position(deals: &[Deal], fallback_closed_at: DateTime<Utc>) -> Option<ClosedPositionSummary> {
    if deals.is_empty() {
        return None;
    }

    let profit: f64 = deals.iter().map(|d| d.profit).sum();
    let open_price = deals.iter().find(|d| d.entry == DealEntry::In).map(|d| d.price);

    let mut out_deals: Vec<&Deal> = deals.iter().filter(|d| d.entry == DealEntry::Out).collect();
    out_deals.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| numeric_deal_id(&a.id).cmp(&numeric_deal_id(&b.id))));

    let (close_price, closed_at) = match out_deals.last() {
        Some(last) => (Some(last.price), last.time),
        None => (None, fallback_closed_at),
    };

    Some(ClosedPositionSummary { open_price, close_price, profit, closed_at })
}

/// Broker deal ids are decimal strings of varying width ("9", "10", ...), so
/// a plain string compare does not give numeric ordering. Falls back to the
/// raw string for the rare id that is not purely numeric.
fn numeric_deal_id(id: &str) -> (u64, &str) {
    (id.parse().unwrap_or(0), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn deal(id: &str, entry: DealEntry, price: f64, profit: f64, time: DateTime<Utc>) -> Deal {
        Deal { id: id.into(), position_id: "p1".into(), entry, price, profit, time }
    }

    #[test]
    fn profit_sums_across_all_deals_including_partial_closes() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let deals = vec![
            deal("1", DealEntry::In, 1.10, 0.0, t0),
            deal("2", DealEntry::Out, 1.11, 5.0, t1), // partial close
            deal("3", DealEntry::Out, 1.12, 7.5, t2), // final close
        ];
        let summary = summarize_closed_position(&deals, t2).unwrap();
        assert_eq!(summary.profit, 12.5);
        assert_eq!(summary.open_price, Some(1.10));
        assert_eq!(summary.close_price, Some(1.12));
        assert_eq!(summary.closed_at, t2);
    }

    #[test]
    fn ties_on_identical_close_timestamps_break_by_deal_id() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let deals = vec![
            deal("1", DealEntry::In, 1.10, 0.0, t0),
            deal("9", DealEntry::Out, 1.12, 3.0, t0),
            deal("10", DealEntry::Out, 1.13, 4.0, t0),
        ];
        let summary = summarize_closed_position(&deals, t0).unwrap();
        // numeric id 10 > 9, so it wins the tie despite sorting after "9" lexicographically.
        assert_eq!(summary.close_price, Some(1.13));
    }

    #[test]
    fn no_deals_returns_none_so_the_caller_can_fall_back_to_zero_pnl() {
        assert!(summarize_closed_position(&[], Utc::now()).is_none());
    }
}
