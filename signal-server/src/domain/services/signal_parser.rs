//! Pure, LLM-independent parts of the signal parser (C3): symbol
//! normalization, direction-sanity correction, and compliance-text scrubbing.
//! The retrying LLM call itself lives behind the `LlmClient` port.

use crate::domain::models::Direction;

const DISCLAIMER_MARKERS: [&str; 4] = [
    "NOT FINANCIAL ADVICE",
    "EDUCATIONAL",
    "DYOR",
    "NO GUARANTEE",
];

/// Uppercases, strips separators, and maps known aliases.
pub fn normalize_symbol(raw: &str) -> String {
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    match cleaned.as_str() {
        "GOLD" => "XAUUSD".to_string(),
        "SILVER" => "XAGUSD".to_string(),
        "US30" => "DJ30".to_string(),
        "NAS100" => "USTEC".to_string(),
        other => other.to_string(),
    }
}

/// Disclaimer boilerplate must never influence whether text is treated as a signal.
pub fn strip_compliance_text(raw: &str) -> String {
    let mut text = raw.to_string();
    for marker in DISCLAIMER_MARKERS {
        // Case-insensitive removal without allocating a regex dependency.
        while let Some(pos) = text.to_uppercase().find(marker) {
            text.replace_range(pos..pos + marker.len(), "");
        }
    }
    text.trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectionCorrection {
    Unchanged,
    Corrected { corrected: Direction, original: Direction },
    Straddled { suggested_direction: Option<Direction> },
}

/// Contract 2: if all TPs lie below entry and SL lies above entry for a
/// stated BUY, the direction is actually SELL (and symmetrically). If TPs
/// straddle entry, the signal is geometrically incoherent.
pub fn correct_direction(stated: Direction, entry: f64, stop_loss: f64, take_profits: &[f64]) -> DirectionCorrection {
    if take_profits.is_empty() {
        return DirectionCorrection::Unchanged;
    }
    let all_below = take_profits.iter().all(|tp| *tp < entry);
    let all_above = take_profits.iter().all(|tp| *tp > entry);

    match stated {
        Direction::Buy if all_below && stop_loss > entry => {
            DirectionCorrection::Corrected { corrected: Direction::Sell, original: Direction::Buy }
        }
        Direction::Sell if all_above && stop_loss < entry => {
            DirectionCorrection::Corrected { corrected: Direction::Buy, original: Direction::Sell }
        }
        _ if !all_below && !all_above => {
            let suggested = if stop_loss > entry {
                Some(Direction::Sell)
            } else if stop_loss < entry {
                Some(Direction::Buy)
            } else {
                None
            };
            DirectionCorrection::Straddled { suggested_direction: suggested }
        }
        _ => DirectionCorrection::Unchanged,
    }
}

/// Strips ``` / ```json code-fencing before a JSON parse attempt.
pub fn strip_json_fencing(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(normalize_symbol("gold"), "XAUUSD");
        assert_eq!(normalize_symbol("Silver"), "XAGUSD");
        assert_eq!(normalize_symbol("us30"), "DJ30");
        assert_eq!(normalize_symbol("nas100"), "USTEC");
        assert_eq!(normalize_symbol("eur/usd"), "EURUSD");
    }

    #[test]
    fn disclaimers_are_scrubbed_without_affecting_decision_text() {
        let text = strip_compliance_text("BUY EURUSD NOT FINANCIAL ADVICE entry 1.10");
        assert!(!text.to_uppercase().contains("NOT FINANCIAL ADVICE"));
        assert!(text.contains("BUY EURUSD"));
    }

    #[test]
    fn direction_correction_matches_the_documented_scenario() {
        // BUY EURNOK entry 11.79446 TP1 11.78500 TP2 11.78200 SL 11.80300
        let correction = correct_direction(Direction::Buy, 11.79446, 11.80300, &[11.78500, 11.78200]);
        assert_eq!(
            correction,
            DirectionCorrection::Corrected { corrected: Direction::Sell, original: Direction::Buy }
        );
    }

    #[test]
    fn straddled_take_profits_are_reported_with_a_suggestion() {
        let correction = correct_direction(Direction::Buy, 1.10, 1.095, &[1.12, 1.08]);
        assert_eq!(correction, DirectionCorrection::Straddled { suggested_direction: Some(Direction::Buy) });
    }

    #[test]
    fn consistent_buy_signal_is_unchanged() {
        let correction = correct_direction(Direction::Buy, 1.10, 1.095, &[1.11, 1.12]);
        assert_eq!(correction, DirectionCorrection::Unchanged);
    }

    #[test]
    fn json_fencing_is_stripped() {
        assert_eq!(strip_json_fencing("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fencing("{\"a\":1}"), "{\"a\":1}");
    }
}
