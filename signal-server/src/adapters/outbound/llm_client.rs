//! Chat-completion-backed `LlmClient` (C3). The LLM only extracts raw
//! fields from the message text; symbol normalization and direction-sanity
//! correction are pure domain logic applied downstream by the router, not
//! here — this adapter's only domain helper use is code-fence stripping.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::models::{Direction, LotModifierKind, ParseOutcome};
use crate::domain::services::signal_parser::strip_json_fencing;
use crate::ports::LlmClient;

const MAX_ATTEMPTS: u32 = 3;
const MAX_RESPONSE_TOKENS: u16 = 1024;

const SYSTEM_PROMPT: &str = "You are a trading-signal parser. Read the message and return ONLY a JSON \
object describing it. Fields: is_signal (bool), signal_type (one of \"OPEN\", \"CLOSE\", \
\"LOT_MODIFIER\"), direction (\"BUY\"/\"SELL\", for OPEN), target_symbol/symbol, entry_price, \
stop_loss, take_profits (array), confidence (0..1), lot_modifier_type (\"DOUBLE\"/\"ADD\"), \
lot_multiplier, warnings (array of strings), rejection_reason, suggested_correction. Ignore \
compliance disclaimers such as \"not financial advice\" when deciding is_signal. Never reject a \
price for looking unusual.";

#[derive(Debug, Deserialize)]
struct RawParseResult {
    is_signal: bool,
    #[serde(default)]
    signal_type: Option<String>,
    direction: Option<String>,
    symbol: Option<String>,
    target_symbol: Option<String>,
    entry_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profits: Option<Vec<f64>>,
    confidence: Option<f64>,
    lot_modifier_type: Option<String>,
    lot_multiplier: Option<f64>,
    #[serde(default)]
    warnings: Vec<String>,
    rejection_reason: Option<String>,
    suggested_correction: Option<String>,
}

pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if !api_base.is_empty() {
            config = config.with_api_base(api_base);
        }
        Self { client: Client::with_config(config), model }
    }

    async fn complete(&self, raw_text: &str) -> anyhow::Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(MAX_RESPONSE_TOKENS)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default().content(SYSTEM_PROMPT).build()?.into(),
                ChatCompletionRequestUserMessageArgs::default().content(raw_text).build()?.into(),
            ])
            .build()?;
        let response = self.client.chat().create(request).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("empty chat completion response"))?;
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    /// Retries up to `MAX_ATTEMPTS` with exponential backoff on transport or
    /// JSON-parse failure; on permanent failure returns `Rejected` — this
    /// call never raises, per the port contract.
    async fn parse(&self, raw_text: &str) -> ParseOutcome {
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            match self.complete(raw_text).await {
                Ok(text) => {
                    let cleaned = strip_json_fencing(&text);
                    match serde_json::from_str::<RawParseResult>(cleaned) {
                        Ok(parsed) => return into_outcome(parsed),
                        Err(err) => {
                            last_error = format!("json parse error: {err}");
                            tracing::warn!(attempt, error = %err, "llm response was not valid JSON");
                        }
                    }
                }
                Err(err) => {
                    last_error = err.to_string();
                    tracing::warn!(attempt, error = %err, "llm completion request failed");
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }

        ParseOutcome::Rejected {
            reason: format!("Parser failed: {last_error}"),
            suggested_direction: None,
            partial_fields: None,
        }
    }
}

fn into_outcome(parsed: RawParseResult) -> ParseOutcome {
    if !parsed.is_signal {
        return ParseOutcome::Rejected {
            reason: parsed.rejection_reason.unwrap_or_else(|| "not a trade signal".to_string()),
            suggested_direction: parsed.suggested_correction.as_deref().and_then(parse_direction),
            partial_fields: None,
        };
    }

    match parsed.signal_type.as_deref() {
        Some("CLOSE") => ParseOutcome::Close {
            symbol: parsed.symbol.or(parsed.target_symbol).unwrap_or_default(),
            confidence: parsed.confidence.unwrap_or(0.5),
            warnings: parsed.warnings,
        },
        Some("LOT_MODIFIER") => ParseOutcome::LotModifier {
            target_symbol: parsed.symbol.or(parsed.target_symbol),
            kind: match parsed.lot_modifier_type.as_deref() {
                Some("DOUBLE") => LotModifierKind::Double,
                _ => LotModifierKind::Add,
            },
            multiplier: parsed.lot_multiplier.unwrap_or(2.0),
            confidence: parsed.confidence.unwrap_or(0.5),
            warnings: parsed.warnings,
        },
        _ => {
            let direction = parsed.direction.as_deref().and_then(parse_direction);
            let (symbol, entry, stop_loss, take_profits) =
                (parsed.symbol, parsed.entry_price, parsed.stop_loss, parsed.take_profits);
            match (direction, symbol, entry, stop_loss, take_profits) {
                (Some(direction), Some(symbol), Some(entry), Some(stop_loss), Some(take_profits))
                    if !take_profits.is_empty() =>
                {
                    ParseOutcome::Open {
                        direction,
                        symbol,
                        entry,
                        stop_loss,
                        take_profits,
                        confidence: parsed.confidence.unwrap_or(0.5),
                        warnings: parsed.warnings,
                        original_direction: None,
                    }
                }
                _ => ParseOutcome::Rejected {
                    reason: "Missing required fields for an open signal".to_string(),
                    suggested_direction: None,
                    partial_fields: None,
                },
            }
        }
    }
}

fn parse_direction(raw: &str) -> Option<Direction> {
    match raw.to_uppercase().as_str() {
        "BUY" => Some(Direction::Buy),
        "SELL" => Some(Direction::Sell),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_non_signal_response_is_rejected() {
        let raw = RawParseResult {
            is_signal: false,
            signal_type: None,
            direction: None,
            symbol: None,
            target_symbol: None,
            entry_price: None,
            stop_loss: None,
            take_profits: None,
            confidence: None,
            lot_modifier_type: None,
            lot_multiplier: None,
            warnings: Vec::new(),
            rejection_reason: Some("just chat".to_string()),
            suggested_correction: None,
        };
        match into_outcome(raw) {
            ParseOutcome::Rejected { reason, .. } => assert_eq!(reason, "just chat"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn an_open_signal_missing_take_profits_is_rejected() {
        let raw = RawParseResult {
            is_signal: true,
            signal_type: Some("OPEN".to_string()),
            direction: Some("BUY".to_string()),
            symbol: Some("EURUSD".to_string()),
            target_symbol: None,
            entry_price: Some(1.1),
            stop_loss: Some(1.09),
            take_profits: None,
            confidence: Some(0.8),
            lot_modifier_type: None,
            lot_multiplier: None,
            warnings: Vec::new(),
            rejection_reason: None,
            suggested_correction: None,
        };
        assert!(matches!(into_outcome(raw), ParseOutcome::Rejected { .. }));
    }

    #[test]
    fn a_complete_open_signal_is_parsed() {
        let raw = RawParseResult {
            is_signal: true,
            signal_type: Some("OPEN".to_string()),
            direction: Some("buy".to_string()),
            symbol: Some("XAUUSD".to_string()),
            target_symbol: None,
            entry_price: Some(2400.0),
            stop_loss: Some(2390.0),
            take_profits: Some(vec![2410.0, 2420.0]),
            confidence: Some(0.9),
            lot_modifier_type: None,
            lot_multiplier: None,
            warnings: Vec::new(),
            rejection_reason: None,
            suggested_correction: None,
        };
        match into_outcome(raw) {
            ParseOutcome::Open { direction, symbol, .. } => {
                assert_eq!(direction, Direction::Buy);
                assert_eq!(symbol, "XAUUSD");
            }
            other => panic!("expected Open, got {other:?}"),
        }
    }

    #[test]
    fn a_lot_modifier_defaults_to_a_double_multiplier() {
        let raw = RawParseResult {
            is_signal: true,
            signal_type: Some("LOT_MODIFIER".to_string()),
            direction: None,
            symbol: None,
            target_symbol: Some("GOLD".to_string()),
            entry_price: None,
            stop_loss: None,
            take_profits: None,
            confidence: None,
            lot_modifier_type: Some("DOUBLE".to_string()),
            lot_multiplier: None,
            warnings: Vec::new(),
            rejection_reason: None,
            suggested_correction: None,
        };
        match into_outcome(raw) {
            ParseOutcome::LotModifier { kind, multiplier, .. } => {
                assert_eq!(kind, LotModifierKind::Double);
                assert_eq!(multiplier, 2.0);
            }
            other => panic!("expected LotModifier, got {other:?}"),
        }
    }
}
