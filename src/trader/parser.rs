// =============================================================================
// AI response parser — chain-of-thought prefix + bracket-matched JSON array
// =============================================================================

use anyhow::{bail, Result};

use crate::types::Decision;

/// Replace curly quotes with their ASCII equivalents so `serde_json` can
/// parse text an AI model emitted with typographic punctuation.
fn normalize_quotes(s: &str) -> String {
    s.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Find the first top-level JSON array in `text` by bracket-matching from the
/// first `[` to its balancing `]`. Brackets inside string literals are
/// ignored.
fn find_json_array(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = text.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((start, i + 1));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

pub struct ParsedResponse {
    pub chain_of_thought: String,
    pub decisions: Vec<Decision>,
}

/// Parse a raw AI completion into its chain-of-thought prefix and the
/// top-level JSON array of decisions. Fails if no balanced JSON array is
/// found or it does not parse as `Vec<Decision>`.
pub fn parse_response(raw: &str) -> Result<ParsedResponse> {
    let normalized = normalize_quotes(raw);
    let Some((start, end)) = find_json_array(&normalized) else {
        bail!("no top-level JSON array found in AI response");
    };
    let chain_of_thought = normalized[..start].trim().to_string();
    let json_slice = &normalized[start..end];
    let decisions: Vec<Decision> = serde_json::from_str(json_slice)
        .map_err(|e| anyhow::anyhow!("failed to parse decision array: {e}"))?;
    Ok(ParsedResponse { chain_of_thought, decisions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prose_prefix_and_json_array() {
        let raw = r#"Looking at the market, BTC is trending up.
[{"action":"open_long","symbol":"BTCUSDT","leverage":5,"position_size_usd":100.0,"stop_loss":95.0,"take_profit":115.0,"confidence":80.0,"risk_usd":5.0,"reasoning":"breakout"}]"#;
        let parsed = parse_response(raw).unwrap();
        assert!(parsed.chain_of_thought.contains("trending up"));
        assert_eq!(parsed.decisions.len(), 1);
        assert_eq!(parsed.decisions[0].symbol, "BTCUSDT");
    }

    #[test]
    fn normalizes_curly_quotes_before_parsing() {
        let raw = "Reasoning here.\n[{\u{201C}action\u{201D}: \u{201C}wait\u{201D}, \u{201C}symbol\u{201D}: \u{201C}ETHUSDT\u{201D}, \u{201C}reasoning\u{201D}: \u{201C}no edge\u{201D}}]";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.decisions[0].symbol, "ETHUSDT");
    }

    #[test]
    fn bracket_matching_ignores_brackets_inside_strings() {
        let raw = r#"Plain reasoning text.
[{"action":"wait","symbol":"SOLUSDT","reasoning":"note: array looks like [this] but isn't json"}]"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.decisions.len(), 1);
    }

    #[test]
    fn missing_array_is_rejected() {
        let raw = "No decisions here, just prose.";
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let raw = "Prose.\n[{\"action\": \"open_long\", this is not valid json}]";
        assert!(parse_response(raw).is_err());
    }
}
