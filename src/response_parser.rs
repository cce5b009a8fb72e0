//! Best-effort decoding of raw completion text.
//!
//! Completions are untrusted free text. Decoding walks an ordered list of
//! strategies and the first one that yields a result wins; the last strategy
//! always succeeds, so parsing never fails.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FALLBACK_EXPLANATION: &str = "Generated SQL query from natural language";
pub const UNPARSED_SQL: &str = "-- Failed to parse SQL";

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json\s*\n(.*?)\n```").unwrap();
    static ref SELECT_SPAN: Regex = Regex::new(r"(?is)SELECT.*?(?:\n\n|\z)").unwrap();
}

/// Structured result requested from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedCompletion {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub query_type: String,
}

struct DecodeStrategy {
    name: &'static str,
    decode: fn(&str) -> Option<ParsedCompletion>,
}

const STRATEGIES: &[DecodeStrategy] = &[
    DecodeStrategy {
        name: "json_fence",
        decode: decode_json_fence,
    },
    DecodeStrategy {
        name: "raw_json",
        decode: decode_raw_json,
    },
    DecodeStrategy {
        name: "select_scan",
        decode: scan_select,
    },
];

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(raw: &str) -> ParsedCompletion {
        for strategy in STRATEGIES {
            if let Some(parsed) = (strategy.decode)(raw) {
                debug!("Decoded completion with strategy '{}'", strategy.name);
                return parsed;
            }
        }
        // Unreachable: select_scan always yields a result.
        fallback(UNPARSED_SQL.to_string())
    }
}

fn decode_json_fence(raw: &str) -> Option<ParsedCompletion> {
    let captures = JSON_FENCE.captures(raw)?;
    serde_json::from_str(captures.get(1)?.as_str()).ok()
}

fn decode_raw_json(raw: &str) -> Option<ParsedCompletion> {
    serde_json::from_str(raw).ok()
}

fn scan_select(raw: &str) -> Option<ParsedCompletion> {
    let sql = SELECT_SPAN
        .find(raw)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| UNPARSED_SQL.to_string());
    Some(fallback(sql))
}

fn fallback(sql: String) -> ParsedCompletion {
    ParsedCompletion {
        sql,
        explanation: FALLBACK_EXPLANATION.to_string(),
        query_type: "select".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let raw = "Here you go:\n```json\n{\"sql\": \"SELECT id FROM users LIMIT 5\", \"explanation\": \"Lists ids\", \"query_type\": \"select\"}\n```\nDone.";
        let parsed = ResponseParser::parse(raw);
        assert_eq!(parsed.sql, "SELECT id FROM users LIMIT 5");
        assert_eq!(parsed.explanation, "Lists ids");
        assert_eq!(parsed.query_type, "select");
    }

    #[test]
    fn test_raw_json_with_missing_fields() {
        let parsed = ResponseParser::parse(r#"{"sql": "SELECT 1"}"#);
        assert_eq!(parsed.sql, "SELECT 1");
        assert_eq!(parsed.explanation, "");
        assert_eq!(parsed.query_type, "");
    }

    #[test]
    fn test_broken_fence_falls_through_to_scan() {
        let raw = "```json\n{not json}\n```\n\nselect name from users\nwhere id = 1\n\nThat should work.";
        let parsed = ResponseParser::parse(raw);
        assert_eq!(parsed.sql, "select name from users\nwhere id = 1");
        assert_eq!(parsed.explanation, FALLBACK_EXPLANATION);
        assert_eq!(parsed.query_type, "select");
    }

    #[test]
    fn test_select_span_runs_to_end_of_text() {
        let parsed = ResponseParser::parse("Try this: SELECT * FROM orders");
        assert_eq!(parsed.sql, "SELECT * FROM orders");
    }

    #[test]
    fn test_multiple_fences_uses_first_json_block() {
        let raw = "```sql\nSELECT 2\n```\n```json\n{\"sql\": \"SELECT 1\", \"explanation\": \"one\", \"query_type\": \"select\"}\n```\n```json\n{\"sql\": \"SELECT 3\"}\n```";
        let parsed = ResponseParser::parse(raw);
        assert_eq!(parsed.sql, "SELECT 1");
    }

    #[test]
    fn test_never_fails_on_garbage() {
        for raw in ["", "no sql here", "42", "[1, 2]", "```json\n```", "{\"sql\": 5}"] {
            let parsed = ResponseParser::parse(raw);
            assert!(!parsed.sql.is_empty(), "input {:?}", raw);
        }
        assert_eq!(ResponseParser::parse("").sql, UNPARSED_SQL);
    }
}
