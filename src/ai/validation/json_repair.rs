//! JSON Repair Mechanism
//!
//! Unified JSON extraction and repair for LLM responses.
//!
//! Handles common LLM JSON output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - Missing closing braces/brackets
//! - Trailing commas
//! - Truncated strings
//! - JSON embedded in explanatory text

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ForgeError, Result};

const MAX_REPAIR_LEVELS: usize = 3;

/// Parse an LLM response as JSON, attempting repair if the direct parse
/// fails. Returns `(value, was_repaired)`.
pub fn parse_structured(raw: &str) -> Result<(Value, bool)> {
    let cleaned = preprocess(raw);

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok((value, false));
    }

    debug!("Initial JSON parse failed, attempting repair");
    for level in 1..=MAX_REPAIR_LEVELS {
        let repaired = repair(&cleaned, level);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            warn!("JSON repaired at level {}", level);
            return Ok((value, true));
        }
    }

    // Final attempt: pull a JSON object out of surrounding prose
    if let Some(embedded) = extract_embedded(&cleaned)
        && let Ok(value) = serde_json::from_str::<Value>(&embedded)
    {
        warn!("JSON extracted from mixed content");
        return Ok((value, true));
    }

    Err(ForgeError::parse(
        "llm response",
        format!(
            "unparseable after {} repair levels; preview: {}...",
            MAX_REPAIR_LEVELS,
            cleaned.chars().take(160).collect::<String>()
        ),
    ))
}

/// Strip fences, BOM, and surrounding whitespace
fn preprocess(raw: &str) -> String {
    let mut s = raw.trim().trim_start_matches('\u{feff}');

    if s.starts_with("```") {
        if let Some(newline) = s.find('\n') {
            s = &s[newline + 1..];
        }
    }
    let s = s.trim_end();
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim().to_string()
}

/// Apply repairs with increasing aggressiveness
fn repair(s: &str, level: usize) -> String {
    let mut out = fix_trailing_commas(s);
    if level >= 2 {
        out = close_truncated_strings(&out);
    }
    if level >= 3 {
        out = remove_control_chars(&out);
        out = close_truncated_strings(&out);
    }
    balance_brackets(&out)
}

/// Drop commas that sit directly before a closing bracket/brace
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Close strings broken by raw newlines or truncation
fn close_truncated_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => {
                escape = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\n' | '\r' if in_string => {
                out.push('"');
                in_string = false;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    if in_string {
        out.push('"');
    }
    out
}

fn remove_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Append missing closers for unbalanced braces/brackets
fn balance_brackets(s: &str) -> String {
    let mut out = s.to_string();
    let mut braces = 0i32;
    let mut brackets = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => braces += 1,
            '}' if !in_string => braces -= 1,
            '[' if !in_string => brackets += 1,
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
    }
    if in_string {
        out.push('"');
    }
    for _ in 0..brackets.max(0) {
        out.push(']');
    }
    for _ in 0..braces.max(0) {
        out.push('}');
    }
    out
}

/// Extract the first balanced JSON object/array from surrounding prose
fn extract_embedded(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let mut braces = 0i32;
    let mut brackets = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => braces += 1,
            '}' if !in_string => braces -= 1,
            '[' if !in_string => brackets += 1,
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
        if !in_string && braces == 0 && brackets == 0 && i > 0 {
            return Some(s[start..start + i + 1].to_string());
        }
    }
    None
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let (value, repaired) = parse_structured(r#"{"key": "value"}"#).unwrap();
        assert_eq!(value["key"], "value");
        assert!(!repaired);
    }

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        let (value, _) = parse_structured(input).unwrap();
        assert_eq!(value["key"], "value");
    }

    #[test]
    fn test_fix_trailing_comma() {
        let input = r#"{"items": [{"a": 1},]}"#;
        let (value, repaired) = parse_structured(input).unwrap();
        assert!(repaired);
        assert!(value["items"].is_array());
    }

    #[test]
    fn test_balance_brackets() {
        let input = r#"{"items": [{"a": 1}"#;
        let (value, repaired) = parse_structured(input).unwrap();
        assert!(repaired);
        assert!(value["items"].is_array());
    }

    #[test]
    fn test_extract_from_prose() {
        let input = "Here is the article:\n{\"Headline\": \"x\"}\nHope this helps!";
        let (value, repaired) = parse_structured(input).unwrap();
        assert!(repaired);
        assert_eq!(value["Headline"], "x");
    }

    #[test]
    fn test_truncated_string_closed() {
        let input = "{\"name\": \"unterminated\n, \"other\": \"value\"}";
        assert!(parse_structured(input).is_ok());
    }

    #[test]
    fn test_unparseable_is_error() {
        let err = parse_structured("no json here at all").unwrap_err();
        assert!(err.to_string().contains("unparseable"));
    }
}
