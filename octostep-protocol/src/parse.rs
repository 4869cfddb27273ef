//! Payload tokenizing and field parsing
//!
//! Payloads are comma-separated fields with optional surrounding whitespace.
//! Empty fields are allowed so callers can skip optional arguments
//! (`MOVE:0,100,,20000`).

use heapless::Vec;
use octostep_core::CHANNEL_COUNT;

/// Maximum comma-separated fields in one payload
pub const MAX_TOKENS: usize = 4;

/// Split a payload into trimmed fields
///
/// Returns `None` when the payload carries more than [`MAX_TOKENS`] fields.
/// An empty payload yields an empty list.
pub fn tokenize(payload: &str) -> Option<Vec<&str, MAX_TOKENS>> {
    let mut tokens = Vec::new();
    let payload = payload.trim();
    if payload.is_empty() {
        return Some(tokens);
    }
    for token in payload.split(',') {
        if tokens.push(token.trim()).is_err() {
            return None;
        }
    }
    Some(tokens)
}

/// Parse a signed integer field
pub fn parse_i64(token: &str) -> Option<i64> {
    token.parse::<i64>().ok()
}

/// Parse a signed 32-bit field
pub fn parse_i32(token: &str) -> Option<i32> {
    token.parse::<i32>().ok()
}

/// Parse a channel index, rejecting anything outside `0..CHANNEL_COUNT`
pub fn parse_channel(token: &str) -> Option<usize> {
    let value = parse_i64(token)?;
    if (0..CHANNEL_COUNT as i64).contains(&value) {
        Some(value as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_and_trims() {
        let tokens = tokenize(" 1 , 200 ,3000 ").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], "1");
        assert_eq!(tokens[1], "200");
        assert_eq!(tokens[2], "3000");
    }

    #[test]
    fn test_tokenize_keeps_empty_fields() {
        let tokens = tokenize("0,100,,20000").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2], "");
    }

    #[test]
    fn test_tokenize_empty_payload() {
        let tokens = tokenize("   ").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_tokenize_rejects_excess_fields() {
        assert!(tokenize("1,2,3,4,5").is_none());
    }

    #[test]
    fn test_parse_signed_values() {
        assert_eq!(parse_i64("-1200"), Some(-1200));
        assert_eq!(parse_i64("+42"), Some(42));
        assert_eq!(parse_i64("12a"), None);
        assert_eq!(parse_i64(""), None);
    }

    #[test]
    fn test_parse_channel_bounds() {
        assert_eq!(parse_channel("0"), Some(0));
        assert_eq!(parse_channel("7"), Some(7));
        assert_eq!(parse_channel("8"), None);
        assert_eq!(parse_channel("-1"), None);
        assert_eq!(parse_channel("x"), None);
    }
}
