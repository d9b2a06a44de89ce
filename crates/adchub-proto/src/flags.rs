//! Flag-field payloads.
//!
//! INF-style payloads are sequences of `KKvalue` tokens: a two-character key
//! followed immediately by an escaped value. The map form is ordered so that
//! hub-built lines are deterministic.

use std::collections::BTreeMap;

use crate::{
    errors::Result,
    escape::{escape, unescape},
};

/// Ordered mapping from two-character flag key to (unescaped) value.
pub type FlagMap = BTreeMap<String, String>;

/// Parse a flag-field payload into a map.
///
/// Each space-separated token contributes its first two characters as the
/// key and the unescaped remainder as the value. Duplicate keys keep the
/// last occurrence. Empty tokens (from repeated spaces) are skipped.
///
/// # Errors
///
/// - `ProtocolError::MalformedEscape` if any value fails to unescape.
pub fn flag_dict(payload: &str) -> Result<FlagMap> {
    let mut flags = FlagMap::new();

    for token in payload.split(' ') {
        if token.is_empty() {
            continue;
        }

        let split = token.char_indices().nth(2).map_or(token.len(), |(i, _)| i);
        let (key, value) = token.split_at(split);
        flags.insert(key.to_string(), unescape(value)?);
    }

    Ok(flags)
}

/// Serialize a flag map back into a payload, escaping each value.
pub fn join_flags(flags: &FlagMap) -> String {
    let tokens: Vec<String> = flags.iter().map(|(k, v)| format!("{k}{}", escape(v))).collect();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_fields() {
        let flags = flag_dict("NIsomenick I4127.0.0.1").unwrap();
        assert_eq!(flags.get("NI").map(String::as_str), Some("somenick"));
        assert_eq!(flags.get("I4").map(String::as_str), Some("127.0.0.1"));
    }

    #[test]
    fn values_are_unescaped() {
        let flags = flag_dict("DEa\\sdescription").unwrap();
        assert_eq!(flags.get("DE").map(String::as_str), Some("a description"));
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let flags = flag_dict("NIfirst NIsecond").unwrap();
        assert_eq!(flags.get("NI").map(String::as_str), Some("second"));
    }

    #[test]
    fn empty_value_is_kept() {
        let flags = flag_dict("AW").unwrap();
        assert_eq!(flags.get("AW").map(String::as_str), Some(""));
    }

    #[test]
    fn join_escapes_values() {
        let mut flags = FlagMap::new();
        flags.insert("NI".to_string(), "some nick".to_string());
        assert_eq!(join_flags(&flags), "NIsome\\snick");
    }

    #[test]
    fn join_then_parse_is_identity() {
        let mut flags = FlagMap::new();
        flags.insert("NI".to_string(), "nick with spaces".to_string());
        flags.insert("DE".to_string(), "multi\nline".to_string());
        flags.insert("CT".to_string(), "32".to_string());
        assert_eq!(flag_dict(&join_flags(&flags)).unwrap(), flags);
    }
}
