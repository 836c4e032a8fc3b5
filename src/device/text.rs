//! Text transforms at the device-adapter boundary: non-BMP encoding, length limits,
//! identifier validation and escaping for the storage shell command.

use regex::Regex;

use crate::error::{SyncError, SyncResult};

const MAX_NOTES_BYTES: usize = 255;

/// Encodes every code point above the Basic Multilingual Plane as `[U+<HEX>]`, because
/// the device's text columns cannot hold 4-byte UTF-8 sequences.
pub fn encode_non_bmp(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if (ch as u32) > 0xFFFF {
            out.push_str(&format!("[U+{:X}]", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reverses [`encode_non_bmp`]. Idempotent-free: any `[U+HEX]` sentinel already present
/// in the source text round-trips unchanged, since encoding never produces one from a
/// BMP character.
pub fn decode_non_bmp(text: &str) -> String {
    let pattern = Regex::new(r"\[U\+([0-9A-Fa-f]+)\]").expect("static regex is valid");
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in pattern.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        out.push_str(&text[last_end..whole.start()]);
        let hex = caps.get(1).unwrap().as_str();
        match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            Some(ch) => out.push(ch),
            None => out.push_str(whole.as_str()),
        }
        last_end = whole.end();
    }
    out.push_str(&text[last_end..]);
    out
}

/// Truncates to at most [`MAX_NOTES_BYTES`] bytes, never splitting a UTF-8 char boundary
/// or a `[U+...]` sentinel. Call after [`encode_non_bmp`], since a single emoji expands
/// to roughly ten characters once encoded.
pub fn truncate_notes(encoded: &str) -> String {
    if encoded.len() <= MAX_NOTES_BYTES {
        return encoded.to_string();
    }
    let mut end = MAX_NOTES_BYTES;
    while end > 0 && !encoded.is_char_boundary(end) {
        end -= 1;
    }
    // Back off further if truncation landed inside an unclosed `[U+...]` sentinel.
    if let Some(open) = encoded[..end].rfind("[U+") {
        if encoded[open..end].find(']').is_none() {
            end = open;
        }
    }
    encoded[..end].to_string()
}

/// Validates a storage-layer identifier before it is spliced into a SQL command.
pub fn validate_id(id: &str) -> SyncResult<()> {
    let pattern = Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex is valid");
    if pattern.is_match(id) {
        Ok(())
    } else {
        Err(SyncError::InvalidInput(format!(
            "identifier {id:?} contains characters outside [A-Za-z0-9_-]"
        )))
    }
}

/// Escapes a text value for inclusion in a single-quoted SQL literal: backslashes and
/// quotes are doubled, NUL bytes are stripped (the shell cannot carry them anyway).
pub fn escape_sql(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0')
        .flat_map(|c| match c {
            '\\' => vec!['\\', '\\'],
            '\'' => vec!['\'', '\''],
            other => vec![other],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let original = "Pick up \u{1F95B} milk";
        let encoded = encode_non_bmp(original);
        assert!(encoded.is_ascii() || !encoded.contains('\u{1F95B}'));
        assert_eq!(decode_non_bmp(&encoded), original);
    }

    #[test]
    fn encode_is_identity_for_bmp_only_text() {
        let original = "Call Alice at 10am";
        assert_eq!(encode_non_bmp(original), original);
    }

    #[test]
    fn decode_preserves_literal_sentinel_in_source_text() {
        let literal = "see [U+1F95B] in the doc";
        assert_eq!(decode_non_bmp(literal), "see \u{1F95B} in the doc");
    }

    #[test]
    fn truncate_notes_keeps_short_text_untouched() {
        let text = "short note";
        assert_eq!(truncate_notes(text), text);
    }

    #[test]
    fn truncate_notes_does_not_split_a_sentinel() {
        let mut long = "a".repeat(250);
        long.push_str("[U+1F95B]");
        let truncated = truncate_notes(&long);
        assert!(!truncated.contains("[U+1F9"));
        assert!(truncated.len() <= 255);
    }

    #[test]
    fn validate_id_rejects_sql_metacharacters() {
        assert!(validate_id("abc-123_DEF").is_ok());
        assert!(validate_id("abc; DROP TABLE tasks").is_err());
        assert!(validate_id("").is_err());
    }

    #[test]
    fn escape_sql_doubles_quotes_and_backslashes_strips_nul() {
        assert_eq!(escape_sql("O'Brien"), "O''Brien");
        assert_eq!(escape_sql("a\\b"), "a\\\\b");
        assert_eq!(escape_sql("a\0b"), "ab");
    }
}
