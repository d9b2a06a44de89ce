//! ADC value escaping.
//!
//! Payload values may not contain raw spaces (the field separator) or
//! newlines (the line delimiter), so ADC escapes them: `\` becomes `\\`,
//! newline becomes `\n`, space becomes `\s`. Unescaping rejects any other
//! character after a backslash.

use crate::errors::{ProtocolError, Result};

/// Escape a value for embedding in an ADC payload field.
///
/// The backslash is replaced first so the markers introduced for newline and
/// space are not themselves re-escaped.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ' ' => out.push_str("\\s"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`].
///
/// # Errors
///
/// - `ProtocolError::MalformedEscape` if a `\` is followed by anything other
///   than `s`, `n` or `\`, or ends the string.
pub fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices();

    while let Some((at, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some((_, 's')) => out.push(' '),
            Some((_, 'n')) => out.push('\n'),
            Some((_, '\\')) => out.push('\\'),
            _ => return Err(ProtocolError::MalformedEscape { at }),
        }
    }

    Ok(out)
}
