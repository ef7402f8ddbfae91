//! Property file codec
//!
//! Encodes application properties as single `key=value` lines using the
//! escaping rules of Java `.properties` files, so that keys and values with
//! separators, backslashes or control characters survive a round trip.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::{PipeError, Result};

/// Encode one entry as a `key=value` line.
pub fn encode_entry(key: &str, value: &str) -> String {
    let mut out = String::with_capacity(key.len() + value.len() + 1);
    escape_into(&mut out, key, true);
    out.push('=');
    escape_into(&mut out, value, false);
    out
}

/// Decode a single `key=value` line produced by [`encode_entry`] (or any
/// well-formed properties line).
pub fn decode_entry(line: &str) -> Result<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() && is_blank(chars[i]) {
        i += 1;
    }
    let key_start = i;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_blank(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(chars.len());

    // separator: blanks, at most one of `=`/`:`, blanks
    while i < chars.len() && is_blank(chars[i]) {
        i += 1;
    }
    if i < chars.len() && (chars[i] == '=' || chars[i] == ':') {
        i += 1;
    }
    while i < chars.len() && is_blank(chars[i]) {
        i += 1;
    }

    let key = unescape(&chars[key_start..key_end], line)?;
    let value = unescape(&chars[i..], line)?;
    if key.is_empty() {
        return Err(PipeError::Property(format!("missing key in `{line}`")));
    }
    Ok((key, value))
}

/// Encode a whole map, one entry per line, in key order.
pub fn encode_properties(props: &BTreeMap<String, String>) -> String {
    props
        .iter()
        .map(|(k, v)| encode_entry(k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a properties document, skipping blank and comment lines.
pub fn decode_properties(text: &str) -> Result<BTreeMap<String, String>> {
    let mut props = BTreeMap::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let (k, v) = decode_entry(line)?;
        props.insert(k, v);
    }
    Ok(props)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{c}'
}

fn escape_into(out: &mut String, raw: &str, is_key: bool) {
    for (idx, c) in raw.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            ':' => out.push_str("\\:"),
            '#' | '!' if idx == 0 => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    let _ = write!(out, "\\u{unit:04X}");
                }
            }
            c => out.push(c),
        }
    }
}

fn unescape(chars: &[char], line: &str) -> Result<String> {
    let mut units: Vec<u16> = Vec::new();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            flush_utf16(&mut units, &mut out, line)?;
            out.push(c);
            i += 1;
            continue;
        }
        let Some(&next) = chars.get(i + 1) else {
            return Err(PipeError::Property(format!("dangling escape in `{line}`")));
        };
        if next == 'u' {
            let hex: String = chars.iter().skip(i + 2).take(4).collect();
            if hex.len() != 4 {
                return Err(PipeError::Property(format!("truncated \\u escape in `{line}`")));
            }
            let unit = u16::from_str_radix(&hex, 16)
                .map_err(|_| PipeError::Property(format!("invalid \\u escape in `{line}`")))?;
            units.push(unit);
            i += 6;
            continue;
        }
        flush_utf16(&mut units, &mut out, line)?;
        out.push(match next {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{c}',
            other => other,
        });
        i += 2;
    }
    flush_utf16(&mut units, &mut out, line)?;
    Ok(out)
}

fn flush_utf16(units: &mut Vec<u16>, out: &mut String, line: &str) -> Result<()> {
    if units.is_empty() {
        return Ok(());
    }
    let decoded = String::from_utf16(units)
        .map_err(|_| PipeError::Property(format!("invalid UTF-16 escape in `{line}`")))?;
    out.push_str(&decoded);
    units.clear();
    Ok(())
}
