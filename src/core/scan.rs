//! Purpose: Byte-level JSON helpers that avoid building a parse tree.
//! Exports: `value_end`, `string_end`, `skip_ws`, `is_ws`, `decode_key`, `quote_key`.
//! Role: Value Boundary Scanner and key helpers shared by the rewriter and duplicator.
//! Invariants: Scanners never read past the slice; malformed input yields `None`.
//! Invariants: String scanning honours backslash escapes so `\"` never terminates a string.
use std::borrow::Cow;

pub fn is_ws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

pub fn skip_ws(buf: &[u8], mut idx: usize) -> usize {
    while idx < buf.len() && is_ws(buf[idx]) {
        idx += 1;
    }
    idx
}

/// Offset one past the closing quote of the string opening at `start`.
pub fn string_end(buf: &[u8], start: usize) -> Option<usize> {
    if buf.get(start) != Some(&b'"') {
        return None;
    }
    let mut escaped = false;
    for (idx, byte) in buf.iter().enumerate().skip(start + 1) {
        if escaped {
            escaped = false;
        } else if *byte == b'\\' {
            escaped = true;
        } else if *byte == b'"' {
            return Some(idx + 1);
        }
    }
    None
}

/// Offset one past the last byte of the JSON value starting at `start`.
pub fn value_end(buf: &[u8], start: usize) -> Option<usize> {
    match *buf.get(start)? {
        b'"' => string_end(buf, start),
        b'{' | b'[' => container_end(buf, start),
        b't' => literal_end(buf, start, b"true"),
        b'f' => literal_end(buf, start, b"false"),
        b'n' => literal_end(buf, start, b"null"),
        b'-' | b'0'..=b'9' => {
            let len = buf[start..]
                .iter()
                .take_while(|byte| matches!(**byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'))
                .count();
            Some(start + len)
        }
        _ => None,
    }
}

fn literal_end(buf: &[u8], start: usize, literal: &[u8]) -> Option<usize> {
    buf[start..]
        .starts_with(literal)
        .then_some(start + literal.len())
}

fn container_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, byte) in buf.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match *byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decodes a raw quoted key. Keys without escapes are borrowed; escaped keys
/// go through serde_json so `\u0074eam_id` compares equal to `team_id`.
pub fn decode_key(raw: &[u8]) -> Option<Cow<'_, str>> {
    if raw.len() < 2 || raw[0] != b'"' || raw[raw.len() - 1] != b'"' {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    if !inner.contains(&b'\\') {
        return std::str::from_utf8(inner).ok().map(Cow::Borrowed);
    }
    serde_json::from_slice::<String>(raw).ok().map(Cow::Owned)
}

pub fn quote_key(name: &str) -> Vec<u8> {
    serde_json::to_vec(name).unwrap_or_else(|_| format!("\"{name}\"").into_bytes())
}

/// Upper bound on the raw length of a quoted key whose decoded form is at
/// most `name_len` bytes (every byte written as a `\uXXXX` escape).
pub fn max_raw_key_len(name_len: usize) -> usize {
    name_len * 6 + 2
}
