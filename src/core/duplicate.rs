//! Purpose: Duplicate aliased keys in a serialized JSON response so old clients keep working.
//! Exports: `duplicate_keys`, `duplicate_keys_with`, `DuplicateOptions`.
//! Role: Encode-side half of field aliasing; pure function over a complete buffer.
//! Invariants: Never inserts a key already present in the same object (idempotent).
//! Invariants: Inserted values are byte copies of the original value after its own duplication.
//! Invariants: Malformed input or an exceeded depth limit falls back to a verbatim copy.
//! Invariants: Compact output has no whitespace outside strings; otherwise the input layout is kept.
//! Notes: Pass 1 records tracked keys per scope; pass 2 copies and inserts.
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::core::rules::RuleSet;
use crate::core::scan::{decode_key, is_ws, quote_key, skip_ws, string_end, value_end};
use crate::core::scope::{ScopeId, ScopeStack};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DuplicateOptions {
    /// Strip all whitespace outside strings from the returned buffer.
    /// When unset, the input layout is kept and inserted entries mirror
    /// the whitespace around the original entry.
    pub compact: bool,
    pub max_depth: Option<usize>,
}

type PresentKeys = HashMap<ScopeId, HashSet<String>>;

struct PendingInsert {
    value_end: usize,
    value_out: usize,
    names: Vec<String>,
    indent: Range<usize>,
    gap: Range<usize>,
}

pub fn duplicate_keys(buf: &[u8], rules: &RuleSet) -> Vec<u8> {
    duplicate_keys_with(buf, rules, DuplicateOptions::default())
}

pub fn duplicate_keys_with(buf: &[u8], rules: &RuleSet, options: DuplicateOptions) -> Vec<u8> {
    if rules.is_empty() {
        return finish_layout(buf.to_vec(), options.compact);
    }
    let Some(mut present) = collect_present(buf, rules, options.max_depth) else {
        tracing::debug!(
            max_depth = options.max_depth,
            "json nesting exceeds duplication depth limit; copying verbatim"
        );
        return buf.to_vec();
    };

    let mut out = Vec::with_capacity(buf.len() + buf.len() / 8);
    let mut scopes: ScopeStack<()> = ScopeStack::new(options.max_depth);
    let mut pending: Vec<PendingInsert> = Vec::new();
    let mut idx = 0;

    while idx < buf.len() {
        emit_ready(buf, idx, &mut pending, &mut out, options.compact);
        match buf[idx] {
            b'"' => {
                let Some(end) = string_end(buf, idx) else {
                    return copy_rest(buf, idx, out);
                };
                let colon = skip_ws(buf, end);
                let missing = match scopes.current() {
                    Some((scope, _)) if buf.get(colon) == Some(&b':') => {
                        missing_aliases(&buf[idx..end], scope, rules, &mut present)
                    }
                    _ => Vec::new(),
                };
                if missing.is_empty() {
                    out.extend_from_slice(&buf[idx..end]);
                    idx = end;
                    continue;
                }
                let value_start = skip_ws(buf, colon + 1);
                let Some(value_stop) = value_end(buf, value_start) else {
                    return copy_rest(buf, idx, out);
                };
                out.extend_from_slice(&buf[idx..value_start]);
                pending.push(PendingInsert {
                    value_end: value_stop,
                    value_out: out.len(),
                    names: missing,
                    indent: indent_before(buf, idx),
                    gap: colon + 1..value_start,
                });
                idx = value_start;
                continue;
            }
            b'{' => {
                if scopes.open_object(idx as u64).is_err() {
                    return copy_rest(buf, idx, out);
                }
            }
            b'[' => {
                if scopes.open_array(idx as u64).is_err() {
                    return copy_rest(buf, idx, out);
                }
            }
            b'}' | b']' => {
                scopes.close();
            }
            _ => {}
        }
        out.push(buf[idx]);
        idx += 1;
    }
    emit_ready(buf, idx, &mut pending, &mut out, options.compact);
    finish_layout(out, options.compact)
}

fn finish_layout(buf: Vec<u8>, compact: bool) -> Vec<u8> {
    if !compact || !buf.iter().copied().any(is_ws) {
        return buf;
    }
    let mut out = Vec::with_capacity(buf.len());
    let mut idx = 0;
    while idx < buf.len() {
        match buf[idx] {
            b'"' => {
                let end = string_end(&buf, idx).unwrap_or(buf.len());
                out.extend_from_slice(&buf[idx..end]);
                idx = end;
            }
            byte => {
                if !is_ws(byte) {
                    out.push(byte);
                }
                idx += 1;
            }
        }
    }
    out
}

/// Pass 1: tracked keys (either spelling) already present in each object.
fn collect_present(buf: &[u8], rules: &RuleSet, max_depth: Option<usize>) -> Option<PresentKeys> {
    let mut present = PresentKeys::new();
    let mut scopes: ScopeStack<()> = ScopeStack::new(max_depth);
    let mut idx = 0;
    while idx < buf.len() {
        match buf[idx] {
            b'"' => {
                let Some(end) = string_end(buf, idx) else {
                    break;
                };
                if buf.get(skip_ws(buf, end)) == Some(&b':') {
                    if let (Some((scope, _)), Some(name)) =
                        (scopes.current(), decode_key(&buf[idx..end]))
                    {
                        if rules.is_tracked(&name) {
                            present.entry(scope).or_default().insert(name.into_owned());
                        }
                    }
                }
                idx = end;
                continue;
            }
            b'{' => {
                scopes.open_object(idx as u64).ok()?;
            }
            b'[' => {
                scopes.open_array(idx as u64).ok()?;
            }
            b'}' | b']' => {
                scopes.close();
            }
            _ => {}
        }
        idx += 1;
    }
    Some(present)
}

/// Alias-family members of this key absent from its object; they are
/// marked present so no later key in the scope inserts them again.
fn missing_aliases(
    raw_key: &[u8],
    scope: ScopeId,
    rules: &RuleSet,
    present: &mut PresentKeys,
) -> Vec<String> {
    let Some(name) = decode_key(raw_key) else {
        return Vec::new();
    };
    let family = rules.family(&name);
    if family.is_empty() {
        return Vec::new();
    }
    let seen = present.entry(scope).or_default();
    let mut missing = Vec::new();
    for alias in family {
        if seen.insert(alias.clone()) {
            missing.push(alias.clone());
        }
    }
    missing
}

fn emit_ready(
    buf: &[u8],
    idx: usize,
    pending: &mut Vec<PendingInsert>,
    out: &mut Vec<u8>,
    compact: bool,
) {
    while pending.last().is_some_and(|insert| insert.value_end == idx) {
        let Some(insert) = pending.pop() else {
            break;
        };
        let value = out[insert.value_out..].to_vec();
        for name in &insert.names {
            out.push(b',');
            if !compact {
                out.extend_from_slice(&buf[insert.indent.clone()]);
            }
            out.extend_from_slice(&quote_key(name));
            out.push(b':');
            if !compact {
                out.extend_from_slice(&buf[insert.gap.clone()]);
            }
            out.extend_from_slice(&value);
        }
    }
}

fn indent_before(buf: &[u8], key_start: usize) -> Range<usize> {
    let mut start = key_start;
    while start > 0 && is_ws(buf[start - 1]) {
        start -= 1;
    }
    start..key_start
}

fn copy_rest(buf: &[u8], idx: usize, mut out: Vec<u8>) -> Vec<u8> {
    tracing::debug!(offset = idx, "malformed json during duplication; copying remainder verbatim");
    out.extend_from_slice(&buf[idx..]);
    out
}
