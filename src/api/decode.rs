//! Purpose: Decode request bodies into typed values through the key rewriter.
//! Exports: `Decoded`, `Normalized`, `decode_json`, `decode_json_with`, `decode_shape`, `normalize_json`, `load_rules`.
//! Role: Request-side entry points; wires rule sets, `KeyRewriter`, and serde together.
//! Invariants: An empty rule set bypasses the rewriter entirely.
//! Invariants: Conflict and limit errors win over whatever the deserializer reported.
//! Notes: Deprecation usage is returned, never logged here.
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use serde::de::{DeserializeOwned, IgnoredAny};

use crate::core::error::{Error, ErrorKind};
use crate::core::registry::{AliasShape, rules_for};
use crate::core::rewrite::{KeyRewriter, RewriteOptions};
use crate::core::rules::RuleSet;
use crate::json::parse;
use crate::notice::{DeprecationNotice, NoticeSource};

#[derive(Debug)]
pub struct Decoded<T> {
    pub value: T,
    pub deprecation: Option<DeprecationNotice>,
}

impl<T> Decoded<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

pub fn decode_json<T, R>(reader: R, rules: &Arc<RuleSet>) -> Result<Decoded<T>, Error>
where
    T: DeserializeOwned,
    R: Read,
{
    decode_json_with(reader, rules, RewriteOptions::default())
}

pub fn decode_json_with<T, R>(
    reader: R,
    rules: &Arc<RuleSet>,
    options: RewriteOptions,
) -> Result<Decoded<T>, Error>
where
    T: DeserializeOwned,
    R: Read,
{
    if rules.is_empty() && options.max_depth.is_none() {
        let value = parse::from_reader(reader).map_err(decode_error)?;
        return Ok(Decoded {
            value,
            deprecation: None,
        });
    }

    let mut rewriter = KeyRewriter::with_options(reader, Arc::clone(rules), options);
    let parsed = parse::from_reader(&mut rewriter);
    if let Some(err) = rewriter.terminal_error() {
        return Err(err.replicate());
    }
    let value = parsed.map_err(decode_error)?;
    let deprecation =
        DeprecationNotice::from_usage(NoticeSource::Body, rewriter.deprecated_keys(), rules);
    Ok(Decoded { value, deprecation })
}

/// Rewritten document bytes, checked to be a single JSON value.
#[derive(Debug)]
pub struct Normalized {
    pub bytes: Vec<u8>,
    pub deprecation: Option<DeprecationNotice>,
}

/// Renames deprecated keys in a buffered document without deserializing it.
pub fn normalize_json(
    input: &[u8],
    rules: &Arc<RuleSet>,
    options: RewriteOptions,
) -> Result<Normalized, Error> {
    let mut rewriter = KeyRewriter::with_options(input, Arc::clone(rules), options);
    let mut bytes = Vec::with_capacity(input.len());
    rewriter.read_to_end(&mut bytes).map_err(Error::from_io)?;
    parse::from_slice::<IgnoredAny>(&bytes).map_err(decode_error)?;
    let deprecation =
        DeprecationNotice::from_usage(NoticeSource::Body, rewriter.deprecated_keys(), rules);
    Ok(Normalized { bytes, deprecation })
}

/// Decodes `T` using the rule set derived from its declared field aliases.
pub fn decode_shape<T, R>(reader: R) -> Result<Decoded<T>, Error>
where
    T: DeserializeOwned + AliasShape,
    R: Read,
{
    decode_json(reader, &rules_for::<T>())
}

/// Loads a rule file: a JSON array of `{"old": ..., "new": ...}` objects.
pub fn load_rules(path: &Path) -> Result<RuleSet, Error> {
    let bytes = std::fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read rules file {}", path.display()))
            .with_source(err)
    })?;
    parse::from_slice(&bytes).map_err(|err| {
        let hint = parse::hint_for_error(&err, "rules file");
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid rules file {}", path.display()))
            .with_hint(hint)
            .with_source(err)
    })
}

fn decode_error(err: serde_json::Error) -> Error {
    if err.is_io() {
        return Error::from_io(io::Error::from(err));
    }
    let hint = parse::hint_for_error(&err, "request body");
    Error::new(ErrorKind::Usage)
        .with_message("invalid json body")
        .with_hint(hint)
        .with_source(err)
}
