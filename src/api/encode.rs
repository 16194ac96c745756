//! Purpose: Serialize response values and add deprecated-alias copies of renamed keys.
//! Exports: `EncodeOptions`, `encode_json`, `encode_shape`, `duplicate_document`.
//! Role: Response-side entry points; serde serialization followed by `duplicate_keys_with`.
//! Invariants: Duplication uses the same compact/pretty setting as serialization.
//! Invariants: Only serialization can fail; duplication is fail-soft.
use serde::Serialize;
use serde::de::IgnoredAny;

use crate::core::duplicate::{DuplicateOptions, duplicate_keys_with};
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::{AliasShape, rules_for};
use crate::core::rules::RuleSet;
use crate::json::parse;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EncodeOptions {
    /// Serialize without indentation; off means two-space pretty output.
    pub compact: bool,
    pub max_depth: Option<usize>,
}

impl EncodeOptions {
    pub fn compact() -> Self {
        Self {
            compact: true,
            max_depth: None,
        }
    }
}

pub fn encode_json<T>(value: &T, rules: &RuleSet, options: EncodeOptions) -> Result<Vec<u8>, Error>
where
    T: Serialize + ?Sized,
{
    let serialized = if options.compact {
        serde_json::to_vec(value)
    } else {
        serde_json::to_vec_pretty(value)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode response")
            .with_source(err)
    })?;

    if rules.is_empty() {
        return Ok(serialized);
    }
    Ok(duplicate_keys_with(
        &serialized,
        rules,
        DuplicateOptions {
            compact: options.compact,
            max_depth: options.max_depth,
        },
    ))
}

/// Encodes `T` using the rule set derived from its declared field aliases.
pub fn encode_shape<T>(value: &T, options: EncodeOptions) -> Result<Vec<u8>, Error>
where
    T: Serialize + AliasShape,
{
    encode_json(value, &rules_for::<T>(), options)
}

/// Duplicates aliased keys in an already-serialized document, rejecting
/// input that is not a single JSON value.
pub fn duplicate_document(
    input: &[u8],
    rules: &RuleSet,
    options: DuplicateOptions,
) -> Result<Vec<u8>, Error> {
    parse::from_slice::<IgnoredAny>(input).map_err(|err| {
        let hint = parse::hint_for_error(&err, "document");
        Error::new(ErrorKind::Usage)
            .with_message("invalid json document")
            .with_hint(hint)
            .with_source(err)
    })?;
    Ok(duplicate_keys_with(input, rules, options))
}
