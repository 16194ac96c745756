//! Purpose: Define the stable public Rust API boundary for fieldalias.
//! Exports: Rule types, the streaming rewriter, the duplicator, and typed decode/encode helpers.
//! Role: Public, additive-only surface used by the CLI, the HTTP layer, and embedders.
//! Invariants: This module is the only supported path to the engine.
//! Invariants: Scanner and scope internals remain private to `core`.

mod decode;
mod encode;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{AliasConflict, Error, ErrorKind};
pub use crate::core::duplicate::{DuplicateOptions, duplicate_keys, duplicate_keys_with};
pub use crate::core::query::{QueryRewrite, rewrite_query_pairs};
pub use crate::core::registry::{AliasShape, ShapeVisitor, rules_for};
pub use crate::core::rewrite::{KeyRewriter, RewriteOptions};
pub use crate::core::rules::{AliasRule, RuleSet};
pub use crate::notice::{DeprecationNotice, NoticeSource};
pub use decode::{
    Decoded, Normalized, decode_json, decode_json_with, decode_shape, load_rules, normalize_json,
};
pub use encode::{EncodeOptions, duplicate_document, encode_json, encode_shape};
