//! Purpose: Describe deprecated field usage as a structured, non-fatal notice.
//! Exports: `DeprecationNotice`, `NoticeSource`, `deprecation_json`.
//! Role: Hand-off between the transforms (which never log) and the logging layer.
//! Invariants: A notice exists only when at least one deprecated name was used.
//! Invariants: `fields` and `replacements` are index-aligned, in first-use order.
use serde_json::{Map, Value, json};

use crate::core::rules::RuleSet;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeSource {
    Body,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationNotice {
    pub source: NoticeSource,
    pub fields: Vec<String>,
    pub replacements: Vec<String>,
}

impl DeprecationNotice {
    /// Builds a notice for the deprecated names a transform reported.
    pub fn from_usage(source: NoticeSource, deprecated: &[String], rules: &RuleSet) -> Option<Self> {
        if deprecated.is_empty() {
            return None;
        }
        let replacements = deprecated
            .iter()
            .map(|old| rules.canonical_of(old).unwrap_or(old.as_str()).to_string())
            .collect();
        Some(Self {
            source,
            fields: deprecated.to_vec(),
            replacements,
        })
    }

    /// Value logged under `deprecated_fields`.
    pub fn fields_label(&self) -> String {
        format!("[{}]", self.fields.join(" "))
    }

    /// Value logged under `deprecation_warning`.
    pub fn warning(&self) -> String {
        match (self.source, self.fields.as_slice(), self.replacements.as_slice()) {
            (NoticeSource::Query, [old], [new]) => {
                format!("'{old}' is deprecated, use '{new}' instead")
            }
            _ => format!(
                "use the updated field names ([{}]) instead",
                self.replacements.join(" ")
            ),
        }
    }

    /// Key/value pairs attached to the warning event.
    pub fn key_values(&self) -> [(&'static str, String); 2] {
        [
            ("deprecated_fields", self.fields_label()),
            ("deprecation_warning", self.warning()),
        ]
    }
}

pub fn deprecation_json(notice: &DeprecationNotice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!("deprecation"));
    inner.insert(
        "source".to_string(),
        json!(match notice.source {
            NoticeSource::Body => "body",
            NoticeSource::Query => "query",
        }),
    );
    inner.insert("deprecated_fields".to_string(), json!(notice.fields));
    inner.insert("replacements".to_string(), json!(notice.replacements));
    inner.insert("message".to_string(), json!(notice.warning()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}
