//! Purpose: Provide the internal runtime JSON decode entrypoints.
//! Exports: `from_reader`, `from_slice`, `ParseFailureCategory`, `categorize_error`, `hint_for_error`.
//! Role: Parser boundary that centralizes serde_json usage details.
//! Invariants: Category labels are stable; they appear in user-facing hints.
//! Notes: Error mapping to crate errors is done by callsites so domain context stays explicit.
#![allow(dead_code)]

use std::io::Read;

use serde::de::DeserializeOwned;

pub(crate) fn from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<T, serde_json::Error> {
    serde_json::from_reader(reader)
}

pub(crate) fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(input)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Syntax,
    Truncated,
    Schema,
    NumericRange,
    DepthLimit,
    Utf8,
    Io,
    Unknown,
}

impl ParseFailureCategory {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::Truncated => "truncated",
            ParseFailureCategory::Schema => "schema",
            ParseFailureCategory::NumericRange => "numeric-range",
            ParseFailureCategory::DepthLimit => "depth-limit",
            ParseFailureCategory::Utf8 => "utf8",
            ParseFailureCategory::Io => "io",
            ParseFailureCategory::Unknown => "unknown",
        }
    }
}

pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    let by_message = categorize_message(&err.to_string());
    if by_message != ParseFailureCategory::Unknown {
        return by_message;
    }
    match err.classify() {
        serde_json::error::Category::Io => ParseFailureCategory::Io,
        serde_json::error::Category::Eof => ParseFailureCategory::Truncated,
        serde_json::error::Category::Data => ParseFailureCategory::Schema,
        serde_json::error::Category::Syntax => ParseFailureCategory::Syntax,
    }
}

pub(crate) fn categorize_message(message: &str) -> ParseFailureCategory {
    let message = message.to_ascii_lowercase();
    if message.contains("recursion limit") {
        ParseFailureCategory::DepthLimit
    } else if message.contains("out of range") {
        ParseFailureCategory::NumericRange
    } else if message.contains("unicode") || message.contains("utf-8") || message.contains("utf8")
    {
        ParseFailureCategory::Utf8
    } else {
        ParseFailureCategory::Unknown
    }
}

pub(crate) fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    let category = categorize_error(err);
    if err.line() == 0 {
        return format!("parse category: {}; context: {context}", category.as_str());
    }
    format!(
        "parse category: {}; context: {context}; at line {}, column {}",
        category.as_str(),
        err.line(),
        err.column()
    )
}
