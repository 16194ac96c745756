//! Purpose: Internal JSON decoding boundary shared by the API and CLI paths.
//! Exports: `parse` module with decode helpers and parse-failure categories.
//! Role: Single seam for serde_json usage so callsites avoid ad hoc error mapping.
//! Invariants: Request bodies are decoded through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
