//! Purpose: Shared library crate behind the `fieldalias` CLI, server, and tests.
//! Exports: `api` (stable surface), `http` (axum integration), `serve`, `notice`.
//! Role: Field-aliasing engine that lets JSON APIs rename fields without breaking clients.
//! Invariants: Callers use `api`; `core` internals may change between releases.
//! Invariants: Transforms are pure over their inputs apart from the per-shape rule cache.
pub mod api;
pub mod core;
pub mod http;
pub(crate) mod json;
pub mod notice;
pub mod serve;
