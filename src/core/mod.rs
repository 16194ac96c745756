// Core modules implementing alias rules, the streaming rewriter, and the duplicator.
pub mod duplicate;
pub mod error;
pub mod query;
pub mod registry;
pub mod rewrite;
pub mod rules;
pub mod scan;
pub mod scope;
