//! Ingest module for the type guard
//!
//! Glue between Envoy body callbacks and the streaming rewrite pipeline.

pub mod push_rewriter;

pub use push_rewriter::PushRewriter;
