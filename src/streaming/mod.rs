//! Streaming module for push body rewriting
//!
//! This module provides streaming primitives that:
//! - Compose as `Read` decorators over a closable source
//! - Neutralize `# TYPE` lines with a byte FSM (no regex, no buffering)
//! - Prepend a fixed block of type definitions to every stream

pub mod source;
pub mod type_filter;
pub mod type_definer;
pub mod preamble;
pub mod chunk_feed;

#[cfg(test)]
pub(crate) mod test_support;

pub use source::{NopClose, ReadClose, StreamError};
pub use type_filter::{ScanState, TypeFilter, TypeLineScanner, SENTINEL};
pub use type_definer::TypeDefiner;
pub use preamble::{pushgateway_self_metrics, MetricType, Preamble, TypeDefinition};
pub use chunk_feed::ChunkFeed;
