//! Analysis modules.
//!
//! Streams JSONL sales lines into per-SKU totals.

pub mod aggregator;

pub use aggregator::*;
