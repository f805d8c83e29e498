//! Analysis modules.
//!
//! Raw backend payloads pass through the normalizer before any
//! aggregation runs, so the aggregator only ever sees canonical records.

pub mod aggregator;
pub mod normalizer;

pub use aggregator::*;
pub use normalizer::RawJobResults;
