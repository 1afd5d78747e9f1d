//! Analysis modules.
//!
//! Population statistics over patient records.

pub mod aggregator;

pub use aggregator::*;
