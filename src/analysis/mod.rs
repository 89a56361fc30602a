//! Analysis modules.
//!
//! Turns raw classifier output into a ranked diagnosis.

pub mod aggregator;

pub use aggregator::*;
