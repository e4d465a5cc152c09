//! Thread scheduler implementations.
//!
//! Provides the index-scan scheduler used by the cooperative runtime.

pub mod scan;
pub mod trait_def;

pub use scan::IndexScanScheduler;
pub use trait_def::Scheduler;

/// Default scheduler type.
pub type DefaultScheduler = IndexScanScheduler;
