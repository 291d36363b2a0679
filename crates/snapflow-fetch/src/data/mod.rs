//! Immutable configuration for ranged fetching.

mod options;

pub use options::RangedOptions;
