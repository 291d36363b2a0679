//! Pure transformations for ranged fetching.
//!
//! Nothing in here performs I/O.

mod retry;
mod segment;

pub use retry::retry_delay;
pub use segment::{Segment, plan_segments};
