//! Bounded circular byte window for out-of-order producers and a sequential consumer.
//!
//! # Architecture
//!
//! - [`ByteWindow`] - fixed-capacity ring addressed by absolute stream offset
//! - `range` - ordered set of filled-but-unread intervals (crate-private)
//! - [`WakeSet`] - broadcast-once wake registry used for every blocking wait
//! - [`ThroughputStats`] - observational decorator over the write path
//!
//! # Key Features
//!
//! - **Bounded memory**: writers beyond `head + capacity` are parked until the reader catches up
//! - **Strict ordering**: the reader only ever sees contiguous bytes from `head`
//! - **Async writers, blocking reader**: both sides park on the same one-shot wake primitive
//! - **Cancellable**: [`ByteWindow::cancel`] fails every parked call

mod error;
mod range;
mod sink;
mod stats;
mod wake;
mod window;

pub use error::{Error, Result};
pub use sink::OffsetWrite;
pub use stats::{ReporterHandle, Throughput, ThroughputStats};
pub use wake::{WakeSet, Waiter};
pub use window::{ByteWindow, ReadOutcome, WindowPhase, WindowReader};
