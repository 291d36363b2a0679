//! Concurrent ranged downloading into an offset-addressed sink.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration
//! - [`core`] - Pure transformations (segment planning, backoff)
//! - `effects` - I/O behind the [`RangeClient`] trait
//!
//! # Key Features
//!
//! - **Parallel parts**: the object is split into fixed-size parts fetched with bounded fan-out
//! - **Out-of-order writes**: every chunk lands at its absolute offset through [`OffsetWrite`](snapflow_window::OffsetWrite)
//! - **Resuming retries**: a failed part restarts from the last byte it delivered
//! - **Mechanism-only**: closing the sink is left to the caller

pub mod core;
pub mod data;
mod effects;
mod error;

pub use self::core::{Segment, plan_segments, retry_delay};
pub use self::data::RangedOptions;
pub use self::effects::{BoxStream, MemoryClient, MemoryError, RangeClient, RangedFetcher};

#[cfg(feature = "reqwest")]
pub use self::effects::{HttpError, ReqwestClient};

pub use self::error::{FetchError, Result};
