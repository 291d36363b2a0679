//! I/O for ranged fetching: the client abstraction, its implementations and
//! the fetcher that drives them.

mod http;
mod memory;
mod ranged;

pub use http::{BoxStream, RangeClient};
pub use memory::{MemoryClient, MemoryError};
pub use ranged::RangedFetcher;

#[cfg(feature = "reqwest")]
pub use http::{HttpError, ReqwestClient};
