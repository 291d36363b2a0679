//! Streaming tar extraction with path sanitization.
//!
//! # Architecture
//!
//! - `format.rs` - Compression codecs around the tar stream
//! - `sanitize.rs` - Path sanitization (zip-slip prevention, component stripping)
//! - `extract.rs` - Sequential entry-by-entry unpacking
//!
//! The reader is consumed strictly front to back, so it can be a pipe, a
//! socket or a window over a download still in progress.

pub use error::{Error, Result};
pub use extract::{EntryKind, ExtractReport, ExtractedEntry, extract_stream};
pub use format::{Decoder, TarCompress};
pub use options::ExtractOptions;
pub use sanitize::{reject_symlinks_along, sanitize_entry_path, sanitize_symlink_target};

mod error;
mod extract;
mod format;
mod options;
mod sanitize;
