//! Stream a compressed tar snapshot from a ranged download straight to disk.
//!
//! # Architecture
//!
//! - `config.rs` - Layered configuration (defaults, file, environment, flags)
//! - `logger.rs` - `tracing` subscriber setup for the binary
//! - `pipeline.rs` - Download and extraction joined through a bounded window
//! - `source.rs` - Fixed URL, or the newest entry of a snapshot listing
//!
//! The window, downloader, extractor and verifier live in their own crates
//! and are re-exported here under short names.

pub mod config;
pub mod logger;
pub mod pipeline;
pub mod source;

pub use config::{Config, ConfigError, Overrides};
pub use logger::{LogOptions, setup_logger};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineReport};
pub use source::{Source, SourceError};

pub use snapflow_archive as archive;
pub use snapflow_fetch as fetch;
pub use snapflow_verify as verify;
pub use snapflow_window as window;
