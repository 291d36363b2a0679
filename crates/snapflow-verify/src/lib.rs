//! Streaming digest verification.
//!
//! Bytes are hashed as they pass through a [`VerifiedReader`], so the
//! transferred stream is checked in the same pass that decompresses it.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use snapflow_verify::{Sha256Hasher, VerifiedReader};
//!
//! let expected = Sha256Hasher::digest(b"hello world");
//! let mut reader = VerifiedReader::new(&b"hello world"[..], Sha256Hasher::new());
//! let mut out = Vec::new();
//! reader.read_to_end(&mut out).unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher, parse_sha256_hex};
pub use self::reader::VerifiedReader;

mod error;
mod hasher;
mod reader;
