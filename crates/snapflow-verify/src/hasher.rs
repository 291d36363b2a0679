use sha2::Digest;

use crate::error::{Result, VerifyError};

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

#[derive(Debug, Clone, Default)]
pub struct Sha256Hasher(sha2::Sha256);

impl Sha256Hasher {
    pub fn new() -> Self { Self::default() }

    pub fn digest(data: &[u8]) -> Vec<u8> { sha2::Sha256::digest(data).to_vec() }
}

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }

    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

/// Parse a hex-encoded SHA-256 digest as found in configuration files.
pub fn parse_sha256_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() != 64 {
        return Err(VerifyError::InvalidDigest(s.to_string()));
    }
    hex::decode(s).map_err(|_| VerifyError::InvalidDigest(s.to_string()))
}
