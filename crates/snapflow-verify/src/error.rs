#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("checksum mismatch: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    Mismatch { expected: Vec<u8>, actual: Vec<u8> },

    #[error("invalid SHA-256 digest '{0}': expected 64 hex characters")]
    InvalidDigest(String),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
