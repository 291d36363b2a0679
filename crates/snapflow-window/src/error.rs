use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("window capacity must be greater than zero")]
    ZeroCapacity,

    #[error("window too small for this write: {len} bytes into a {capacity}-byte window")]
    WriteTooLarge { len: usize, capacity: usize },

    #[error("write at offset {offset} is behind the window head {head}")]
    StaleOffset { offset: u64, head: u64 },

    #[error("write of {len} bytes at offset {offset} overflows the stream offset")]
    OffsetOverflow { offset: u64, len: usize },

    #[error("window is closed")]
    Closed,

    #[error("window operation cancelled")]
    Cancelled,

    #[error("stream ended with a gap: head at {head}, next filled byte at {next}")]
    Truncated { head: u64, next: u64 },
}

impl Error {
    /// Errors that no amount of waiting or retrying can fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ZeroCapacity
                | Self::WriteTooLarge { .. }
                | Self::StaleOffset { .. }
                | Self::OffsetOverflow { .. }
        )
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match e {
            Error::Truncated { .. } => io::ErrorKind::UnexpectedEof,
            Error::Closed => io::ErrorKind::BrokenPipe,
            Error::WriteTooLarge { .. } | Error::ZeroCapacity | Error::OffsetOverflow { .. } => {
                io::ErrorKind::InvalidInput
            }
            Error::StaleOffset { .. } | Error::Cancelled => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
