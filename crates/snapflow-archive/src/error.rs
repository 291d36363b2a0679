use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("entry '{entry}' escapes the destination directory")]
    PathEscape { entry: PathBuf },

    #[error("symlink '{link}' points outside the destination: '{target}'")]
    SymlinkEscape { link: PathBuf, target: PathBuf },

    #[error("refusing to extract through symlink '{link}'")]
    SymlinkInPath { link: PathBuf },

    #[error("strip_components({count}) removed all path components from '{original}'")]
    NoComponentsRemaining { original: PathBuf, count: usize },

    #[error("archive entry has an unreadable path")]
    InvalidPath,

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read archive: {0}")]
    Corrupted(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
