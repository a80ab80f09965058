//! エラー型

use std::{io, path::PathBuf};

/// アペンダーのエラー
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("log file path `{}` does not name a file", .0.display())]
    InvalidPath(PathBuf),

    #[error("invalid date pattern `{pattern}`: {message}")]
    InvalidDatePattern { pattern: String, message: String },

    #[error("invalid file pattern: {0}")]
    InvalidFilePattern(#[from] regex::Error),

    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rollover failed: {0}")]
    Rollover(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Rollover(source) | Error::Open { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
