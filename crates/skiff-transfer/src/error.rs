//! Error types for skiff-transfer.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no file name segment")]
    NoFileName,

    #[error("storage error: {0}")]
    Storage(#[source] skiff_fs::Error),

    #[error("file write failed: {0}")]
    Write(#[source] io::Error),

    #[error("file read failed: {0}")]
    Read(#[source] io::Error),

    #[error("backing file truncated mid-stream")]
    TruncatedFile,

    #[error("buffer capacity {capacity} too small for {required} bytes")]
    BufferTooSmall { capacity: usize, required: usize },

    #[error("driver error: {0}")]
    Driver(String),

    #[error("transfer already terminal")]
    Terminal,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<skiff_fs::Error> for Error {
    fn from(e: skiff_fs::Error) -> Self { Error::Storage(e) }
}
