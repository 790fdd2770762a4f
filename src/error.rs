use polars::prelude::PolarsError;
use std::{io, path::PathBuf};
use thiserror::Error;
use tokio::task::JoinError;

// Result type to simplify function signatures
pub type RowpickResult<T> = Result<T, RowpickError>;

/// Custom error type for Rowpick.
#[derive(Error, Debug)]
pub enum RowpickError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Tokio JoinError: {0}")]
    TokioJoin(#[from] JoinError),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Snapshot encode error: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),

    #[error("History file error: {0}")]
    History(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for RowpickError {
    fn from(err: String) -> RowpickError {
        RowpickError::Other(err)
    }
}
