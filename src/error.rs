use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpapError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Invalid header field '{field}' at byte offset {offset}")]
    InvalidField { field: &'static str, offset: usize },

    #[error("Truncated data: needed {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),

    #[error("Invalid header size")]
    InvalidHeader,

    #[error("Checksum mismatch for {path}: {message}")]
    ChecksumMismatch { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, CpapError>;
