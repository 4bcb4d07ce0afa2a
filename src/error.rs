// Fatal errors only: each one aborts the conversion of a whole dataset.
// Skipped shapes and untransformed coordinates are `Diagnostic`s instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Malformed {file} header: {message}")]
    MalformedHeader { file: &'static str, message: String },

    // record ends before its declared length
    #[error("Truncated {file} record {index}: {message}")]
    TruncatedRecord {
        file: &'static str,
        index: usize,
        message: String,
    },

    #[error("Record {index} has invalid part offsets {parts:?} for {points} points")]
    MalformedParts {
        index: usize,
        parts: Vec<i32>,
        points: usize,
    },

    #[error("Record count mismatch: {shapes} shapes but {attributes} attribute rows")]
    RecordCountMismatch { shapes: usize, attributes: usize },

    #[error("Failed to create transformation from {from} to {to}: {message}")]
    Projection {
        from: String,
        to: String,
        message: String,
    },

    #[error("Invalid {option} option: {message}")]
    InvalidOption { option: String, message: String },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
