use std::io;
use thiserror::Error;

use crate::file::FileError;

/// Errors raised while building or running the ancestry smoothing filter.
///
/// Every error is fatal for the current run; nothing is retried.
#[derive(Error, Debug)]
pub enum AncestryError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Data error: {0}")]
    Data(String),
    #[error("Numeric error: {0}")]
    Numeric(String),
    #[error("Genetic map lookup error: {0}")]
    Lookup(String),
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("File reading error: {0}")]
    FileError(#[from] FileError),
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AncestryError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        AncestryError::Parse {
            line,
            message: message.into(),
        }
    }
}
