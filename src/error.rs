//! Error types
//!
//! Extraction errors stay below single-record granularity and are absorbed by
//! the collector. Pipeline errors compromise the training/inference contract
//! and are surfaced to the caller.

use thiserror::Error;

/// Failure while fetching or parsing one app from one platform
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("WebDriver {command} failed: {message}")]
    Browser { command: String, message: String },

    #[error("timed out after {waited_secs}s waiting for `{selector}`")]
    Timeout { selector: String, waited_secs: u64 },

    #[error("malformed response from {url}: {message}")]
    Json { url: String, message: String },
}

impl ExtractError {
    pub(crate) fn http(url: &str, err: impl std::fmt::Display) -> Self {
        ExtractError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn browser(command: &str, err: impl std::fmt::Display) -> Self {
        ExtractError::Browser {
            command: command.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure that breaks the dataset or the frozen feature schema
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model bundle has no frozen feature schema; retrain and save the bundle again")]
    VocabularyMissing,

    #[error("feature width mismatch: schema expects {expected} columns, got {actual}")]
    SchemaWidthMismatch { expected: usize, actual: usize },

    #[error("no usable rows in dataset")]
    EmptyDataset,

    #[error("feature schema names unknown numeric column `{0}`")]
    UnknownNumericColumn(String),

    #[error("invalid prediction input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("model failed to predict: {0}")]
    Model(String),
}

impl PipelineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
