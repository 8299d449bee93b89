//! Core error type.
//!
//! Downstream crates define their own enums; this one only covers
//! configuration loading and saving.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `sd-core`.
pub type CoreResult<T> = Result<T, CoreError>;
